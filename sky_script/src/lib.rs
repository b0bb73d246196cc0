//! Interpreter core for the sky scripting language.
//!
//! Scripts are line-oriented: `name key1 value1 key2 "quoted value"`.
//! This crate owns the pieces with real state-machine semantics: the
//! parser, the command/flag/property registry, the variable table, the
//! nested conditional suppression state, the token queue with loop
//! capture, and the player that paces dispatch against a real-time
//! frame loop. Everything that touches rendering, media, or the UI
//! stays behind collaborator traits in the host crate.

mod conditional;
mod error;
mod parser;
mod player;
mod queue;
mod registry;
mod vars;

pub use conditional::{evaluate_condition, Suppression, SuppressionState};
pub use error::ScriptError;
pub use parser::{parse_line, ArgMap, ParsedCommand};
pub use player::{
    ExecuteOutcome, PlayState, Player, PlayerControl, PlayerStatus, PlayerView, SideEffect,
    UpdateReport, RECORD_IDLE_GAP,
};
pub use queue::{ScriptQueue, Token, SCRIPT_END_LINE};
pub use registry::{ColorPropertyId, CommandId, CommandRegistry, FlagId, SetPropertyId};
pub use vars::{ArithmeticOp, VariableTable};
