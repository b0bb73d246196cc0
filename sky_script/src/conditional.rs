//! Nested `if`/`else`/`end` suppression plus the flat comment mode.
//!
//! The two suppressors are independent inputs folded into one
//! [`Suppression`] value recomputed on every mutation, so callers never
//! have to reason about precedence between them. Structural commands
//! (`struct`, `comment`, `uncomment`) bypass suppression entirely and
//! keep the nesting in sync even inside a skipped branch.

use serde::Serialize;

use crate::error::ScriptError;
use crate::parser::ArgMap;
use crate::vars::VariableTable;

/// Why ordinary commands are (or are not) currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Suppression {
    Run,
    Commented,
    ConditionallySkipped,
}

/// Conditional stack and comment mode, with the composite state cached.
#[derive(Debug, Default, Clone)]
pub struct SuppressionState {
    /// One entry per open `if`; `true` means that branch is suppressed.
    stack: Vec<bool>,
    comment: bool,
    current: Option<Suppression>,
}

impl SuppressionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a branch. `condition_met == false` suppresses the branch.
    pub fn push_if(&mut self, condition_met: bool) {
        self.stack.push(!condition_met);
        self.current = None;
    }

    /// Flip the innermost branch. Without an open `if` this reports a
    /// recoverable error; the script keeps playing.
    pub fn else_branch(&mut self) -> Result<(), ScriptError> {
        match self.stack.last_mut() {
            Some(top) => {
                *top = !*top;
                self.current = None;
                Ok(())
            }
            None => Err(ScriptError::Unmatched { token: "else" }),
        }
    }

    /// Close the innermost branch; an empty pop is a recoverable error.
    pub fn end_branch(&mut self) -> Result<(), ScriptError> {
        match self.stack.pop() {
            Some(_) => {
                self.current = None;
                Ok(())
            }
            None => Err(ScriptError::Unmatched { token: "end" }),
        }
    }

    /// Comment mode is a single boolean, deliberately non-nesting.
    pub fn set_comment(&mut self, on: bool) {
        self.comment = on;
        self.current = None;
    }

    pub fn comment_mode(&self) -> bool {
        self.comment
    }

    pub fn open_branches(&self) -> usize {
        self.stack.len()
    }

    /// Drop all conditional state, e.g. when a script terminates.
    pub fn clear(&mut self) {
        self.stack.clear();
        self.comment = false;
        self.current = None;
    }

    /// The composite state: comment mode wins the label when both
    /// suppressors are active.
    pub fn suppression(&mut self) -> Suppression {
        if let Some(current) = self.current {
            return current;
        }
        let computed = if self.comment {
            Suppression::Commented
        } else if self.stack.iter().any(|suppressed| *suppressed) {
            Suppression::ConditionallySkipped
        } else {
            Suppression::Run
        };
        self.current = Some(computed);
        computed
    }

    pub fn is_suppressed(&mut self) -> bool {
        self.suppression() != Suppression::Run
    }
}

/// Evaluate a `struct if` condition.
///
/// The condition is the first argument pair. A lone value is truthy
/// when it resolves to a non-zero number; `lhs op rhs` compares two
/// resolved doubles with `eq ne lt gt le ge`. A value that resolves to
/// no number at all counts as a failed condition (the branch is
/// suppressed); legacy script corpora rely on that exact behavior, so
/// it is preserved rather than corrected.
pub fn evaluate_condition(vars: &VariableTable, args: &ArgMap) -> bool {
    let mut pairs = args.iter().filter(|(key, _)| *key != "if");
    let lhs_token = match args.get("if") {
        Some(token) if !token.is_empty() => token,
        _ => {
            log::error!("struct if without a condition; branch suppressed");
            return false;
        }
    };

    let lhs = vars.try_eval_double(lhs_token);
    match pairs.next() {
        None => match lhs {
            Some(value) => value != 0.0,
            None => {
                log::error!("struct if condition \"{lhs_token}\" is not numeric; branch suppressed");
                false
            }
        },
        Some((op, rhs_token)) => {
            let (lhs, rhs) = match (lhs, vars.try_eval_double(rhs_token)) {
                (Some(lhs), Some(rhs)) => (lhs, rhs),
                _ => {
                    log::error!(
                        "struct if comparison \"{lhs_token} {op} {rhs_token}\" is not numeric; branch suppressed"
                    );
                    return false;
                }
            };
            match op {
                "eq" => lhs == rhs,
                "ne" => lhs != rhs,
                "lt" => lhs < rhs,
                "gt" => lhs > rhs,
                "le" => lhs <= rhs,
                "ge" => lhs >= rhs,
                other => {
                    log::error!("struct if operator \"{other}\" is unknown; branch suppressed");
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{evaluate_condition, Suppression, SuppressionState};
    use crate::parser::parse_line;
    use crate::vars::VariableTable;

    #[test]
    fn empty_stack_runs() {
        let mut state = SuppressionState::new();
        assert_eq!(state.suppression(), Suppression::Run);
        assert!(!state.is_suppressed());
    }

    #[test]
    fn false_branch_suppresses_until_end() {
        let mut state = SuppressionState::new();
        state.push_if(false);
        assert_eq!(state.suppression(), Suppression::ConditionallySkipped);
        state.end_branch().expect("balanced end");
        assert_eq!(state.suppression(), Suppression::Run);
    }

    #[test]
    fn else_flips_the_top_entry() {
        let mut state = SuppressionState::new();
        state.push_if(false);
        state.else_branch().expect("open if");
        assert_eq!(state.suppression(), Suppression::Run);
        state.else_branch().expect("open if");
        assert_eq!(state.suppression(), Suppression::ConditionallySkipped);
    }

    #[test]
    fn any_suppressed_entry_suppresses_nested_true_branches() {
        let mut state = SuppressionState::new();
        state.push_if(false);
        state.push_if(true);
        assert!(state.is_suppressed());
        state.end_branch().expect("inner end");
        assert!(state.is_suppressed());
        state.end_branch().expect("outer end");
        assert!(!state.is_suppressed());
    }

    #[test]
    fn balanced_sequence_restores_prior_state() {
        let mut state = SuppressionState::new();
        state.push_if(true);
        let before = state.suppression();
        state.push_if(false);
        state.else_branch().expect("open if");
        state.end_branch().expect("balanced end");
        assert_eq!(state.suppression(), before);
    }

    #[test]
    fn unmatched_else_and_end_are_recoverable() {
        let mut state = SuppressionState::new();
        assert!(state.else_branch().is_err());
        assert!(state.end_branch().is_err());
        assert_eq!(state.suppression(), Suppression::Run);
    }

    #[test]
    fn comment_mode_is_orthogonal_to_the_stack() {
        let mut state = SuppressionState::new();
        state.set_comment(true);
        assert_eq!(state.suppression(), Suppression::Commented);
        state.push_if(false);
        // Comment mode wins the label while both are active.
        assert_eq!(state.suppression(), Suppression::Commented);
        state.set_comment(false);
        assert_eq!(state.suppression(), Suppression::ConditionallySkipped);
        state.end_branch().expect("balanced end");
        assert_eq!(state.suppression(), Suppression::Run);
    }

    #[test]
    fn clear_drops_everything() {
        let mut state = SuppressionState::new();
        state.push_if(false);
        state.set_comment(true);
        state.clear();
        assert_eq!(state.open_branches(), 0);
        assert_eq!(state.suppression(), Suppression::Run);
    }

    #[test]
    fn truthiness_of_lone_values() {
        let mut vars = VariableTable::new();
        vars.define("one", "1");
        assert!(evaluate_condition(&vars, &parse_line("struct if 1").args));
        assert!(evaluate_condition(&vars, &parse_line("struct if $one").args));
        assert!(!evaluate_condition(&vars, &parse_line("struct if 0").args));
    }

    #[test]
    fn non_numeric_condition_suppresses() {
        let vars = VariableTable::new();
        // Legacy behavior: an unparsable condition counts as failed.
        assert!(!evaluate_condition(&vars, &parse_line("struct if maybe").args));
        assert!(!evaluate_condition(&vars, &parse_line("struct if $undefined").args));
    }

    #[test]
    fn comparisons_resolve_variables_on_both_sides() {
        let mut vars = VariableTable::new();
        vars.define("count", "3");
        let args = parse_line("struct if $count gt 2").args;
        assert!(evaluate_condition(&vars, &args));
        let args = parse_line("struct if $count le 2").args;
        assert!(!evaluate_condition(&vars, &args));
        let args = parse_line("struct if $count eq 3").args;
        assert!(evaluate_condition(&vars, &args));
        let args = parse_line("struct if $count ne 3").args;
        assert!(!evaluate_condition(&vars, &args));
    }

    #[test]
    fn unknown_operator_suppresses() {
        let vars = VariableTable::new();
        let args = parse_line("struct if 1 xor 1").args;
        assert!(!evaluate_condition(&vars, &args));
    }
}
