use std::path::PathBuf;

use thiserror::Error;

/// Recoverable failures surfaced by the interpreter core.
///
/// None of these abort execution: the dispatcher converts every variant
/// into a failed outcome plus a log line and the script keeps playing.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unrecognized command \"{name}\"{}", suggestion_suffix(.suggestion))]
    UnknownCommand {
        name: String,
        suggestion: Option<String>,
    },
    #[error("unrecognized {table} name \"{name}\"{}", suggestion_suffix(.suggestion))]
    UnknownName {
        table: &'static str,
        name: String,
        suggestion: Option<String>,
    },
    #[error("command \"{name}\" was renamed; use \"{replacement}\" instead")]
    ObsoleteName {
        name: String,
        replacement: &'static str,
    },
    #[error("command \"{command}\" requires argument \"{key}\"")]
    MissingArgument {
        command: &'static str,
        key: &'static str,
    },
    #[error("command \"{command}\" argument {key}={value} is malformed")]
    BadArgument {
        command: &'static str,
        key: String,
        value: String,
    },
    #[error("structural \"{token}\" without a matching \"if\"")]
    Unmatched { token: &'static str },
    #[error("no script is playing")]
    NotPlaying,
    #[error("no recording is in progress")]
    NotRecording,
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean \"{name}\"?)"),
        None => String::new(),
    }
}
