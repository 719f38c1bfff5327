use std::io;

use thiserror::Error;

/// why a line of text didn't turn into a command
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// no `:` between name and value
    #[error("invalid instruction format: {line}")]
    MissingDelimiter { line: String },

    /// delimiter present but the name isn't one we know
    #[error("unknown instruction '{name}', instructions available: {}", .known.join(", "))]
    UnknownCommand {
        name: String,
        known: &'static [&'static str],
    },
}

/// Errors reported by a storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// path escapes the storage root or is otherwise unusable
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Failure while executing a single command. Never fatal to the dispatch
/// loop; it is logged and the next command runs.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("display error: {0}")]
    Display(#[from] io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_command_lists_names() {
        let e = ParseError::UnknownCommand {
            name: "beep".into(),
            known: &["delay", "write_file"],
        };
        assert_eq!(
            e.to_string(),
            "unknown instruction 'beep', instructions available: delay, write_file"
        );
    }

    #[test]
    fn test_exec_error_wraps_storage() {
        let e: ExecError = StorageError::NotFound("/x".into()).into();
        assert_eq!(e.to_string(), "storage error: file not found: /x");
    }
}
