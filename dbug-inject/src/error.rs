use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while instrumenting a batch of files.
///
/// None of these is fatal to a batch run on its own. The orchestrator logs
/// them, counts them, and moves on to the next file.
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Malformed compilation database entry #{index}: {reason}")]
    MalformedCompileEntry { index: usize, reason: String },

    #[error("Body coordinates do not match the text at line {line}: {reason}")]
    InconsistentCoordinates { line: usize, reason: String },

    #[error("Failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl InjectError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn inconsistent(line: usize, reason: impl Into<String>) -> Self {
        Self::InconsistentCoordinates {
            line,
            reason: reason.into(),
        }
    }

    /// Write failures are the only kind that must not be silently skipped.
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::Write { .. })
    }
}

pub type InjectResult<T> = std::result::Result<T, InjectError>;
