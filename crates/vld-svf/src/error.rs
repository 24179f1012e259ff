//! Error types for SVF reading

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for SVF operations
pub type Result<T> = std::result::Result<T, SvfError>;

/// Errors that can occur while reading an SVF vector file
#[derive(Debug, Error)]
pub enum SvfError {
    /// File not found or cannot be read
    #[error("SVF file not found: {path}")]
    FileNotFound {
        /// Path that was attempted
        path: PathBuf,
    },

    /// The file ended inside an unterminated statement
    #[error("End of file reached inside statement starting at line {line}")]
    UnexpectedEof {
        /// First line of the unterminated statement (1-based)
        line: usize,
    },

    /// A statement could not be parsed
    #[error("Line {line}: {reason}")]
    Parse {
        /// First line of the statement (1-based)
        line: usize,
        /// Reason for failure
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl SvfError {
    /// Create a parse error
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }
}
