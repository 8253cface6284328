//! # Harness Error Types

use thiserror::Error;

use phalanx_core::KernelError;

/// Errors that can occur while loading or running a session.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The session file could not be read.
    #[error("cannot read session file {path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The session file is not valid TOML or misses fields.
    #[error("invalid session file: {0}")]
    Parse(String),

    /// The session file is well-formed but inconsistent.
    #[error("invalid session: {0}")]
    Session(String),

    /// A kernel call failed.
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
