//! Common error types for orgmatch

use thiserror::Error;

/// Common result type for orgmatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the orgmatch crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error.
    ///
    /// Raised at construction time only; fatal to the engine.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
