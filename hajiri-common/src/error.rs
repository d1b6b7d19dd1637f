//! Common error types for Sajilo Hajiri

use thiserror::Error;

/// Common result type for Sajilo Hajiri operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Sajilo Hajiri crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input, rejected before anything is sent
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Access token could not be decoded
    #[error("Invalid token: {0}")]
    Token(String),
}
