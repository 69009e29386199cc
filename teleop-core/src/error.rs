//! Error types for the teleop dashboard

use thiserror::Error;

/// Main error type for teleop operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Visualization error: {0}")]
    Visualization(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Capture error: {0}")]
    Capture(String),
}

/// Result type alias for teleop operations
pub type Result<T> = std::result::Result<T, Error>;
