//! Error types for document handling.

use thiserror::Error;

/// Errors raised while reading or writing a family document.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised when a person record fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersonError {
    #[error("name is required")]
    EmptyName,

    #[error("death year {death} is before birth year {birth}")]
    InvalidLifespan { birth: i32, death: i32 },
}

pub type Result<T> = std::result::Result<T, DocumentError>;
