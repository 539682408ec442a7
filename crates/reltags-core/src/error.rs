//! Error types for Reltags Core

use thiserror::Error;

/// Result type alias using Reltags' Error
pub type Result<T> = std::result::Result<T, Error>;

/// Flat classification of every error the engine can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Collision,
    Missing,
    WrongType,
    HashFail,
    Format,
    Config,
}

/// Reltags error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Tag already exists: {0}")]
    Collision(String),

    #[error("Tag not found: {0}")]
    Missing(String),

    #[error("Wrong type: {0}")]
    WrongType(String),

    #[error("Unable to hash entity: {0}")]
    HashFail(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The flat kind of this error; JSON syntax errors count as `Format`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Collision(_) => ErrorKind::Collision,
            Self::Missing(_) => ErrorKind::Missing,
            Self::WrongType(_) => ErrorKind::WrongType,
            Self::HashFail(_) => ErrorKind::HashFail,
            Self::Format(_) | Self::Json(_) => ErrorKind::Format,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<crate::limits::ValidationError> for Error {
    fn from(err: crate::limits::ValidationError) -> Self {
        Self::WrongType(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_errors_are_format() {
        let err: Error = serde_json::from_str::<serde_json::Value>("[").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Format);
    }
}
