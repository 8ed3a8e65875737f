//! Error types for the file manager.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the file manager.
#[derive(Error, Debug)]
pub enum FileboxError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    InvalidInput(String),

    #[error("cannot create a user with the name '{0}'")]
    ReservedName(String),

    #[error("username contains invalid characters")]
    InvalidCharacters,

    #[error("user already exists")]
    AlreadyExists,

    #[error("invalid token")]
    InvalidToken,

    #[error("token expired")]
    TokenExpired,

    #[error("Failed to generate token: {0}")]
    TokenGeneration(String),

    #[error("invalid path")]
    PathEscape(PathBuf),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not a directory")]
    NotADirectory,

    #[error("cannot download a folder")]
    IsDirectory,

    #[error("invalid name")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),
}

impl FileboxError {
    /// Map an I/O error on `path` into the taxonomy, splitting out missing entries.
    pub fn from_io(err: std::io::Error, name: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            FileboxError::NotFound(name.to_string())
        } else {
            FileboxError::Io(err)
        }
    }

    /// Whether the error was caused by caller input rather than the server.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FileboxError::InvalidInput(_)
                | FileboxError::ReservedName(_)
                | FileboxError::InvalidCharacters
                | FileboxError::AlreadyExists
                | FileboxError::InvalidName(_)
                | FileboxError::NotADirectory
                | FileboxError::IsDirectory
        )
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, FileboxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_splits_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            FileboxError::from_io(err, "a.txt"),
            FileboxError::NotFound(name) if name == "a.txt"
        ));

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(FileboxError::from_io(err, "a.txt"), FileboxError::Io(_)));
    }

    #[test]
    fn test_validation_classification() {
        assert!(FileboxError::InvalidCharacters.is_validation());
        assert!(FileboxError::InvalidName("a/b".to_string()).is_validation());
        assert!(!FileboxError::InvalidToken.is_validation());
        assert!(!FileboxError::PathEscape(PathBuf::from("/etc")).is_validation());
    }
}
