//! KV store error types
//!
//! A missing key is never an error: lookups and deletes return `Option`.
//! Only boundary validation, disk I/O and topology assembly fail.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for KV store operations
pub type Result<T> = std::result::Result<T, KvError>;

/// Errors specific to KV store operations
#[derive(Error, Debug)]
pub enum KvError {
    #[error("Empty key not allowed")]
    EmptyKey,

    #[error("Key too long: {0} bytes (max 256)")]
    KeyTooLong(usize),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Failed to persist snapshot to {path}: {source}")]
    Durability {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupted snapshot {path}: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification used by protocol adapters to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed key or value, rejected before reaching any store
    InvalidInput,
    /// A write could not be made durable
    Durability,
    /// Persisted state could not be read back at startup
    CorruptState,
    /// The store topology is inconsistent
    Config,
}

impl KvError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            KvError::EmptyKey | KvError::KeyTooLong(_) | KvError::InvalidValue(_) => {
                ErrorKind::InvalidInput
            }
            KvError::Durability { .. } => ErrorKind::Durability,
            KvError::CorruptSnapshot { .. } | KvError::Io { .. } => ErrorKind::CorruptState,
            KvError::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Returns true if the caller sent bad input
    pub fn is_invalid_input(&self) -> bool {
        self.kind() == ErrorKind::InvalidInput
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(KvError::EmptyKey.kind(), ErrorKind::InvalidInput);
        assert!(KvError::KeyTooLong(300).is_invalid_input());

        let err = KvError::Durability {
            path: PathBuf::from("store.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert_eq!(err.kind(), ErrorKind::Durability);
        assert!(err.to_string().contains("disk full"));

        let err = KvError::CorruptSnapshot {
            path: PathBuf::from("store.json"),
            reason: "EOF".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::CorruptState);
    }
}
