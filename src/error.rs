//! Error types for the cache facade
//!
//! Provides unified error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for cache drivers and the registry.
///
/// A missing or expired key is never an error: drivers report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Driver name does not map to any known backend
    #[error("Cache driver [{0}] is not currently supported")]
    UnsupportedDriver(String),

    /// File backend directory could not be created or written to
    #[error("The storage path \"{}\" is not writable: {source}", .path.display())]
    StorageNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Networked cache service unreachable or not configured
    #[error("Connection error: {0}")]
    Connection(String),

    /// Storage read failed for a reason other than a missing entry
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded, or decoded into the requested type
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A networked client call failed
    #[error("Backend error: {0}")]
    Backend(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache facade.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_driver_message() {
        let err = CacheError::UnsupportedDriver("redis".to_string());
        assert_eq!(err.to_string(), "Cache driver [redis] is not currently supported");
    }

    #[test]
    fn test_storage_not_writable_keeps_source() {
        let err = CacheError::StorageNotWritable {
            path: PathBuf::from("/nope"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("/nope"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
