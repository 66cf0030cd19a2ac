//! Error types for hostfacts.
//!
//! Environment-induced absence (missing files, absent tools, unreadable
//! pseudo-filesystems) is never an error: probes report absent and the
//! collection degrades to omission. The error type exists for the failures
//! that do matter — defects in the collection logic itself (a malformed
//! fact fragment) and I/O at the reporting boundary.
//!
//! Errors carry stable codes grouped by category for machine parsing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for hostfacts operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Fact collection and merge errors.
    Collection,
    /// Overlay tool integration errors.
    Overlay,
    /// Platform compatibility errors.
    Platform,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Collection => write!(f, "collection"),
            ErrorCategory::Overlay => write!(f, "overlay"),
            ErrorCategory::Platform => write!(f, "platform"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for hostfacts.
#[derive(Error, Debug)]
pub enum Error {
    // Collection errors (10-19)
    #[error("fact collection failed: {0}")]
    Collection(String),

    /// A fragment violated the namespace invariants. This indicates a
    /// defect in a parser or collector, not an unusual environment, and
    /// halts the run.
    #[error("malformed fact fragment from {source_name}: {reason}")]
    MalformedFragment { source_name: String, reason: String },

    // Overlay errors (20-29)
    #[error("overlay tool failed: {0}")]
    Overlay(String),

    // Platform errors (30-39)
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    // I/O errors (40-49)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the stable error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            Error::Collection(_) => 10,
            Error::MalformedFragment { .. } => 11,
            Error::Overlay(_) => 20,
            Error::UnsupportedPlatform(_) => 30,
            Error::Io(_) => 40,
            Error::Json(_) => 41,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Collection(_) | Error::MalformedFragment { .. } => ErrorCategory::Collection,
            Error::Overlay(_) => ErrorCategory::Overlay,
            Error::UnsupportedPlatform(_) => ErrorCategory::Platform,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // A fresh collection pass may succeed.
            Error::Collection(_) => true,
            // A malformed fragment is a logic defect; retrying won't help.
            Error::MalformedFragment { .. } => false,
            // Overlay tools are optional by contract.
            Error::Overlay(_) => true,
            Error::UnsupportedPlatform(_) => false,
            // I/O is often transient.
            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Collection("x".into()).code(), 10);
        assert_eq!(
            Error::MalformedFragment {
                source_name: "network".into(),
                reason: "empty key".into()
            }
            .code(),
            11
        );
        assert_eq!(Error::UnsupportedPlatform("Plan9".into()).code(), 30);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            Error::Collection("x".into()).category(),
            ErrorCategory::Collection
        );
        assert_eq!(Error::Overlay("x".into()).category(), ErrorCategory::Overlay);
        assert_eq!(
            Error::UnsupportedPlatform("x".into()).category(),
            ErrorCategory::Platform
        );
    }

    #[test]
    fn test_malformed_fragment_is_not_recoverable() {
        let err = Error::MalformedFragment {
            source_name: "hardware".into(),
            reason: "wrong field arity".into(),
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("hardware"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Collection.to_string(), "collection");
        assert_eq!(ErrorCategory::Io.to_string(), "io");
    }
}
