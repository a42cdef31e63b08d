//! Error types for archsync
//!
//! Defines the error enum covering every failure mode of the sync engine, plus the
//! classification used at project boundaries to decide between "log and move on",
//! "log and notify" and "abort this project's pass".
//! Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Result type alias for archsync operations
pub type Result<T> = std::result::Result<T, ArchSyncError>;

/// Error type for archsync operations
#[derive(Error, Debug)]
pub enum ArchSyncError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage/database errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// A node referenced by ID does not exist in the graph
    #[error("{kind} not found: {id}")]
    NodeNotFound { kind: &'static str, id: String },

    /// The graph is in a state the engine cannot reason about
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Remote tracker call failed
    #[error("Remote error: {0}")]
    Remote(String),

    /// Authentication against the remote tracker failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Tracker adapter reported a failure
    #[error("Integration error: {0}")]
    Integration(String),

    /// Rate limited (with optional retry-after duration in seconds)
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Errors bubbled up from tracker adapters
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

/// How a failure should be handled at a project boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Remote hiccup; absorbed by walker budget accounting and retried on a later pass
    Transient,
    /// Ends this project's pass; other projects continue
    ProjectFatal,
    /// Programmer error or inconsistent graph; ends this project's pass
    InvariantViolation,
}

impl ArchSyncError {
    /// Shorthand for a missing node
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        ArchSyncError::NodeNotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            ArchSyncError::Remote(_) | ArchSyncError::RateLimited(_) => ErrorClass::Transient,
            ArchSyncError::NodeNotFound { .. } | ArchSyncError::Invariant(_) => {
                ErrorClass::InvariantViolation
            }
            _ => ErrorClass::ProjectFatal,
        }
    }

    /// Whether a project failure with this error should be reported to a human
    pub fn is_notifiable(&self) -> bool {
        matches!(
            self,
            ArchSyncError::Remote(_)
                | ArchSyncError::Auth(_)
                | ArchSyncError::Integration(_)
                | ArchSyncError::RateLimited(_)
        )
    }

    /// Short label used for metrics
    pub fn kind_label(&self) -> &'static str {
        match self {
            ArchSyncError::Config(_) => "config",
            ArchSyncError::Storage(_) | ArchSyncError::Database(_) => "storage",
            ArchSyncError::NodeNotFound { .. } | ArchSyncError::Invariant(_) => "invariant",
            ArchSyncError::Remote(_) => "remote",
            ArchSyncError::Auth(_) => "auth",
            ArchSyncError::Integration(_) | ArchSyncError::Anyhow(_) => "integration",
            ArchSyncError::RateLimited(_) => "rate_limited",
            ArchSyncError::Io(_) => "io",
            ArchSyncError::Json(_) | ArchSyncError::Yaml(_) => "serialization",
            ArchSyncError::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            ArchSyncError::Remote("502".into()).class(),
            ErrorClass::Transient
        );
        assert_eq!(
            ArchSyncError::not_found("Issue", "i-1").class(),
            ErrorClass::InvariantViolation
        );
        assert_eq!(
            ArchSyncError::Config("bad".into()).class(),
            ErrorClass::ProjectFatal
        );
    }

    #[test]
    fn test_notifiable() {
        assert!(ArchSyncError::Auth("expired token".into()).is_notifiable());
        assert!(ArchSyncError::RateLimited(60).is_notifiable());
        assert!(!ArchSyncError::Invariant("dangling".into()).is_notifiable());
    }

    #[test]
    fn test_not_found_message() {
        let err = ArchSyncError::not_found("ComponentVersion", "cv-7");
        assert_eq!(err.to_string(), "ComponentVersion not found: cv-7");
    }
}
