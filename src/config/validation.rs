//! Configuration validation
//!
//! Validates archsync configuration for correctness:
//! - Dereplication thresholds are fractions
//! - Walker priorities move in the right direction
//! - The database path and daemon interval are usable

use super::sync_config::{DereplicatorConfig, SyncConfig};
use crate::ArchSyncError;

/// Validation error details
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_fraction(field: &str, value: f64, errors: &mut Vec<ValidationError>) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ValidationError::new(
            field,
            format!("Must be between 0 and 1, got {}", value),
        ));
    }
}

/// Validate a configuration, returning every problem found
pub fn validate_config(config: &SyncConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.database.path.as_os_str().is_empty() {
        errors.push(ValidationError::new("database.path", "Path must not be empty"));
    }

    if let DereplicatorConfig::Heuristic {
        issue_threshold,
        comment_threshold,
    } = &config.dereplicator
    {
        check_fraction("dereplicator.issue_threshold", *issue_threshold, &mut errors);
        check_fraction(
            "dereplicator.comment_threshold",
            *comment_threshold,
            &mut errors,
        );
    }

    let walker = &config.walker.settings;
    if !walker.base_priority.is_finite() {
        errors.push(ValidationError::new(
            "walker.base_priority",
            "Priority must be a finite number",
        ));
    }
    if !(walker.priority_increase > 0.0 && walker.priority_increase.is_finite()) {
        errors.push(ValidationError::new(
            "walker.priority_increase",
            format!("Must be positive, got {}", walker.priority_increase),
        ));
    }
    if config.walker.quota_reserve >= config.walker.quota {
        errors.push(ValidationError::new(
            "walker.quota_reserve",
            "Reserve must be smaller than the quota",
        ));
    }

    if config.daemon.interval_secs == 0 {
        errors.push(ValidationError::new(
            "daemon.interval_secs",
            "Interval must be greater than 0",
        ));
    }
    if config.daemon.event_channel_capacity == 0 {
        errors.push(ValidationError::new(
            "daemon.event_channel_capacity",
            "Capacity must be greater than 0",
        ));
    }

    errors
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &SyncConfig) -> crate::Result<()> {
    let errors = validate_config(config);
    if errors.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    Err(ArchSyncError::Config(format!(
        "Configuration validation failed:\n  - {}",
        messages.join("\n  - ")
    )))
}
