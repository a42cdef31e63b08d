//! Configuration system
//!
//! Loads ~/.config/archsync/config.yaml with support for:
//! - Database location
//! - Dereplication strategy and thresholds
//! - Walker priorities and quota
//! - Outgoing sync defaults for new projects
//! - Daemon interval

mod sync_config;
pub mod validation;

pub use sync_config::{
    DaemonSection, DatabaseConfig, DereplicatorConfig, SyncConfig, WalkerConfig,
};
pub use validation::{validate_config, validate_config_result, ValidationError};
