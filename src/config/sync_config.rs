use crate::dereplication::{
    HeuristicDereplicator, InvasiveDereplicator, IssueDereplicator, NullDereplicator,
};
use crate::graph::{ImsProject, ImsProjectId, OutgoingGates, TrackableRef};
use crate::storage::{StoreConfig, WalkerPriorityStore};
use crate::sync::DaemonConfig;
use crate::walker::{CursorResourceWalker, CursorWalkerExecutor, QuotaBudget, WalkerSettings};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// SQLite store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

fn default_database_path() -> PathBuf {
    StoreConfig::default().path
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            wal_mode: true,
        }
    }
}

impl DatabaseConfig {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.path.clone(),
            wal_mode: self.wal_mode,
        }
    }
}

/// Which dereplication strategy is active
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DereplicatorConfig {
    #[default]
    #[serde(rename = "none")]
    Null,
    Heuristic {
        #[serde(default = "default_issue_threshold")]
        issue_threshold: f64,
        #[serde(default = "default_comment_threshold")]
        comment_threshold: f64,
    },
    Invasive,
}

fn default_issue_threshold() -> f64 {
    0.66
}

fn default_comment_threshold() -> f64 {
    1.0
}

impl DereplicatorConfig {
    pub fn build(&self) -> Box<dyn IssueDereplicator> {
        match self {
            DereplicatorConfig::Null => Box::new(NullDereplicator),
            DereplicatorConfig::Heuristic {
                issue_threshold,
                comment_threshold,
            } => Box::new(HeuristicDereplicator::new(*issue_threshold, *comment_threshold)),
            DereplicatorConfig::Invasive => Box::new(InvasiveDereplicator),
        }
    }
}

/// Walker scheduling and quota
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkerConfig {
    #[serde(flatten)]
    pub settings: WalkerSettings,

    /// Points charged when a walker's execution fails
    #[serde(default = "default_failure_cost")]
    pub failure_cost: u64,

    /// Points available per fetch round
    #[serde(default = "default_quota")]
    pub quota: u64,

    /// Points never handed out to walkers
    #[serde(default)]
    pub quota_reserve: u64,
}

fn default_failure_cost() -> u64 {
    10
}

fn default_quota() -> u64 {
    5000
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            settings: WalkerSettings::default(),
            failure_cost: default_failure_cost(),
            quota: default_quota(),
            quota_reserve: 0,
        }
    }
}

impl WalkerConfig {
    /// Fresh budget for one fetch round
    pub fn budget(&self) -> QuotaBudget {
        QuotaBudget::new(self.quota).with_reserve(self.quota_reserve)
    }

    /// Points charged against the round's budget when an execution fails
    pub fn failure_usage(&self) -> u64 {
        self.failure_cost
    }

    /// Cursor walker over one resource of `source_id`, scheduled with these settings
    pub fn cursor_walker<E>(
        &self,
        source_id: impl Into<String>,
        resource_name: impl Into<String>,
        store: Arc<dyn WalkerPriorityStore>,
        executor: E,
    ) -> CursorResourceWalker<QuotaBudget, E>
    where
        E: CursorWalkerExecutor<QuotaBudget>,
    {
        CursorResourceWalker::new(
            source_id,
            resource_name,
            self.settings,
            self.failure_usage(),
            store,
            executor,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_interval_secs() -> u64 {
    300
}

fn default_event_channel_capacity() -> usize {
    crate::sync::DEFAULT_EVENT_CHANNEL_CAPACITY
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// archsync configuration
///
/// Represents the complete ~/.config/archsync/config.yaml file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub dereplicator: DereplicatorConfig,

    #[serde(default)]
    pub walker: WalkerConfig,

    /// Gates applied to newly registered projects
    #[serde(default)]
    pub outgoing: OutgoingGates,

    #[serde(default)]
    pub daemon: DaemonSection,
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default path (~/.config/archsync/config.yaml)
    pub fn load_default() -> Result<Self> {
        Self::load(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::ArchSyncError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading archsync configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            database = %config.database.path.display(),
            dereplicator = ?config.dereplicator,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving archsync configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/archsync/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("archsync");
        path.push("config.yaml");
        path
    }

    /// Register a tracker project with the configured outgoing gates
    pub fn new_project(
        &self,
        id: impl Into<ImsProjectId>,
        name: impl Into<String>,
        trackable: TrackableRef,
    ) -> ImsProject {
        ImsProject::new(id, name, trackable).with_outgoing(self.outgoing)
    }

    pub fn daemon_config(&self) -> DaemonConfig {
        DaemonConfig::default()
            .with_sync_interval(Duration::from_secs(self.daemon.interval_secs))
            .with_event_channel_capacity(self.daemon.event_channel_capacity)
    }
}
