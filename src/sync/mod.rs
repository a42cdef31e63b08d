//! Sync engine
//!
//! The orchestrator pulling external tracker data into the graph and pushing local changes
//! back, the collaborator contracts tracker adapters implement, and the daemon running it
//! on a schedule.

mod daemon;
mod data_service;
mod incoming;
pub mod metrics;
mod orchestrator;
mod outgoing;
mod source;

pub use daemon::{
    DaemonConfig, SyncCommand, SyncDaemon, SyncEvent, DEFAULT_EVENT_CHANNEL_CAPACITY,
    DEFAULT_SYNC_INTERVAL,
};
pub use data_service::SyncDataService;
pub use orchestrator::{
    default_dummy_user, ProjectOutcome, ProjectReport, ProjectStats, SyncOrchestrator, SyncReport,
};
pub use outgoing::{plan_outgoing, should_sync_type, PlannedPush, PushKind, ToggleEvent};
pub use source::{
    DataFetcher, IncomingIssue, IncomingTimelineItem, LoggingNotifier, SyncNotifier, SyncSource,
};
