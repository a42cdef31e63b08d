//! Sync daemon
//!
//! Runs the orchestrator on a fixed interval as a tokio event loop. Commands arrive over
//! an mpsc channel, progress goes out over a broadcast channel, and SIGTERM/SIGINT stop
//! the loop between cycles.

use super::metrics;
use super::orchestrator::{ProjectOutcome, SyncOrchestrator, SyncReport};
use crate::{ArchSyncError, Result};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Default sync interval (5 minutes)
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Default event channel capacity (1000 events)
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub sync_interval: Duration,
    pub event_channel_capacity: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl DaemonConfig {
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}

/// Events emitted by the daemon
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Started,
    Stopped,
    CycleStarted,
    CycleCompleted {
        report: SyncReport,
    },
    ProjectFailed {
        project: String,
        message: String,
    },
}

/// Commands accepted by the daemon
#[derive(Debug, Clone)]
pub enum SyncCommand {
    /// Run a cycle right away
    SyncNow,
    SetInterval(Duration),
    Shutdown,
}

enum CommandResult {
    Continue,
    Stop,
}

pub struct SyncDaemon {
    config: DaemonConfig,
    orchestrator: SyncOrchestrator,
    event_tx: broadcast::Sender<SyncEvent>,
    command_rx: Option<mpsc::Receiver<SyncCommand>>,
    command_tx: mpsc::Sender<SyncCommand>,
    running: bool,
    cycles: u64,
}

impl SyncDaemon {
    pub fn new(config: DaemonConfig, orchestrator: SyncOrchestrator) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);
        let (command_tx, command_rx) = mpsc::channel(100);
        Self {
            config,
            orchestrator,
            event_tx,
            command_rx: Some(command_rx),
            command_tx,
            running: false,
            cycles: 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    pub fn command_sender(&self) -> mpsc::Sender<SyncCommand> {
        self.command_tx.clone()
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Completed cycles since start
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Send an event, logging if dropped due to no receivers or channel full
    fn send_event(&self, event: SyncEvent) {
        match self.event_tx.send(event) {
            Ok(receiver_count) => {
                let capacity = self.config.event_channel_capacity;
                let len = self.event_tx.len();
                if len > capacity * 80 / 100 {
                    tracing::warn!(
                        current = len,
                        capacity = capacity,
                        threshold_pct = 80,
                        "Event channel nearing capacity"
                    );
                }
                if receiver_count == 0 {
                    tracing::debug!("Event sent but no receivers subscribed");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Event dropped, no receivers");
            }
        }
    }

    /// Run until shutdown is requested
    pub async fn run(&mut self) -> Result<()> {
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| ArchSyncError::Config("Daemon already running".to_string()))?;

        self.running = true;
        metrics::set_health_status(true);
        self.send_event(SyncEvent::Started);
        tracing::info!(
            interval_secs = self.config.sync_interval.as_secs(),
            source = self.orchestrator.source_name(),
            "Sync daemon started"
        );

        let mut interval = tokio::time::interval(self.config.sync_interval);

        #[cfg(unix)]
        {
            self.run_with_signals(&mut interval, &mut command_rx).await?;
        }

        #[cfg(not(unix))]
        {
            self.run_without_signals(&mut interval, &mut command_rx)
                .await;
        }

        self.running = false;
        metrics::set_health_status(false);
        tracing::info!(cycles = self.cycles, "Sync daemon shutdown complete");
        self.send_event(SyncEvent::Stopped);
        Ok(())
    }

    #[cfg(unix)]
    async fn run_with_signals(
        &mut self,
        interval: &mut tokio::time::Interval,
        command_rx: &mut mpsc::Receiver<SyncCommand>,
    ) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).map_err(|e| {
            ArchSyncError::Other(format!("Failed to set up SIGTERM handler: {}", e))
        })?;
        let mut sigint = signal(SignalKind::interrupt()).map_err(|e| {
            ArchSyncError::Other(format!("Failed to set up SIGINT handler: {}", e))
        })?;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
                Some(cmd) = command_rx.recv() => {
                    match self.handle_command(cmd, interval).await {
                        CommandResult::Continue => {}
                        CommandResult::Stop => break,
                    }
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, initiating graceful shutdown");
                    break;
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT, initiating graceful shutdown");
                    break;
                }
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn run_without_signals(
        &mut self,
        interval: &mut tokio::time::Interval,
        command_rx: &mut mpsc::Receiver<SyncCommand>,
    ) {
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
                Some(cmd) = command_rx.recv() => {
                    match self.handle_command(cmd, interval).await {
                        CommandResult::Continue => {}
                        CommandResult::Stop => break,
                    }
                }
            }
        }
    }

    async fn handle_command(
        &mut self,
        cmd: SyncCommand,
        interval: &mut tokio::time::Interval,
    ) -> CommandResult {
        match cmd {
            SyncCommand::SyncNow => {
                self.run_cycle().await;
            }
            SyncCommand::SetInterval(duration) => {
                tracing::info!(interval_secs = duration.as_secs(), "Sync interval changed");
                *interval = tokio::time::interval(duration);
                self.config.sync_interval = duration;
            }
            SyncCommand::Shutdown => {
                tracing::info!("Received shutdown command");
                return CommandResult::Stop;
            }
        }
        CommandResult::Continue
    }

    async fn run_cycle(&mut self) {
        self.send_event(SyncEvent::CycleStarted);
        let report = self.orchestrator.sync().await;
        self.cycles += 1;

        for project in &report.projects {
            if let ProjectOutcome::Failed { message, .. } = &project.outcome {
                self.send_event(SyncEvent::ProjectFailed {
                    project: project.project.to_string(),
                    message: message.clone(),
                });
            }
        }
        metrics::set_health_status(report.fetch_error.is_none());
        self.send_event(SyncEvent::CycleCompleted { report });
    }
}
