//! Prometheus metrics for the sync engine
//!
//! Provides observability metrics for monitoring sync runs in production.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

lazy_static! {
    /// Histogram: sync duration per ImsProject (seconds)
    pub static ref PROJECT_SYNC_DURATION: HistogramVec = register_histogram_vec!(
        "archsync_project_sync_duration_seconds",
        "Duration of one project's incoming and outgoing pass",
        &["project"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("Failed to create project_sync_duration metric");

    /// Counter: project passes that ended in an error, by error kind
    pub static ref PROJECT_ERRORS: CounterVec = register_counter_vec!(
        "archsync_project_errors_total",
        "Project sync failures by error kind",
        &["project", "kind"]
    )
    .expect("Failed to create project_errors metric");

    /// Counter: incoming issues processed, by outcome (created/matched/updated)
    pub static ref ISSUES_IMPORTED: CounterVec = register_counter_vec!(
        "archsync_issues_imported_total",
        "Incoming issues processed",
        &["project", "outcome"]
    )
    .expect("Failed to create issues_imported metric");

    /// Counter: outgoing pushes by kind
    pub static ref OUTGOING_PUSHES: CounterVec = register_counter_vec!(
        "archsync_outgoing_pushes_total",
        "Changes pushed to external trackers",
        &["project", "kind"]
    )
    .expect("Failed to create outgoing_pushes metric");

    /// Counter: walker process() calls by outcome
    pub static ref WALKER_RUNS: CounterVec = register_counter_vec!(
        "archsync_walker_runs_total",
        "Resource walker runs by outcome",
        &["source", "outcome"]
    )
    .expect("Failed to create walker_runs metric");

    /// Counter: aggregated issue changes
    pub static ref AGGREGATION_CHANGES: CounterVec = register_counter_vec!(
        "archsync_aggregation_changes_total",
        "Aggregated issue creations, deletions and membership changes",
        &["action"]
    )
    .expect("Failed to create aggregation_changes metric");

    /// Gauge: daemon health status (1 = healthy, 0 = unhealthy)
    pub static ref HEALTH_STATUS: Gauge = register_gauge!(
        "archsync_health_status",
        "Daemon health status (1 = healthy, 0 = unhealthy)"
    )
    .expect("Failed to create health_status metric");

    /// Counter: total sync cycles completed
    pub static ref SYNC_CYCLES: CounterVec = register_counter_vec!(
        "archsync_sync_cycles_total",
        "Total sync cycles by status",
        &["status"]
    )
    .expect("Failed to create sync_cycles metric");
}

pub fn record_project_duration(project: &str, duration_secs: f64) {
    PROJECT_SYNC_DURATION
        .with_label_values(&[project])
        .observe(duration_secs);
}

pub fn record_project_error(project: &str, kind: &str) {
    PROJECT_ERRORS.with_label_values(&[project, kind]).inc();
}

pub fn record_issue_imported(project: &str, outcome: &str) {
    ISSUES_IMPORTED.with_label_values(&[project, outcome]).inc();
}

pub fn record_outgoing_push(project: &str, kind: &str) {
    OUTGOING_PUSHES.with_label_values(&[project, kind]).inc();
}

pub fn record_walker_outcome(source: &str, outcome: &str) {
    WALKER_RUNS.with_label_values(&[source, outcome]).inc();
}

pub fn record_aggregation_change(action: &str) {
    AGGREGATION_CHANGES.with_label_values(&[action]).inc();
}

/// Set health status
pub fn set_health_status(healthy: bool) {
    HEALTH_STATUS.set(if healthy { 1.0 } else { 0.0 });
}

/// Record a sync cycle completion
pub fn record_sync_cycle(status: &str) {
    SYNC_CYCLES.with_label_values(&[status]).inc();
}

/// Encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_exported() {
        record_project_duration("gh-payments", 1.5);
        record_project_error("gh-payments", "remote");
        record_issue_imported("gh-payments", "created");
        record_outgoing_push("gh-payments", "comment");
        record_walker_outcome("gh-payments", "deferred");
        record_aggregation_change("created");
        set_health_status(true);
        record_sync_cycle("success");

        let output = gather_metrics();
        assert!(output.contains("archsync_project_sync_duration_seconds"));
        assert!(output.contains("archsync_walker_runs_total"));
        assert!(output.contains("archsync_aggregation_changes_total"));
    }
}
