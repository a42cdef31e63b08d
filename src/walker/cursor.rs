//! Cursor resource walker
//!
//! Wraps one paginated remote resource (e.g. "issue list of project X"). The cursor
//! itself lives in the executor; this type only owns the scheduling decision.

use super::budget::ResourceWalkerBudget;
use crate::storage::WalkerPriorityStore;
use crate::sync::metrics;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persisted scheduling state, one row per (source, resource)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorResourceWalkerData {
    pub source_id: String,
    pub resource_name: String,
    /// Lower is more urgent
    pub current_priority: f64,
}

impl CursorResourceWalkerData {
    pub fn new(source_id: impl Into<String>, resource_name: impl Into<String>, priority: f64) -> Self {
        Self {
            source_id: source_id.into(),
            resource_name: resource_name.into(),
            current_priority: priority,
        }
    }
}

/// Priority tuning shared by all walkers of a source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkerSettings {
    /// Priority a walker starts at and returns to after running
    #[serde(default = "default_base_priority")]
    pub base_priority: f64,

    /// How much more urgent a walker gets each time the budget turns it away
    #[serde(default = "default_priority_increase")]
    pub priority_increase: f64,
}

fn default_base_priority() -> f64 {
    100.0
}

fn default_priority_increase() -> f64 {
    10.0
}

impl Default for WalkerSettings {
    fn default() -> Self {
        Self {
            base_priority: default_base_priority(),
            priority_increase: default_priority_increase(),
        }
    }
}

/// What a call to `process` did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WalkerOutcome {
    /// Ran and succeeded
    Executed,
    /// Ran and failed; the failure cost was charged
    Failed,
    /// Budget said no; priority now at the contained value
    Deferred { priority: f64 },
}

/// A unit of budget-gated fetch work
#[async_trait]
pub trait ResourceWalker<B: ResourceWalkerBudget + 'static>: Send + Sync {
    /// Resource name, unique within the walker's source
    fn resource_name(&self) -> &str;

    /// Current persisted priority (lower is more urgent)
    async fn priority(&self) -> Result<f64>;

    /// Priority to rank by when the persisted one cannot be read
    fn base_priority(&self) -> f64 {
        default_base_priority()
    }

    /// Run if the budget allows, otherwise become more urgent
    async fn process(&mut self, budget: &mut B) -> Result<WalkerOutcome>;
}

/// The remote side of a cursor walker: fetch the next page(s) and stage the data
#[async_trait]
pub trait CursorWalkerExecutor<B: ResourceWalkerBudget + 'static>: Send + Sync {
    fn estimated_usage(&self) -> B::EstimatedUsage;

    async fn execute(&mut self) -> Result<B::Usage>;
}

/// Walker with a persisted priority and a budget-gated executor
pub struct CursorResourceWalker<B: ResourceWalkerBudget + 'static, E> {
    source_id: String,
    resource_name: String,
    settings: WalkerSettings,
    failure_usage: B::Usage,
    store: Arc<dyn WalkerPriorityStore>,
    executor: E,
}

impl<B, E> CursorResourceWalker<B, E>
where
    B: ResourceWalkerBudget + 'static,
    E: CursorWalkerExecutor<B>,
{
    /// Create a walker
    ///
    /// `failure_usage` is charged against the budget whenever the executor fails.
    pub fn new(
        source_id: impl Into<String>,
        resource_name: impl Into<String>,
        settings: WalkerSettings,
        failure_usage: B::Usage,
        store: Arc<dyn WalkerPriorityStore>,
        executor: E,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            resource_name: resource_name.into(),
            settings,
            failure_usage,
            store,
            executor,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    async fn store_priority(&self, priority: f64) -> Result<()> {
        self.store
            .set_walker_priority(&CursorResourceWalkerData::new(
                &self.source_id,
                &self.resource_name,
                priority,
            ))
            .await
    }
}

#[async_trait]
impl<B, E> ResourceWalker<B> for CursorResourceWalker<B, E>
where
    B: ResourceWalkerBudget + 'static,
    E: CursorWalkerExecutor<B>,
{
    fn resource_name(&self) -> &str {
        &self.resource_name
    }

    fn base_priority(&self) -> f64 {
        self.settings.base_priority
    }

    async fn priority(&self) -> Result<f64> {
        Ok(self
            .store
            .walker_priority(&self.source_id, &self.resource_name)
            .await?
            .unwrap_or(self.settings.base_priority))
    }

    async fn process(&mut self, budget: &mut B) -> Result<WalkerOutcome> {
        let estimated = self.executor.estimated_usage();
        if !budget.may_execute(&estimated) {
            let priority = self.priority().await? - self.settings.priority_increase;
            self.store_priority(priority).await?;
            debug!(
                source = %self.source_id,
                resource = %self.resource_name,
                priority,
                "Walker deferred by budget"
            );
            metrics::record_walker_outcome(&self.source_id, "deferred");
            return Ok(WalkerOutcome::Deferred { priority });
        }

        let outcome = match self.executor.execute().await {
            Ok(usage) => {
                budget.integrate(usage);
                WalkerOutcome::Executed
            }
            Err(e) => {
                warn!(
                    source = %self.source_id,
                    resource = %self.resource_name,
                    error = %e,
                    "Walker execution failed"
                );
                budget.integrate(self.failure_usage.clone());
                WalkerOutcome::Failed
            }
        };

        self.store_priority(self.settings.base_priority).await?;
        metrics::record_walker_outcome(
            &self.source_id,
            if outcome == WalkerOutcome::Executed {
                "executed"
            } else {
                "failed"
            },
        );
        Ok(outcome)
    }
}
