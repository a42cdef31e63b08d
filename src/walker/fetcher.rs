//! Load-balanced data fetching
//!
//! All walkers of a batch of projects share one budget. They run most-urgent first, so a
//! walker that was starved in earlier rounds gets ahead of the ones that just ran.

use super::budget::ResourceWalkerBudget;
use super::cursor::{ResourceWalker, WalkerOutcome};
use crate::graph::ImsProject;
use crate::sync::DataFetcher;
use crate::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Walker list for a project plus the budget they share
#[async_trait]
pub trait WalkerStrategy: Send + Sync {
    type Budget: ResourceWalkerBudget + 'static;

    /// Fresh budget for one fetch round
    fn create_budget(&self) -> Self::Budget;

    /// Walkers covering the resources of one project
    async fn walkers_for(
        &self,
        project: &ImsProject,
    ) -> Result<Vec<Box<dyn ResourceWalker<Self::Budget>>>>;
}

/// Fetcher draining every project's walkers against a single budget
pub struct LoadBalancedDataFetcher<S> {
    strategy: S,
}

/// Counts from one fetch round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub executed: usize,
    pub failed: usize,
    pub deferred: usize,
}

impl<S: WalkerStrategy> LoadBalancedDataFetcher<S> {
    pub fn new(strategy: S) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Run one round and report what happened
    pub async fn fetch_round(&self, projects: &[ImsProject]) -> Result<FetchSummary> {
        let mut walkers = Vec::new();
        for project in projects {
            match self.strategy.walkers_for(project).await {
                Ok(project_walkers) => walkers.extend(project_walkers),
                Err(e) => warn!(
                    project = %project.id,
                    error = %e,
                    "Failed to create walkers, skipping project"
                ),
            }
        }

        let mut ranked = Vec::with_capacity(walkers.len());
        for walker in walkers {
            let priority = match walker.priority().await {
                Ok(priority) => priority,
                Err(e) => {
                    warn!(
                        resource = walker.resource_name(),
                        error = %e,
                        "Failed to read walker priority, using base priority"
                    );
                    walker.base_priority()
                }
            };
            ranked.push((priority, walker));
        }
        // sort_by is stable: equal priorities keep project order
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut budget = self.strategy.create_budget();
        let mut summary = FetchSummary::default();
        for (priority, mut walker) in ranked {
            debug!(resource = walker.resource_name(), priority, "Processing walker");
            match walker.process(&mut budget).await {
                Ok(WalkerOutcome::Executed) => summary.executed += 1,
                Ok(WalkerOutcome::Failed) => summary.failed += 1,
                Ok(WalkerOutcome::Deferred { .. }) => summary.deferred += 1,
                Err(e) => {
                    warn!(
                        resource = walker.resource_name(),
                        error = %e,
                        "Walker bookkeeping failed"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            projects = projects.len(),
            executed = summary.executed,
            failed = summary.failed,
            deferred = summary.deferred,
            "Fetch round complete"
        );
        Ok(summary)
    }
}

#[async_trait]
impl<S: WalkerStrategy> DataFetcher for LoadBalancedDataFetcher<S> {
    async fn fetch_data(&self, projects: &[ImsProject]) -> Result<()> {
        self.fetch_round(projects).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ComponentId, TrackableRef};
    use crate::walker::QuotaBudget;
    use std::sync::{Arc, Mutex};

    struct FixedWalker {
        name: String,
        priority: f64,
        log: Arc<Mutex<Vec<String>>>,
    }

    /// Walker whose persisted priority cannot be read
    struct UnreadableWalker {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ResourceWalker<QuotaBudget> for UnreadableWalker {
        fn resource_name(&self) -> &str {
            "unreadable"
        }

        async fn priority(&self) -> Result<f64> {
            Err(crate::ArchSyncError::Storage("disk I/O error".to_string()))
        }

        fn base_priority(&self) -> f64 {
            60.0
        }

        async fn process(&mut self, budget: &mut QuotaBudget) -> Result<WalkerOutcome> {
            budget.integrate(1);
            self.log.lock().unwrap().push("unreadable".to_string());
            Ok(WalkerOutcome::Executed)
        }
    }

    #[async_trait]
    impl ResourceWalker<QuotaBudget> for FixedWalker {
        fn resource_name(&self) -> &str {
            &self.name
        }

        async fn priority(&self) -> Result<f64> {
            Ok(self.priority)
        }

        async fn process(&mut self, budget: &mut QuotaBudget) -> Result<WalkerOutcome> {
            if !budget.may_execute(&1) {
                return Ok(WalkerOutcome::Deferred {
                    priority: self.priority - 1.0,
                });
            }
            budget.integrate(1);
            self.log.lock().unwrap().push(self.name.clone());
            Ok(WalkerOutcome::Executed)
        }
    }

    struct FixedStrategy {
        quota: u64,
        walkers: Vec<(&'static str, &'static str, f64)>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl WalkerStrategy for FixedStrategy {
        type Budget = QuotaBudget;

        fn create_budget(&self) -> QuotaBudget {
            QuotaBudget::new(self.quota)
        }

        async fn walkers_for(
            &self,
            project: &ImsProject,
        ) -> Result<Vec<Box<dyn ResourceWalker<QuotaBudget>>>> {
            Ok(self
                .walkers
                .iter()
                .filter(|(p, _, _)| *p == project.id.as_str())
                .map(|(_, name, priority)| {
                    Box::new(FixedWalker {
                        name: name.to_string(),
                        priority: *priority,
                        log: self.log.clone(),
                    }) as Box<dyn ResourceWalker<QuotaBudget>>
                })
                .collect())
        }
    }

    struct MixedStrategy {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl WalkerStrategy for MixedStrategy {
        type Budget = QuotaBudget;

        fn create_budget(&self) -> QuotaBudget {
            QuotaBudget::new(10)
        }

        async fn walkers_for(
            &self,
            _project: &ImsProject,
        ) -> Result<Vec<Box<dyn ResourceWalker<QuotaBudget>>>> {
            let log = &self.log;
            let fixed = |name: &str, priority: f64| -> Box<dyn ResourceWalker<QuotaBudget>> {
                Box::new(FixedWalker {
                    name: name.to_string(),
                    priority,
                    log: log.clone(),
                })
            };
            Ok(vec![
                fixed("labels", 80.0),
                Box::new(UnreadableWalker { log: log.clone() }) as Box<dyn ResourceWalker<QuotaBudget>>,
                fixed("issues", 40.0),
            ])
        }
    }

    fn project(id: &str) -> ImsProject {
        ImsProject::new(id, id, TrackableRef::Component(ComponentId::new("c-1")))
    }

    #[tokio::test]
    async fn test_walkers_run_most_urgent_first_across_projects() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fetcher = LoadBalancedDataFetcher::new(FixedStrategy {
            quota: 10,
            walkers: vec![
                ("p1", "p1-issues", 100.0),
                ("p1", "p1-comments", 50.0),
                ("p2", "p2-issues", 70.0),
                ("p2", "p2-labels", 100.0),
            ],
            log: log.clone(),
        });

        let summary = fetcher
            .fetch_round(&[project("p1"), project("p2")])
            .await
            .unwrap();

        assert_eq!(summary.executed, 4);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["p1-comments", "p2-issues", "p1-issues", "p2-labels"]
        );
    }

    #[tokio::test]
    async fn test_shared_budget_defers_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fetcher = LoadBalancedDataFetcher::new(FixedStrategy {
            quota: 2,
            walkers: vec![
                ("p1", "a", 10.0),
                ("p2", "b", 5.0),
                ("p2", "c", 20.0),
            ],
            log: log.clone(),
        });

        let summary = fetcher
            .fetch_round(&[project("p1"), project("p2")])
            .await
            .unwrap();

        assert_eq!(summary.executed, 2);
        assert_eq!(summary.deferred, 1);
        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_unreadable_priority_falls_back_to_base() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let fetcher = LoadBalancedDataFetcher::new(MixedStrategy { log: log.clone() });

        let summary = fetcher.fetch_round(&[project("p1")]).await.unwrap();

        assert_eq!(summary.executed, 3);
        assert_eq!(*log.lock().unwrap(), vec!["issues", "unreadable", "labels"]);
    }
}
