//! Cycle orchestrator — one complete poll of the cluster.
//!
//! A cycle fetches the five groups in order, tallies and flattens them,
//! fans out over the running allocations, and finally rebuilds the task
//! registry. The graph schema is always derived from the registry as it
//! stood before the cycle, so a newly seen task is advertised starting with
//! the following cycle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use nomadmon_api::DataSource;

use crate::collector::AllocationCollector;
use crate::error::{CycleResult, EntityKind, UnrecognizedStatusLabel};
use crate::flatten::{flatten_deployments, flatten_jobs};
use crate::metric::MetricSet;
use crate::registry::TaskRegistry;
use crate::schema::GraphSchema;
use crate::sink::MetricSink;
use crate::tally::{MEMBER_STATUSES, NODE_STATUSES, tally};

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Collecting,
}

/// Everything one successful cycle produced.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub metrics: MetricSet,
    pub anomalies: Vec<UnrecognizedStatusLabel>,
    pub allocations_collected: usize,
    pub allocations_failed: usize,
    pub elapsed: Duration,
}

/// Drives poll cycles against a [`DataSource`] and owns the
/// [`TaskRegistry`].
pub struct CycleOrchestrator {
    source: Arc<dyn DataSource>,
    collector: AllocationCollector,
    registry: TaskRegistry,
    state_file: Option<PathBuf>,
    phase: CyclePhase,
}

impl CycleOrchestrator {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            collector: AllocationCollector::new(Arc::clone(&source)),
            source,
            registry: TaskRegistry::new(),
            state_file: None,
            phase: CyclePhase::Idle,
        }
    }

    /// Bound the allocation fan-out. `0` removes the bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.collector = self.collector.with_max_concurrency(max_concurrency);
        self
    }

    /// Start from a previously saved registry.
    pub fn with_registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Save the registry to `path` after every successful cycle.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Graph schema for the registry as it stands now.
    pub fn schema(&self) -> GraphSchema {
        GraphSchema::describe(&self.registry)
    }

    /// Run one cycle.
    ///
    /// A failed group fetch aborts the cycle: no metrics are returned and
    /// the registry keeps its previous contents.
    pub async fn run_cycle(&mut self) -> CycleResult<CycleReport> {
        self.phase = CyclePhase::Collecting;
        let result = self.collect().await;
        self.phase = CyclePhase::Idle;
        result
    }

    async fn collect(&mut self) -> CycleResult<CycleReport> {
        let start = Instant::now();

        let jobs = self.source.list_jobs().await?;
        let deployments = self.source.list_deployments().await?;
        let members = self.source.list_agent_members().await?;
        let nodes = self.source.list_nodes().await?;
        let allocations = self.source.list_running_allocations().await?;
        debug!(
            jobs = jobs.len(),
            deployments = deployments.len(),
            members = members.len(),
            nodes = nodes.len(),
            allocations = allocations.len(),
            "groups fetched"
        );

        let mut metrics = MetricSet::new();
        let mut anomalies = Vec::new();

        let (counts, unknown) = tally(
            EntityKind::AgentMember,
            members.iter().map(|m| m.status.as_str()),
            MEMBER_STATUSES,
        )
        .into_parts();
        metrics.extend(counts);
        anomalies.extend(unknown);

        let (counts, unknown) = tally(
            EntityKind::Node,
            nodes.iter().map(|n| n.effective_status()),
            NODE_STATUSES,
        )
        .into_parts();
        metrics.extend(counts);
        anomalies.extend(unknown);

        metrics.extend(flatten_jobs(&jobs));
        metrics.extend(flatten_deployments(&deployments));

        let outcome = self.collector.collect(allocations).await;
        metrics.extend(outcome.metrics);

        self.registry.rebuild(outcome.prefixes);
        if let Some(path) = &self.state_file {
            if let Err(e) = self.registry.save(path) {
                warn!(error = %e, "failed to persist task registry");
            }
        }

        let report = CycleReport {
            metrics,
            anomalies,
            allocations_collected: outcome.collected,
            allocations_failed: outcome.failures.len(),
            elapsed: start.elapsed(),
        };
        info!(
            metrics = report.metrics.len(),
            anomalies = report.anomalies.len(),
            allocations_collected = report.allocations_collected,
            allocations_failed = report.allocations_failed,
            prefixes = self.registry.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "cycle complete"
        );
        Ok(report)
    }

    /// Poll every `interval` until `shutdown` changes.
    ///
    /// Each tick builds the schema, runs a cycle and publishes both to
    /// `sink`. Cycle and sink failures are logged; the loop carries on.
    pub async fn run<S: MetricSink + ?Sized>(
        &mut self,
        interval: Duration,
        sink: &mut S,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "poll loop started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let schema = self.schema();
                    match self.run_cycle().await {
                        Ok(report) => {
                            if let Err(e) = sink.publish(&schema, &report.metrics) {
                                error!(error = %e, "publish failed");
                            }
                        }
                        Err(e) => warn!(error = %e, "cycle aborted"),
                    }
                }
                _ = shutdown.changed() => {
                    info!("poll loop shutting down");
                    break;
                }
            }
        }
    }
}
