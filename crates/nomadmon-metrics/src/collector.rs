//! Concurrent allocation collector.
//!
//! Fans out one task per running allocation. Each task fetches the
//! allocation detail and then its resource usage, and returns an
//! [`AllocationContribution`]. Contributions flow back through a
//! [`JoinSet`] and are merged by the caller's task alone, so nothing is
//! shared between the spawned tasks except the data source.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use nomadmon_api::{AllocResourceUsage, Allocation, DataSource};

use crate::error::CollectError;

/// Per-task metric suffixes, in reporting order.
pub const TASK_FIELDS: &[&str] = &[
    "cpu_percent",
    "cpu_totalticks",
    "memory_rss_bytes",
    "allocated_memory_megabytes",
];

/// Default bound on concurrent allocation fetches.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// What one allocation adds to a cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationContribution {
    pub allocation_id: String,
    /// `<prefix>.<allocShort>.<field>` entries.
    pub metrics: Vec<(String, f64)>,
    /// Task-identity prefixes (`job_group_task`), one per task.
    pub prefixes: Vec<String>,
}

/// Build the contribution for one allocation from its detail record and
/// resource usage.
///
/// Tasks come from the detail's task-state map, sorted by name. A task with
/// no usage entry reports zero usage; a task with no resource entry reports
/// a zero memory budget.
pub fn contribution_for(
    detail: &Allocation,
    usage: &AllocResourceUsage,
) -> AllocationContribution {
    let mut tasks: Vec<&str> = detail.task_states.keys().map(String::as_str).collect();
    tasks.sort_unstable();

    let short_id = detail.short_id();
    let mut out = AllocationContribution {
        allocation_id: detail.id.clone(),
        metrics: Vec::with_capacity(tasks.len() * TASK_FIELDS.len()),
        prefixes: Vec::with_capacity(tasks.len()),
    };

    for task in tasks {
        let prefix = format!("{}_{}_{}", detail.job_id, detail.task_group, task);
        let unique = format!("{prefix}.{short_id}");

        let (cpu_percent, cpu_ticks, rss) = match usage.tasks.get(task) {
            Some(t) => {
                let r = &t.resource_usage;
                (r.cpu_stats.percent, r.cpu_stats.total_ticks, r.memory_stats.rss as f64)
            }
            None => {
                debug!(allocation_id = %detail.id, %task, "no usage reported for task");
                (0.0, 0.0, 0.0)
            }
        };
        let budget = detail.memory_budget_mb(task).unwrap_or(0) as f64;

        let values = [cpu_percent, cpu_ticks, rss, budget];
        for (field, value) in TASK_FIELDS.iter().zip(values) {
            out.metrics.push((format!("{unique}.{field}"), value));
        }
        out.prefixes.push(prefix);
    }

    out
}

/// Result of one fan-out.
#[derive(Debug, Default)]
pub struct CollectOutcome {
    /// Merged metrics of every allocation that succeeded.
    pub metrics: Vec<(String, f64)>,
    /// Task-identity prefixes, in input allocation order. May repeat.
    pub prefixes: Vec<String>,
    /// Number of allocations that contributed.
    pub collected: usize,
    /// Allocations that were skipped, and why.
    pub failures: Vec<CollectError>,
}

/// Fetches detail and stats for many allocations concurrently.
pub struct AllocationCollector {
    source: Arc<dyn DataSource>,
    max_concurrency: usize,
}

impl AllocationCollector {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Bound the number of allocations fetched at once. `0` removes the
    /// bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Collect every allocation in `allocations`.
    ///
    /// Returns once all spawned tasks have finished. Failures are logged
    /// and reported in [`CollectOutcome::failures`]; they never affect the
    /// other allocations.
    pub async fn collect(&self, allocations: Vec<Allocation>) -> CollectOutcome {
        let start = Instant::now();
        let total = allocations.len();
        let limiter = (self.max_concurrency > 0)
            .then(|| Arc::new(Semaphore::new(self.max_concurrency)));

        let mut set = JoinSet::new();
        let mut owners = HashMap::with_capacity(total);

        for (index, alloc) in allocations.into_iter().enumerate() {
            let source = Arc::clone(&self.source);
            let limiter = limiter.clone();
            let allocation_id = alloc.id.clone();

            let handle = set.spawn(async move {
                let _permit = match limiter {
                    Some(sem) => match sem.acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(e) => {
                            return (
                                index,
                                Err(CollectError::TaskAborted {
                                    allocation_id: alloc.id,
                                    reason: e.to_string(),
                                }),
                            );
                        }
                    },
                    None => None,
                };
                (index, collect_one(source.as_ref(), alloc).await)
            });
            owners.insert(handle.id(), (index, allocation_id));
        }

        let mut succeeded = Vec::with_capacity(total);
        let mut failures = Vec::new();

        while let Some(joined) = set.join_next().await {
            let (index, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    let (index, allocation_id) = owners.remove(&e.id()).unwrap_or_default();
                    let reason = if e.is_panic() { "panicked" } else { "cancelled" };
                    (
                        index,
                        Err(CollectError::TaskAborted {
                            allocation_id,
                            reason: reason.to_string(),
                        }),
                    )
                }
            };
            match result {
                Ok(contribution) => succeeded.push((index, contribution)),
                Err(e) => {
                    warn!(allocation_id = %e.allocation_id(), error = %e, "allocation skipped");
                    failures.push(e);
                }
            }
        }

        // Merge in input order so the prefix order does not depend on
        // which fetch finished first.
        succeeded.sort_unstable_by_key(|(index, _)| *index);

        let mut outcome = CollectOutcome {
            collected: succeeded.len(),
            failures,
            ..Default::default()
        };
        for (_, contribution) in succeeded {
            outcome.metrics.extend(contribution.metrics);
            outcome.prefixes.extend(contribution.prefixes);
        }

        debug!(
            allocations = total,
            collected = outcome.collected,
            failed = outcome.failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "allocation fan-out complete"
        );
        outcome
    }
}

async fn collect_one(
    source: &dyn DataSource,
    alloc: Allocation,
) -> Result<AllocationContribution, CollectError> {
    let detail = source
        .get_allocation_detail(&alloc.id)
        .await
        .map_err(|e| CollectError::AllocationDetailUnavailable {
            allocation_id: alloc.id.clone(),
            source: e,
        })?;

    let usage = source
        .get_allocation_stats(&detail)
        .await
        .map_err(|e| CollectError::AllocationStatsUnavailable {
            allocation_id: alloc.id.clone(),
            source: e,
        })?;

    Ok(contribution_for(&detail, &usage))
}
