//! nomadmon-metrics — turns Nomad cluster state into flat metrics.
//!
//! Tallies member and node statuses, flattens job and deployment
//! summaries, collects per-task resource usage from every running
//! allocation concurrently, and tracks the task-identity prefixes that
//! drive the next cycle's graph schema.
//!
//! # Architecture
//!
//! ```text
//! CycleOrchestrator
//!   ├── run_cycle()
//!   │     ├── DataSource group fetches (jobs, deployments, members, nodes, allocations)
//!   │     ├── tally() × 2                → alive, failed, ready, ...
//!   │     ├── flatten_jobs/deployments() → jobs.<job>_<group>.<field>
//!   │     ├── AllocationCollector        → <job>_<group>_<task>.<alloc>.<field>
//!   │     └── TaskRegistry::rebuild()
//!   ├── schema() → GraphSchema (from the registry before the cycle)
//!   └── run()    → periodic poll loop publishing to a MetricSink
//!
//! Plugin exposition
//!   ├── render_values() → "<key>\t<value>\t<epoch>" lines
//!   └── render_meta()   → "# mackerel-agent-plugin" + graph JSON
//! ```

pub mod collector;
pub mod cycle;
pub mod error;
pub mod exposition;
pub mod flatten;
pub mod metric;
pub mod registry;
pub mod schema;
pub mod sink;
pub mod tally;

#[cfg(test)]
mod testing;

pub use collector::{
    AllocationCollector, AllocationContribution, CollectOutcome, DEFAULT_MAX_CONCURRENCY,
};
pub use cycle::{CycleOrchestrator, CyclePhase, CycleReport};
pub use error::{
    CollectError, CycleError, CycleResult, EntityKind, RegistryError, RegistryResult, SinkError,
    SinkResult, UnrecognizedStatusLabel,
};
pub use exposition::{render_meta, render_values};
pub use metric::MetricSet;
pub use registry::TaskRegistry;
pub use schema::{GraphDefinition, GraphMetric, GraphSchema};
pub use sink::{MetricSink, OutputMode, PluginSink};
pub use tally::{StatusTally, tally};
