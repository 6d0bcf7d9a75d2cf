//! The data source seam between the collector and Nomad.

use std::future::Future;
use std::pin::Pin;

use crate::error::ApiResult;
use crate::types::{AgentMember, AllocResourceUsage, Allocation, Deployment, Job, Node};

/// Boxed future alias for data source results.
pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send + 'a>>;

/// Read-only queries against the orchestrator — injected for testability.
///
/// Implementations must be shareable across spawned tasks; the allocation
/// collector holds one behind an `Arc` and calls the per-allocation
/// operations concurrently.
pub trait DataSource: Send + Sync {
    /// All registered jobs with their task-group summaries.
    fn list_jobs(&self) -> FetchFuture<'_, Vec<Job>>;

    /// All deployments known to the cluster.
    fn list_deployments(&self) -> FetchFuture<'_, Vec<Deployment>>;

    /// Servers in the gossip pool.
    fn list_agent_members(&self) -> FetchFuture<'_, Vec<AgentMember>>;

    /// All client nodes.
    fn list_nodes(&self) -> FetchFuture<'_, Vec<Node>>;

    /// Allocations whose client status is `running`.
    fn list_running_allocations(&self) -> FetchFuture<'_, Vec<Allocation>>;

    /// Full allocation record including task resources.
    fn get_allocation_detail<'a>(&'a self, alloc_id: &'a str) -> FetchFuture<'a, Allocation>;

    /// Live resource usage for every task of `alloc`.
    fn get_allocation_stats<'a>(
        &'a self,
        alloc: &'a Allocation,
    ) -> FetchFuture<'a, AllocResourceUsage>;
}
