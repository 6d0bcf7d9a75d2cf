//! Nomad API payload types.
//!
//! Only the fields the collector reads are modelled; everything else in
//! Nomad's responses is ignored. Nomad serializes field names in
//! PascalCase and frequently sends `null` for empty maps, so collection
//! fields go through [`null_default`].

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Client status of an allocation that is currently executing.
pub const CLIENT_STATUS_RUNNING: &str = "running";

/// Number of leading allocation ID characters used in metric names.
pub const ALLOC_SHORT_ID_LEN: usize = 8;

/// Deserialize `null` as `T::default()`.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Jobs ──────────────────────────────────────────────────────────

/// Entry of `GET /v1/jobs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Job {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub job_type: String,
    pub status: String,
    pub job_summary: Option<JobSummary>,
}

/// Per-task-group allocation counts for a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobSummary {
    #[serde(rename = "JobID")]
    pub job_id: String,
    #[serde(deserialize_with = "null_default")]
    pub summary: HashMap<String, TaskGroupSummary>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskGroupSummary {
    pub queued: u64,
    pub complete: u64,
    pub failed: u64,
    pub running: u64,
    pub starting: u64,
    pub lost: u64,
}

// ── Deployments ───────────────────────────────────────────────────

/// Entry of `GET /v1/deployments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Deployment {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "JobID")]
    pub job_id: String,
    pub job_version: u64,
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub task_groups: HashMap<String, DeploymentState>,
}

/// Rollout counters for one task group of a deployment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeploymentState {
    pub promoted: bool,
    pub desired_canaries: u64,
    pub desired_total: u64,
    pub placed_allocs: u64,
    pub healthy_allocs: u64,
    pub unhealthy_allocs: u64,
}

// ── Agent members ─────────────────────────────────────────────────

/// Body of `GET /v1/agent/members`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct AgentMembers {
    pub server_name: String,
    pub server_region: String,
    #[serde(rename = "ServerDC")]
    pub server_dc: String,
    #[serde(deserialize_with = "null_default")]
    pub members: Vec<AgentMember>,
}

/// A server in the gossip pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct AgentMember {
    pub name: String,
    pub addr: String,
    pub port: u16,
    /// One of `alive`, `leaving`, `left`, `failed`.
    pub status: String,
    #[serde(deserialize_with = "null_default")]
    pub tags: HashMap<String, String>,
}

// ── Nodes ─────────────────────────────────────────────────────────

/// Entry of `GET /v1/nodes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Node {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub datacenter: String,
    /// One of `initializing`, `ready`, `down`.
    pub status: String,
    /// `eligible` or `ineligible`.
    pub scheduling_eligibility: String,
    pub drain: bool,
}

impl Node {
    /// The label this node is counted under.
    ///
    /// Draining and ineligibility are only reported for nodes that are
    /// otherwise ready; a down node stays `down` whatever its drain flag.
    pub fn effective_status(&self) -> &str {
        if self.status == "ready" {
            if self.drain {
                return "draining";
            }
            if self.scheduling_eligibility == "ineligible" {
                return "ineligible";
            }
        }
        &self.status
    }
}

// ── Allocations ───────────────────────────────────────────────────

/// Entry of `GET /v1/allocations` and body of `GET /v1/allocation/:id`.
///
/// The list endpoint leaves the resource fields empty; the detail
/// endpoint fills them in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct Allocation {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(rename = "JobID")]
    pub job_id: String,
    pub task_group: String,
    #[serde(rename = "NodeID")]
    pub node_id: String,
    pub client_status: String,
    pub desired_status: String,
    #[serde(deserialize_with = "null_default")]
    pub task_states: HashMap<String, TaskState>,
    #[serde(deserialize_with = "null_default")]
    pub task_resources: HashMap<String, Resources>,
    pub allocated_resources: Option<AllocatedResources>,
}

impl Allocation {
    pub fn is_running(&self) -> bool {
        self.client_status == CLIENT_STATUS_RUNNING
    }

    /// First [`ALLOC_SHORT_ID_LEN`] characters of the allocation ID.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(ALLOC_SHORT_ID_LEN) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }

    /// Memory budget of `task` in megabytes.
    ///
    /// Prefers the legacy `TaskResources` block and falls back to
    /// `AllocatedResources`, which newer Nomad versions populate instead.
    pub fn memory_budget_mb(&self, task: &str) -> Option<u64> {
        if let Some(res) = self.task_resources.get(task) {
            return Some(res.memory_mb);
        }
        self.allocated_resources
            .as_ref()
            .and_then(|a| a.tasks.get(task))
            .map(|t| t.memory.memory_mb)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskState {
    /// `pending`, `running` or `dead`.
    pub state: String,
    pub failed: bool,
    pub restarts: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Resources {
    #[serde(rename = "CPU")]
    pub cpu: u64,
    #[serde(rename = "MemoryMB")]
    pub memory_mb: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct AllocatedResources {
    #[serde(deserialize_with = "null_default")]
    pub tasks: HashMap<String, AllocatedTaskResources>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct AllocatedTaskResources {
    pub memory: AllocatedMemory,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AllocatedMemory {
    #[serde(rename = "MemoryMB")]
    pub memory_mb: u64,
}

// ── Allocation stats ──────────────────────────────────────────────

/// Body of `GET /v1/client/allocation/:id/stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct AllocResourceUsage {
    /// Aggregate usage across all tasks.
    pub resource_usage: Option<ResourceUsage>,
    #[serde(deserialize_with = "null_default")]
    pub tasks: HashMap<String, TaskResourceUsage>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskResourceUsage {
    pub resource_usage: ResourceUsage,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct ResourceUsage {
    pub memory_stats: MemoryStats,
    pub cpu_stats: CpuStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct MemoryStats {
    #[serde(rename = "RSS")]
    pub rss: u64,
    pub cache: u64,
    pub swap: u64,
    pub max_usage: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase", default)]
pub struct CpuStats {
    pub percent: f64,
    pub total_ticks: f64,
    pub system_mode: f64,
    pub user_mode: f64,
}
