//! In-memory data source and fixtures for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rand::Rng;

use nomadmon_api::{
    AgentMember, AllocResourceUsage, Allocation, ApiError, CpuStats, DataSource, Deployment,
    FetchFuture, Job, MemoryStats, Node, Resources, ResourceUsage, TaskResourceUsage, TaskState,
};

pub fn make_allocation(id: &str, job: &str, group: &str, tasks: &[(&str, u64)]) -> Allocation {
    Allocation {
        id: id.to_string(),
        job_id: job.to_string(),
        task_group: group.to_string(),
        client_status: "running".to_string(),
        task_states: tasks
            .iter()
            .map(|(name, _)| {
                (
                    name.to_string(),
                    TaskState {
                        state: "running".to_string(),
                        ..Default::default()
                    },
                )
            })
            .collect(),
        task_resources: tasks
            .iter()
            .map(|(name, mem)| {
                (
                    name.to_string(),
                    Resources {
                        cpu: 100,
                        memory_mb: *mem,
                    },
                )
            })
            .collect(),
        ..Default::default()
    }
}

/// Usage with `(task, cpu percent, cpu total ticks, rss bytes)` per task.
pub fn make_usage(tasks: &[(&str, f64, f64, u64)]) -> AllocResourceUsage {
    AllocResourceUsage {
        tasks: tasks
            .iter()
            .map(|(name, percent, ticks, rss)| {
                (
                    name.to_string(),
                    TaskResourceUsage {
                        resource_usage: ResourceUsage {
                            memory_stats: MemoryStats {
                                rss: *rss,
                                ..Default::default()
                            },
                            cpu_stats: CpuStats {
                                percent: *percent,
                                total_ticks: *ticks,
                                ..Default::default()
                            },
                        },
                        timestamp: 0,
                    },
                )
            })
            .collect(),
        ..Default::default()
    }
}

pub fn make_member(name: &str, status: &str) -> AgentMember {
    AgentMember {
        name: name.to_string(),
        status: status.to_string(),
        ..Default::default()
    }
}

pub fn make_node(id: &str, status: &str) -> Node {
    Node {
        id: id.to_string(),
        status: status.to_string(),
        scheduling_eligibility: "eligible".to_string(),
        ..Default::default()
    }
}

/// Data source backed by fixed records.
///
/// Detail lookups return the stored allocation. Stats report 1% CPU and
/// 1 KiB RSS for every task. Each per-allocation call may sleep a random
/// number of milliseconds up to `max_delay_ms`.
#[derive(Default)]
pub struct MockSource {
    jobs: Vec<Job>,
    deployments: Vec<Deployment>,
    members: Vec<AgentMember>,
    nodes: Vec<Node>,
    allocations: Mutex<Vec<Allocation>>,
    fail_detail: HashSet<String>,
    fail_stats: HashSet<String>,
    panic_detail: HashSet<String>,
    failing_group: Mutex<Option<&'static str>>,
    max_delay_ms: u64,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(mut self, jobs: Vec<Job>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_deployments(mut self, deployments: Vec<Deployment>) -> Self {
        self.deployments = deployments;
        self
    }

    pub fn with_members(mut self, members: Vec<AgentMember>) -> Self {
        self.members = members;
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<Node>) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn with_allocations(self, allocations: Vec<Allocation>) -> Self {
        self.set_allocations(allocations);
        self
    }

    pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn fail_detail(mut self, alloc_id: &str) -> Self {
        self.fail_detail.insert(alloc_id.to_string());
        self
    }

    pub fn fail_stats(mut self, alloc_id: &str) -> Self {
        self.fail_stats.insert(alloc_id.to_string());
        self
    }

    /// Make the detail fetch for `alloc_id` panic inside the spawned task.
    pub fn panic_detail(mut self, alloc_id: &str) -> Self {
        self.panic_detail.insert(alloc_id.to_string());
        self
    }

    pub fn set_allocations(&self, allocations: Vec<Allocation>) {
        *self.allocations.lock().unwrap() = allocations;
    }

    /// Make the named group operation fail until cleared with `None`.
    pub fn set_failing_group(&self, operation: Option<&'static str>) {
        *self.failing_group.lock().unwrap() = operation;
    }

    fn group<T: Send + 'static>(
        &self,
        operation: &'static str,
        items: Vec<T>,
    ) -> FetchFuture<'_, Vec<T>> {
        let failing = *self.failing_group.lock().unwrap() == Some(operation);
        Box::pin(async move {
            if failing {
                Err(ApiError::fetch_failed(operation, "connection refused"))
            } else {
                Ok(items)
            }
        })
    }

    fn delay(&self) -> Duration {
        if self.max_delay_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=self.max_delay_ms))
    }
}

impl DataSource for MockSource {
    fn list_jobs(&self) -> FetchFuture<'_, Vec<Job>> {
        self.group("list_jobs", self.jobs.clone())
    }

    fn list_deployments(&self) -> FetchFuture<'_, Vec<Deployment>> {
        self.group("list_deployments", self.deployments.clone())
    }

    fn list_agent_members(&self) -> FetchFuture<'_, Vec<AgentMember>> {
        self.group("list_agent_members", self.members.clone())
    }

    fn list_nodes(&self) -> FetchFuture<'_, Vec<Node>> {
        self.group("list_nodes", self.nodes.clone())
    }

    fn list_running_allocations(&self) -> FetchFuture<'_, Vec<Allocation>> {
        let allocations = self.allocations.lock().unwrap().clone();
        self.group("list_running_allocations", allocations)
    }

    fn get_allocation_detail<'a>(&'a self, alloc_id: &'a str) -> FetchFuture<'a, Allocation> {
        let delay = self.delay();
        let found = self
            .allocations
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == alloc_id)
            .cloned();
        let fail = self.fail_detail.contains(alloc_id);
        let panics = self.panic_detail.contains(alloc_id);

        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if panics {
                panic!("detail handler crashed for {alloc_id}");
            }

            if fail {
                return Err(ApiError::fetch_failed("get_allocation_detail", "HTTP 500"));
            }
            found.ok_or_else(|| ApiError::fetch_failed("get_allocation_detail", "HTTP 404"))
        })
    }

    fn get_allocation_stats<'a>(
        &'a self,
        alloc: &'a Allocation,
    ) -> FetchFuture<'a, AllocResourceUsage> {
        let delay = self.delay();
        let fail = self.fail_stats.contains(&alloc.id);
        let tasks: HashMap<String, TaskResourceUsage> = alloc
            .task_states
            .keys()
            .map(|name| {
                let usage = make_usage(&[(name.as_str(), 1.0, 100.0, 1024)]);
                (name.clone(), usage.tasks[name.as_str()].clone())
            })
            .collect();

        Box::pin(async move {
            tokio::time::sleep(delay).await;
            if fail {
                return Err(ApiError::fetch_failed("get_allocation_stats", "HTTP 500"));
            }
            Ok(AllocResourceUsage {
                tasks,
                ..Default::default()
            })
        })
    }
}
