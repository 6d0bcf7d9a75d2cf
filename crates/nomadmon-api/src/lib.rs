//! nomadmon-api — read-only access to the Nomad HTTP API.
//!
//! Wraps the seven queries the collector needs behind the [`DataSource`]
//! trait and provides [`NomadClient`], a hyper-based implementation that
//! talks to a Nomad agent over plain HTTP/1.1.
//!
//! # Architecture
//!
//! ```text
//! DataSource (trait, boxed Send futures)
//!   ├── list_jobs()                 → GET /v1/jobs
//!   ├── list_deployments()          → GET /v1/deployments
//!   ├── list_agent_members()        → GET /v1/agent/members
//!   ├── list_nodes()                → GET /v1/nodes
//!   ├── list_running_allocations()  → GET /v1/allocations (client status = running)
//!   ├── get_allocation_detail(id)   → GET /v1/allocation/:id
//!   └── get_allocation_stats(alloc) → GET /v1/client/allocation/:id/stats
//! ```
//!
//! Every failure, whatever its origin, surfaces as
//! [`ApiError::FetchFailed`]. The adapter never retries.

pub mod client;
pub mod error;
pub mod source;
pub mod types;

pub use client::{ClientConfig, NomadClient};
pub use error::{ApiError, ApiResult};
pub use source::{DataSource, FetchFuture};
pub use types::*;
