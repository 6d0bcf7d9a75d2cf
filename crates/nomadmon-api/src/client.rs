//! HTTP client for the Nomad API.
//!
//! Each request opens a fresh TCP connection and performs a single
//! HTTP/1.1 exchange with hyper. The whole exchange, connect included,
//! runs under one timeout.

use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, HOST, USER_AGENT};
use http_body_util::{BodyExt, Empty};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{ApiError, ApiResult};
use crate::source::{DataSource, FetchFuture};
use crate::types::{
    AgentMember, AgentMembers, AllocResourceUsage, Allocation, Deployment, Job, Node,
};

/// Default Nomad agent address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default Nomad HTTP port.
pub const DEFAULT_PORT: u16 = 4646;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT_VALUE: &str = concat!("nomadmon/", env!("CARGO_PKG_VERSION"));

/// Error bodies are echoed into the failure cause up to this many bytes.
const MAX_ERROR_BODY: usize = 256;

/// Where and how to reach the Nomad agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub address: String,
    pub port: u16,
    /// Upper bound on a single request, connect through body.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// `host:port`, bracketing bare IPv6 addresses.
    pub fn authority(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

/// [`DataSource`] backed by a Nomad agent's HTTP API.
#[derive(Debug, Clone)]
pub struct NomadClient {
    config: ClientConfig,
    authority: String,
}

impl NomadClient {
    pub fn new(config: ClientConfig) -> Self {
        let authority = config.authority();
        Self { config, authority }
    }

    /// Base URL of the agent, e.g. `http://127.0.0.1:4646`.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.authority)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET `path` and decode the body as JSON.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> ApiResult<T> {
        let timeout = self.config.timeout;
        let body = tokio::time::timeout(timeout, self.get(path))
            .await
            .map_err(|_| ApiError::fetch_failed(operation, format!("timed out after {timeout:?}")))?
            .map_err(|cause| ApiError::fetch_failed(operation, cause))?;

        trace!(operation, path, bytes = body.len(), "response received");

        serde_json::from_slice(&body)
            .map_err(|e| ApiError::fetch_failed(operation, format!("malformed payload: {e}")))
    }

    async fn get(&self, path: &str) -> Result<Bytes, String> {
        let stream = tokio::net::TcpStream::connect(&self.authority)
            .await
            .map_err(|e| format!("connect to {}: {e}", self.authority))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| format!("handshake with {}: {e}", self.authority))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                trace!(error = %e, "nomad connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(path)
            .header(HOST, &self.authority)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE)
            .body(Empty::<Bytes>::new())
            .map_err(|e| format!("build request for {path}: {e}"))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| format!("request {path}: {e}"))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| format!("read body of {path}: {e}"))?
            .to_bytes();

        if !status.is_success() {
            let end = body.len().min(MAX_ERROR_BODY);
            let text = String::from_utf8_lossy(&body[..end]);
            return Err(format!("{path} returned {status}: {}", text.trim()));
        }

        Ok(body)
    }
}

impl DataSource for NomadClient {
    fn list_jobs(&self) -> FetchFuture<'_, Vec<Job>> {
        Box::pin(self.get_json::<Vec<Job>>("list_jobs", "/v1/jobs"))
    }

    fn list_deployments(&self) -> FetchFuture<'_, Vec<Deployment>> {
        Box::pin(self.get_json::<Vec<Deployment>>("list_deployments", "/v1/deployments"))
    }

    fn list_agent_members(&self) -> FetchFuture<'_, Vec<AgentMember>> {
        Box::pin(async move {
            let members: AgentMembers = self
                .get_json("list_agent_members", "/v1/agent/members")
                .await?;
            Ok(members.members)
        })
    }

    fn list_nodes(&self) -> FetchFuture<'_, Vec<Node>> {
        Box::pin(self.get_json::<Vec<Node>>("list_nodes", "/v1/nodes"))
    }

    fn list_running_allocations(&self) -> FetchFuture<'_, Vec<Allocation>> {
        Box::pin(async move {
            let all: Vec<Allocation> = self
                .get_json("list_running_allocations", "/v1/allocations")
                .await?;
            let total = all.len();
            let running: Vec<Allocation> = all.into_iter().filter(Allocation::is_running).collect();
            debug!(total, running = running.len(), "allocations listed");
            Ok(running)
        })
    }

    fn get_allocation_detail<'a>(&'a self, alloc_id: &'a str) -> FetchFuture<'a, Allocation> {
        Box::pin(async move {
            let path = format!("/v1/allocation/{alloc_id}");
            self.get_json("get_allocation_detail", &path).await
        })
    }

    fn get_allocation_stats<'a>(
        &'a self,
        alloc: &'a Allocation,
    ) -> FetchFuture<'a, AllocResourceUsage> {
        Box::pin(async move {
            let path = format!("/v1/client/allocation/{}/stats", alloc.id);
            self.get_json("get_allocation_stats", &path).await
        })
    }
}
