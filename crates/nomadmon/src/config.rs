//! nomadmon.toml configuration.
//!
//! Every field is optional in the file; missing fields take the defaults
//! below. Command-line flags are applied on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use nomadmon_api::ClientConfig;
use nomadmon_api::client::{DEFAULT_ADDRESS, DEFAULT_PORT, DEFAULT_TIMEOUT};
use nomadmon_metrics::DEFAULT_MAX_CONCURRENCY;
use nomadmon_metrics::exposition::DEFAULT_KEY_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Nomad agent address.
    pub address: String,
    /// Nomad HTTP API port.
    pub port: u16,
    /// Seconds between polls in daemon mode.
    pub interval_secs: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Allocations fetched at once. 0 means unbounded.
    pub max_concurrency: usize,
    /// Where the task registry is kept between runs.
    pub state_file: PathBuf,
    /// First component of every metric key.
    pub metric_key_prefix: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            interval_secs: 60,
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            state_file: default_state_file(),
            metric_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// Registry file used when none is configured, kept in the system temp
/// directory so successive one-shot runs share it.
pub fn default_state_file() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_STATE_FILE_NAME)
}

const DEFAULT_STATE_FILE_NAME: &str = "nomadmon-registry.json";

impl AgentConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AgentConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.address.is_empty(), "address must not be empty");
        anyhow::ensure!(self.interval_secs > 0, "interval_secs must be at least 1");
        anyhow::ensure!(self.timeout_secs > 0, "timeout_secs must be at least 1");
        anyhow::ensure!(
            !self.metric_key_prefix.is_empty(),
            "metric_key_prefix must not be empty"
        );
        anyhow::ensure!(
            !self.state_file.as_os_str().is_empty(),
            "state_file must not be empty"
        );
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            address: self.address.clone(),
            port: self.port,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
