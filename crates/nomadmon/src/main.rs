//! nomadmon — metrics agent for a Nomad cluster.
//!
//! Polls the Nomad HTTP API and prints job, deployment, member, node and
//! per-task resource metrics in the monitoring-agent plugin format.
//!
//! # Usage
//!
//! ```text
//! nomadmon                                       # one cycle, then exit
//! nomadmon --meta                                # graph definitions
//! nomadmon --daemon --address 10.0.0.5 --interval 30   # poll until Ctrl-C
//! ```
//!
//! The task registry is kept in `--state-file` (by default under the system
//! temp directory) so each run advertises the tasks the previous one saw.
//! Logs go to stderr; stdout carries plugin output only.

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use nomadmon::agent;
use nomadmon::config::AgentConfig;
use nomadmon_metrics::{OutputMode, PluginSink};

/// Set by the monitoring agent when it wants graph definitions.
const META_ENV: &str = "MACKEREL_AGENT_PLUGIN_META";

#[derive(Parser)]
#[command(name = "nomadmon", version, about = "Nomad cluster metrics agent")]
struct Cli {
    /// Config file (TOML). Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Nomad agent address [default: 127.0.0.1].
    #[arg(long)]
    address: Option<String>,

    /// Nomad HTTP API port [default: 4646].
    #[arg(long)]
    port: Option<u16>,

    /// Poll interval in seconds for --daemon [default: 60].
    #[arg(long)]
    interval: Option<u64>,

    /// Per-request timeout in seconds [default: 10].
    #[arg(long)]
    timeout: Option<u64>,

    /// Allocations fetched at once, 0 for unbounded [default: 16].
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// File the task registry is loaded from and saved to
    /// [default: <temp dir>/nomadmon-registry.json].
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// First component of every metric key [default: nomad].
    #[arg(long)]
    metric_key_prefix: Option<String>,

    /// Keep polling every --interval seconds until Ctrl-C.
    #[arg(long, conflicts_with = "meta")]
    daemon: bool,

    /// Print graph definitions instead of metrics.
    #[arg(long, env = META_ENV, value_parser = clap::builder::FalseyValueParser::new())]
    meta: bool,
}

impl Cli {
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(address) = &self.address {
            config.address = address.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(max) = self.max_concurrency {
            config.max_concurrency = max;
        }
        if let Some(path) = &self.state_file {
            config.state_file = path.clone();
        }
        if let Some(prefix) = &self.metric_key_prefix {
            config.metric_key_prefix = prefix.clone();
        }
    }

    fn mode(&self) -> OutputMode {
        if self.meta {
            OutputMode::Meta
        } else {
            OutputMode::Values
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,nomadmon=debug")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AgentConfig::from_file(path)?,
        None => AgentConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    let mut sink = PluginSink::new(io::stdout())
        .with_key_prefix(config.metric_key_prefix.clone())
        .with_mode(cli.mode());

    if cli.meta {
        return agent::write_meta(&config, &mut sink);
    }

    if !cli.daemon {
        agent::run_once(&config, &mut sink).await?;
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!(error = %e, "failed to install Ctrl-C handler"),
        }
    });

    agent::run_daemon(&config, &mut sink, shutdown_rx).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let cli = Cli::parse_from([
            "nomadmon",
            "--address",
            "10.1.1.1",
            "--max-concurrency",
            "0",
            "--metric-key-prefix",
            "prod",
            "--state-file",
            "/var/lib/nomadmon/registry.json",
            "--daemon",
        ]);
        let mut config = AgentConfig {
            address: "10.0.0.5".to_string(),
            port: 14646,
            ..Default::default()
        };
        cli.apply(&mut config);

        assert_eq!(config.address, "10.1.1.1");
        assert_eq!(config.port, 14646);
        assert_eq!(config.max_concurrency, 0);
        assert_eq!(config.metric_key_prefix, "prod");
        assert_eq!(config.state_file, PathBuf::from("/var/lib/nomadmon/registry.json"));
        assert!(cli.daemon);
    }

    #[test]
    fn no_flags_run_a_single_cycle() {
        let cli = Cli::try_parse_from(["nomadmon"]).unwrap();
        let mut config = AgentConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, AgentConfig::default());
        assert!(!cli.daemon);
    }

    #[test]
    fn meta_flag_selects_graph_definitions() {
        let cli = Cli::try_parse_from(["nomadmon", "--meta"]).unwrap();
        assert_eq!(cli.mode(), OutputMode::Meta);
    }

    #[test]
    fn daemon_and_meta_conflict() {
        assert!(Cli::try_parse_from(["nomadmon", "--daemon", "--meta"]).is_err());
    }

    #[test]
    fn meta_env_is_part_of_the_cli() {
        use clap::CommandFactory;
        let cmd = Cli::command();
        let meta = cmd
            .get_arguments()
            .find(|a| a.get_id() == "meta")
            .unwrap();
        assert_eq!(meta.get_env(), Some(std::ffi::OsStr::new(META_ENV)));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
