//! Agent entry points shared by the CLI and the integration tests.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;

use nomadmon_api::NomadClient;
use nomadmon_metrics::{CycleOrchestrator, CycleReport, MetricSet, MetricSink, TaskRegistry};

use crate::config::AgentConfig;

/// Build an orchestrator from `config`, starting from the registry saved in
/// its state file and saving back to it after every successful cycle.
pub fn build_orchestrator(config: &AgentConfig) -> anyhow::Result<CycleOrchestrator> {
    let registry = TaskRegistry::load(&config.state_file).with_context(|| {
        format!("loading task registry from {}", config.state_file.display())
    })?;

    let client = NomadClient::new(config.client_config());
    info!(
        endpoint = %client.endpoint(),
        state_file = %config.state_file.display(),
        prefixes = registry.len(),
        "nomadmon starting"
    );

    Ok(CycleOrchestrator::new(Arc::new(client))
        .with_max_concurrency(config.max_concurrency)
        .with_registry(registry)
        .with_state_file(&config.state_file))
}

/// One cycle, published with the schema known before it ran.
pub async fn run_once<S: MetricSink + ?Sized>(
    config: &AgentConfig,
    sink: &mut S,
) -> anyhow::Result<CycleReport> {
    let mut orchestrator = build_orchestrator(config)?;
    let schema = orchestrator.schema();
    let report = orchestrator.run_cycle().await.context("poll cycle failed")?;
    sink.publish(&schema, &report.metrics).context("writing metrics")?;
    Ok(report)
}

/// Publish graph definitions for the saved registry without polling.
pub fn write_meta<S: MetricSink + ?Sized>(
    config: &AgentConfig,
    sink: &mut S,
) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config)?;
    sink.publish(&orchestrator.schema(), &MetricSet::new())
        .context("writing graph definitions")?;
    Ok(())
}

/// Poll every `config.interval()` until `shutdown` changes.
pub async fn run_daemon<S: MetricSink + ?Sized>(
    config: &AgentConfig,
    sink: &mut S,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut orchestrator = build_orchestrator(config)?;
    orchestrator.run(config.interval(), sink, shutdown).await;
    info!("nomadmon stopped");
    Ok(())
}
