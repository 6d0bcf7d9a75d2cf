//! Metric sinks — where a cycle's results go.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::SinkResult;
use crate::exposition::{DEFAULT_KEY_PREFIX, render_meta, render_values};
use crate::metric::MetricSet;
use crate::schema::GraphSchema;

/// Receives the graph schema and metric set of each cycle.
pub trait MetricSink: Send {
    fn publish(&mut self, schema: &GraphSchema, metrics: &MetricSet) -> SinkResult<()>;
}

/// What a [`PluginSink`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Metric lines.
    #[default]
    Values,
    /// Graph definitions only.
    Meta,
}

/// Writes the monitoring-agent plugin text format to any writer.
pub struct PluginSink<W> {
    out: W,
    key_prefix: String,
    mode: OutputMode,
}

impl<W: Write + Send> PluginSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            mode: OutputMode::Values,
        }
    }

    pub fn with_key_prefix(mut self, key_prefix: impl Into<String>) -> Self {
        self.key_prefix = key_prefix.into();
        self
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> MetricSink for PluginSink<W> {
    fn publish(&mut self, schema: &GraphSchema, metrics: &MetricSet) -> SinkResult<()> {
        let text = match self.mode {
            OutputMode::Values => {
                let epoch = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs();
                render_values(schema, metrics, &self.key_prefix, epoch)
            }
            OutputMode::Meta => render_meta(schema, &self.key_prefix)?,
        };
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        debug!(mode = ?self.mode, bytes = text.len(), "published to plugin sink");
        Ok(())
    }
}
