//! The flat metric map produced by one cycle.

use std::collections::BTreeMap;

use tracing::warn;

/// Metric name → value for one cycle.
///
/// Names are kept sorted so the sink's output is stable from one cycle to
/// the next. Only finite values are accepted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    values: BTreeMap<String, f64>,
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a metric. Returns `false` and drops the value if it is NaN or
    /// infinite.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> bool {
        let name = name.into();
        if !value.is_finite() {
            warn!(metric = %name, value, "dropping non-finite metric value");
            return false;
        }
        self.values.insert(name, value);
        true
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Metrics whose name starts with `prefix`.
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, f64)> {
        self.iter().filter(move |(name, _)| name.starts_with(prefix))
    }
}

impl Extend<(String, f64)> for MetricSet {
    fn extend<I: IntoIterator<Item = (String, f64)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl FromIterator<(String, f64)> for MetricSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut set = MetricSet::new();
        set.extend(iter);
        set
    }
}
