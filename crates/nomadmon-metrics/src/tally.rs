//! Status tally — counts status labels into a fixed set of buckets.

use tracing::warn;

use crate::error::{EntityKind, UnrecognizedStatusLabel};

/// Status labels a gossip pool member can report.
pub const MEMBER_STATUSES: &[&str] = &["alive", "leaving", "left", "failed"];

/// Status labels a client node is counted under.
pub const NODE_STATUSES: &[&str] = &["initializing", "ready", "down", "ineligible", "draining"];

/// Per-label counts for one entity kind.
///
/// Every vocabulary label is present, zero if unobserved, in vocabulary
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTally {
    counts: Vec<(&'static str, u64)>,
    anomalies: Vec<UnrecognizedStatusLabel>,
}

impl StatusTally {
    pub fn count(&self, label: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, c)| *c)
    }

    pub fn counts(&self) -> &[(&'static str, u64)] {
        &self.counts
    }

    /// Sum over all buckets, i.e. the number of recognized labels.
    pub fn recognized_total(&self) -> u64 {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    pub fn anomalies(&self) -> &[UnrecognizedStatusLabel] {
        &self.anomalies
    }

    /// Split into metric entries keyed by bare label, plus the anomalies.
    pub fn into_parts(self) -> (Vec<(String, f64)>, Vec<UnrecognizedStatusLabel>) {
        let metrics = self
            .counts
            .into_iter()
            .map(|(label, count)| (label.to_string(), count as f64))
            .collect();
        (metrics, self.anomalies)
    }
}

/// Count `labels` into the buckets of `vocabulary`.
///
/// Labels outside the vocabulary are not counted anywhere; each one is
/// logged and returned as an anomaly.
pub fn tally<'a, I>(kind: EntityKind, labels: I, vocabulary: &'static [&'static str]) -> StatusTally
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(&'static str, u64)> = vocabulary.iter().map(|l| (*l, 0)).collect();
    let mut anomalies = Vec::new();

    for label in labels {
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, count)) => *count += 1,
            None => {
                let anomaly = UnrecognizedStatusLabel {
                    entity_kind: kind,
                    label: label.to_string(),
                };
                warn!(entity = %kind, %label, "unrecognized status label");
                anomalies.push(anomaly);
            }
        }
    }

    StatusTally { counts, anomalies }
}
