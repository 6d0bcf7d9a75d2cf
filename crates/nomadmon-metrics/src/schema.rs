//! Graph schema — which graphs the monitoring backend should expect.
//!
//! Static categories cover jobs, deployments, agent members and nodes.
//! One dynamic category is added per task-identity prefix held by the
//! [`TaskRegistry`].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::collector::TASK_FIELDS;
use crate::flatten::{DEPLOYMENT_FIELDS, JOB_FIELDS};
use crate::registry::TaskRegistry;
use crate::tally::{MEMBER_STATUSES, NODE_STATUSES};

/// Unit used for every graph.
pub const UNIT_INTEGER: &str = "integer";

/// One metric line within a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphMetric {
    /// Metric name suffix, relative to the graph category.
    pub name: String,
    pub label: String,
}

/// Display information for one graph category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphDefinition {
    pub label: String,
    pub unit: String,
    pub metrics: Vec<GraphMetric>,
}

impl GraphDefinition {
    fn new(label: impl Into<String>, fields: &[&str], labels: &[&str]) -> Self {
        Self {
            label: label.into(),
            unit: UNIT_INTEGER.to_string(),
            metrics: fields
                .iter()
                .zip(labels)
                .map(|(name, label)| GraphMetric {
                    name: name.to_string(),
                    label: label.to_string(),
                })
                .collect(),
        }
    }
}

/// Graph category → definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSchema {
    graphs: BTreeMap<String, GraphDefinition>,
}

impl GraphSchema {
    /// Describe the graphs for the prefixes currently in `registry`.
    pub fn describe(registry: &TaskRegistry) -> Self {
        let mut graphs = BTreeMap::new();

        graphs.insert(
            "jobs.#".to_string(),
            GraphDefinition::new(
                "Nomad job status",
                JOB_FIELDS,
                &["Queued", "Complete", "Failed", "Running", "Starting", "Lost"],
            ),
        );
        graphs.insert(
            "deployments.#".to_string(),
            GraphDefinition::new(
                "Nomad deployments status",
                DEPLOYMENT_FIELDS,
                &[
                    "Promoted",
                    "DesiredCanaries",
                    "DesiredTotal",
                    "PlacedAllocs",
                    "HealthyAllocs",
                    "UnhealthyAllocs",
                ],
            ),
        );
        graphs.insert(
            "agent.members".to_string(),
            GraphDefinition::new(
                "Nomad agent members",
                MEMBER_STATUSES,
                &["Alive", "Leaving", "Left", "Failed"],
            ),
        );
        graphs.insert(
            "nodes".to_string(),
            GraphDefinition::new(
                "Nomad nodes",
                NODE_STATUSES,
                &["Initializing", "Ready", "Down", "Ineligible", "Draining"],
            ),
        );

        for prefix in registry.current_prefixes() {
            graphs.insert(
                format!("{prefix}.#"),
                GraphDefinition::new(
                    format!("Nomad task {prefix}"),
                    TASK_FIELDS,
                    &["CPU Percent", "CPU Total Ticks", "Memory RSS Bytes", "Allocated Memory MB"],
                ),
            );
        }

        Self { graphs }
    }

    pub fn get(&self, category: &str) -> Option<&GraphDefinition> {
        self.graphs.get(category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.graphs.contains_key(category)
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GraphDefinition)> {
        self.graphs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_categories_without_tasks() {
        let schema = GraphSchema::describe(&TaskRegistry::new());
        assert_eq!(schema.len(), 4);
        for category in ["jobs.#", "deployments.#", "agent.members", "nodes"] {
            let graph = schema.get(category).unwrap();
            assert_eq!(graph.unit, "integer");
        }

        let jobs = schema.get("jobs.#").unwrap();
        let names: Vec<&str> = jobs.metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, JOB_FIELDS);
        assert_eq!(jobs.metrics[0].label, "Queued");
    }

    #[test]
    fn one_graph_per_registered_prefix() {
        let mut registry = TaskRegistry::new();
        registry.rebuild(["web_fe_nginx", "web_fe_envoy"]);

        let schema = GraphSchema::describe(&registry);
        assert_eq!(schema.len(), 6);

        let graph = schema.get("web_fe_nginx.#").unwrap();
        assert_eq!(graph.label, "Nomad task web_fe_nginx");
        let names: Vec<&str> = graph.metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "cpu_percent",
                "cpu_totalticks",
                "memory_rss_bytes",
                "allocated_memory_megabytes"
            ]
        );
        assert!(schema.contains("web_fe_envoy.#"));
    }

    #[test]
    fn every_field_has_a_label() {
        let mut registry = TaskRegistry::new();
        registry.rebuild(["a_b_c"]);
        let schema = GraphSchema::describe(&registry);

        let expected = [
            ("jobs.#", JOB_FIELDS.len()),
            ("deployments.#", DEPLOYMENT_FIELDS.len()),
            ("agent.members", MEMBER_STATUSES.len()),
            ("nodes", NODE_STATUSES.len()),
            ("a_b_c.#", TASK_FIELDS.len()),
        ];
        for (category, count) in expected {
            assert_eq!(schema.get(category).unwrap().metrics.len(), count, "{category}");
        }
    }
}
