//! Plugin text exposition format.
//!
//! Renders a [`MetricSet`] as tab-separated metric lines, and a
//! [`GraphSchema`] as the JSON graph definition block that monitoring
//! agents request in meta mode.
//!
//! Which metrics are printed is decided by the schema. A fixed category
//! such as `nodes` prints `<key prefix>.nodes.<metric>` for each metric it
//! lists, reading the bare metric name from the set. A wildcard category
//! such as `jobs.#` prints every `jobs.<anything>.<metric>` entry under its
//! own name. Entries no graph describes are not printed.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metric::MetricSet;
use crate::schema::{GraphDefinition, GraphSchema};

/// First line of a graph definition block.
pub const META_HEADER: &str = "# mackerel-agent-plugin";

/// Default metric key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "nomad";

/// Render metric lines: `<key>\t<value>\t<epoch>`.
pub fn render_values(
    schema: &GraphSchema,
    metrics: &MetricSet,
    key_prefix: &str,
    epoch: u64,
) -> String {
    let mut out = String::new();

    for (category, graph) in schema.iter() {
        match category.strip_suffix(".#") {
            Some(base) => {
                let scope = format!("{base}.");
                for (name, value) in metrics.with_prefix(&scope) {
                    if matches_wildcard(&name[scope.len()..], graph) {
                        out.push_str(&format!("{key_prefix}.{name}\t{value:.6}\t{epoch}\n"));
                    }
                }
            }
            None => {
                for m in &graph.metrics {
                    if let Some(value) = metrics.get(&m.name) {
                        out.push_str(&format!(
                            "{key_prefix}.{category}.{}\t{value:.6}\t{epoch}\n",
                            m.name
                        ));
                    }
                }
            }
        }
    }

    out
}

// `rest` is the name with the category base stripped, e.g. `web_fe.queued`.
fn matches_wildcard(rest: &str, graph: &GraphDefinition) -> bool {
    graph.metrics.iter().any(|m| {
        rest.strip_suffix(m.name.as_str())
            .and_then(|head| head.strip_suffix('.'))
            .is_some_and(|middle| !middle.is_empty())
    })
}

#[derive(Serialize)]
struct GraphDefinitions<'a> {
    graphs: BTreeMap<String, &'a GraphDefinition>,
}

/// Render the graph definition block: [`META_HEADER`] followed by one line
/// of JSON.
pub fn render_meta(schema: &GraphSchema, key_prefix: &str) -> serde_json::Result<String> {
    let defs = GraphDefinitions {
        graphs: schema
            .iter()
            .map(|(category, graph)| (format!("{key_prefix}.{category}"), graph))
            .collect(),
    };
    Ok(format!("{META_HEADER}\n{}\n", serde_json::to_string(&defs)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TaskRegistry;

    fn test_metrics() -> MetricSet {
        [
            ("jobs.web_fe.queued", 1.0),
            ("jobs.web_fe.running", 3.0),
            ("deployments.web_fe.promoted", 1.0),
            ("alive", 2.0),
            ("failed", 1.0),
            ("ready", 1.0),
            ("web_fe_nginx.0123abcd.cpu_percent", 12.5),
            ("stray", 9.0),
        ]
        .into_iter()
        .map(|(n, v)| (n.to_string(), v))
        .collect()
    }

    #[test]
    fn render_empty() {
        let schema = GraphSchema::describe(&TaskRegistry::new());
        assert_eq!(render_values(&schema, &MetricSet::new(), "nomad", 1000), "");
    }

    #[test]
    fn render_lines_are_tab_separated() {
        let mut registry = TaskRegistry::new();
        registry.rebuild(["web_fe_nginx"]);
        let schema = GraphSchema::describe(&registry);

        let out = render_values(&schema, &test_metrics(), "nomad", 1700000000);
        for line in out.lines() {
            let parts: Vec<&str> = line.split('\t').collect();
            assert_eq!(parts.len(), 3, "bad line: {line}");
            assert!(parts[0].starts_with("nomad."));
            assert!(parts[1].parse::<f64>().is_ok());
            assert_eq!(parts[2], "1700000000");
        }

        assert!(out.contains("nomad.jobs.web_fe.queued\t1.000000\t1700000000\n"));
        assert!(out.contains("nomad.jobs.web_fe.running\t3.000000\t"));
        assert!(out.contains("nomad.deployments.web_fe.promoted\t1.000000\t"));
        assert!(out.contains("nomad.agent.members.alive\t2.000000\t"));
        assert!(out.contains("nomad.agent.members.failed\t1.000000\t"));
        assert!(out.contains("nomad.nodes.ready\t1.000000\t"));
        assert!(out.contains("nomad.web_fe_nginx.0123abcd.cpu_percent\t12.500000\t"));
    }

    #[test]
    fn undescribed_metrics_are_not_printed() {
        // No prefix registered yet: the task graph does not exist.
        let schema = GraphSchema::describe(&TaskRegistry::new());
        let out = render_values(&schema, &test_metrics(), "nomad", 1);
        assert!(!out.contains("web_fe_nginx"));
        assert!(!out.contains("stray"));
    }

    #[test]
    fn custom_key_prefix() {
        let schema = GraphSchema::describe(&TaskRegistry::new());
        let out = render_values(&schema, &test_metrics(), "cluster1", 1);
        assert!(out.contains("cluster1.nodes.ready\t"));
        assert!(!out.contains("nomad."));
    }

    #[test]
    fn meta_has_header_and_prefixed_graphs() {
        let mut registry = TaskRegistry::new();
        registry.rebuild(["web_fe_nginx"]);
        let schema = GraphSchema::describe(&registry);

        let out = render_meta(&schema, "nomad").unwrap();
        let (header, body) = out.split_once('\n').unwrap();
        assert_eq!(header, META_HEADER);

        let json: serde_json::Value = serde_json::from_str(body.trim()).unwrap();
        let graphs = json["graphs"].as_object().unwrap();
        assert_eq!(graphs.len(), 5);
        assert_eq!(graphs["nomad.jobs.#"]["label"], "Nomad job status");
        assert_eq!(graphs["nomad.nodes"]["unit"], "integer");
        assert_eq!(graphs["nomad.web_fe_nginx.#"]["metrics"][0]["name"], "cpu_percent");
        assert_eq!(graphs["nomad.agent.members"]["metrics"][0]["label"], "Alive");
    }
}
