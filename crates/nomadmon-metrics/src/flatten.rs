//! Summary flattener — turns nested job and deployment summaries into
//! flat metric entries.
//!
//! Names follow `<category>.<jobID>_<taskGroup>.<field>`. Each task group
//! is reported on its own; nothing is summed across jobs.

use nomadmon_api::{Deployment, DeploymentState, Job, TaskGroupSummary};

/// Category prefix for job summary metrics.
pub const JOBS_CATEGORY: &str = "jobs";

/// Category prefix for deployment metrics.
pub const DEPLOYMENTS_CATEGORY: &str = "deployments";

/// Job summary fields, in reporting order.
pub const JOB_FIELDS: &[&str] = &["queued", "complete", "failed", "running", "starting", "lost"];

/// Deployment task-group fields, in reporting order.
pub const DEPLOYMENT_FIELDS: &[&str] = &[
    "promoted",
    "desired_canaries",
    "desired_total",
    "placed_allocs",
    "healthy_allocs",
    "unhealthy_allocs",
];

fn job_field_values(s: &TaskGroupSummary) -> [f64; 6] {
    [
        s.queued as f64,
        s.complete as f64,
        s.failed as f64,
        s.running as f64,
        s.starting as f64,
        s.lost as f64,
    ]
}

fn deployment_field_values(d: &DeploymentState) -> [f64; 6] {
    [
        if d.promoted { 1.0 } else { 0.0 },
        d.desired_canaries as f64,
        d.desired_total as f64,
        d.placed_allocs as f64,
        d.healthy_allocs as f64,
        d.unhealthy_allocs as f64,
    ]
}

fn push_group(
    out: &mut Vec<(String, f64)>,
    category: &str,
    job_id: &str,
    group: &str,
    fields: &[&str],
    values: [f64; 6],
) {
    for (field, value) in fields.iter().zip(values) {
        out.push((format!("{category}.{job_id}_{group}.{field}"), value));
    }
}

/// Flatten job summaries into `jobs.<jobID>_<group>.<field>` entries.
///
/// Jobs without a summary contribute nothing.
pub fn flatten_jobs(jobs: &[Job]) -> Vec<(String, f64)> {
    let mut out = Vec::new();
    for job in jobs {
        let Some(summary) = &job.job_summary else {
            continue;
        };
        // Older agents leave JobSummary.JobID empty; the job ID is the same.
        let job_id = if summary.job_id.is_empty() {
            job.id.as_str()
        } else {
            summary.job_id.as_str()
        };
        for (group, counts) in &summary.summary {
            push_group(
                &mut out,
                JOBS_CATEGORY,
                job_id,
                group,
                JOB_FIELDS,
                job_field_values(counts),
            );
        }
    }
    out
}

/// Flatten deployments into `deployments.<jobID>_<group>.<field>` entries.
pub fn flatten_deployments(deployments: &[Deployment]) -> Vec<(String, f64)> {
    let mut out = Vec::new();
    for deployment in deployments {
        for (group, state) in &deployment.task_groups {
            push_group(
                &mut out,
                DEPLOYMENTS_CATEGORY,
                &deployment.job_id,
                group,
                DEPLOYMENT_FIELDS,
                deployment_field_values(state),
            );
        }
    }
    out
}
