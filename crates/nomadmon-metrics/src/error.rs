//! Error types for metric collection.

use std::fmt;

use thiserror::Error;

use nomadmon_api::ApiError;

/// Result type alias for a poll cycle.
pub type CycleResult<T> = Result<T, CycleError>;

/// Errors that abort a whole poll cycle.
///
/// No metrics are published and the task registry is left untouched.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("group fetch failed: {0}")]
    Fetch(#[from] ApiError),
}

/// Per-allocation failures. These never abort a cycle; the allocation
/// simply contributes no metrics.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("allocation {allocation_id} detail unavailable: {source}")]
    AllocationDetailUnavailable {
        allocation_id: String,
        #[source]
        source: ApiError,
    },

    #[error("allocation {allocation_id} stats unavailable: {source}")]
    AllocationStatsUnavailable {
        allocation_id: String,
        #[source]
        source: ApiError,
    },

    #[error("allocation {allocation_id} collection task aborted: {reason}")]
    TaskAborted {
        allocation_id: String,
        reason: String,
    },
}

impl CollectError {
    pub fn allocation_id(&self) -> &str {
        match self {
            CollectError::AllocationDetailUnavailable { allocation_id, .. }
            | CollectError::AllocationStatsUnavailable { allocation_id, .. }
            | CollectError::TaskAborted { allocation_id, .. } => allocation_id,
        }
    }
}

/// The kind of entity a status label was reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    AgentMember,
    Node,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::AgentMember => write!(f, "agent member"),
            EntityKind::Node => write!(f, "node"),
        }
    }
}

/// A status label outside the expected vocabulary. Logged, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {entity_kind} status label {label:?}")]
pub struct UnrecognizedStatusLabel {
    pub entity_kind: EntityKind,
    pub label: String,
}

/// Errors loading or saving a persisted task registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("registry file {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors writing to a metric sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("graph definition encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type SinkResult<T> = Result<T, SinkError>;
