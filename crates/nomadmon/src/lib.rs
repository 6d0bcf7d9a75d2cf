//! nomadmon — metrics agent for a Nomad cluster.
//!
//! The binary is a thin CLI over [`agent`]; the same entry points are used
//! by the integration tests.

pub mod agent;
pub mod config;
