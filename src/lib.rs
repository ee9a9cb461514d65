//! Compliance scoring and director-hierarchy roll-up for KPI dashboards.
//!
//! Given a snapshot of dashboards, users, and a viewer, the engine computes
//! per-indicator compliance, weighted dashboard scores, and synthetic
//! aggregate dashboards per director group. Everything here is a pure
//! function of its inputs and one injected "now".

pub mod aggregation;
pub mod compliance;
pub mod config;
pub mod error;
pub mod groups;
pub mod hierarchy;
pub mod pipeline;
pub mod scoring;
pub mod types;
