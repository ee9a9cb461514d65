//! Full recomputation pass over one snapshot.
//!
//! 1. Keep the real boards for the year and selected client (stale aggregates
//!    and the legacy `-1` sentinel are dropped).
//! 2. Pad every indicator to twelve monthly slots.
//! 3. Relabel each board's group through the director hierarchy.
//! 4. Build aggregates and score every dashboard.
//!
//! The pass is a pure function of the snapshot and the injected "now":
//! running it twice yields identical output.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregation::AggregationEngine;
use crate::compliance::ComplianceContext;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::hierarchy::HierarchyResolver;
use crate::scoring::{DashboardScore, DashboardScorer};
use crate::types::{ComplianceMode, ComplianceThresholds, Dashboard, User, Viewer, MONTHS};

/// Everything one pass needs, as handed over by the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub dashboards: Vec<Dashboard>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub viewer: Viewer,
    pub year: i32,
    #[serde(default)]
    pub mode: ComplianceMode,
    /// Reference date; the caller supplies one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now: Option<NaiveDate>,
    /// Overrides the configured default thresholds for this pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ComplianceThresholds>,
}

impl Snapshot {
    /// Check every dashboard's shape contract.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.dashboards.iter().try_for_each(validate_dashboard)
    }
}

/// Enriched dashboard list plus per-dashboard scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupOutput {
    /// Aggregates (global first) followed by the relabeled real boards.
    pub dashboards: Vec<Dashboard>,
    pub scores: Vec<DashboardScore>,
}

/// Check that a dashboard's indicators carry twelve monthly slots and
/// matching weekly arrays.
pub fn validate_dashboard(dashboard: &Dashboard) -> Result<(), EngineError> {
    for item in &dashboard.items {
        let mismatch = |field: &'static str, expected: usize, found: usize| {
            EngineError::ShapeMismatch {
                dashboard: dashboard.id.to_string(),
                indicator: item.name.clone(),
                field,
                expected,
                found,
            }
        };

        if item.monthly_goals.len() != MONTHS {
            return Err(mismatch("monthlyGoals", MONTHS, item.monthly_goals.len()));
        }
        if item.monthly_progress.len() != MONTHS {
            return Err(mismatch("monthlyProgress", MONTHS, item.monthly_progress.len()));
        }
        if !item.monthly_notes.is_empty() && item.monthly_notes.len() != MONTHS {
            return Err(mismatch("monthlyNotes", MONTHS, item.monthly_notes.len()));
        }
        if let (Some(goals), Some(progress)) = (&item.weekly_goals, &item.weekly_progress) {
            if goals.len() != progress.len() {
                return Err(mismatch("weeklyProgress", goals.len(), progress.len()));
            }
        }
    }
    Ok(())
}

/// Real boards that take part in this pass, with indicators padded.
fn ingest(snapshot: &Snapshot) -> Vec<Dashboard> {
    let client = snapshot.viewer.selected_client_id.as_deref();

    snapshot
        .dashboards
        .iter()
        .filter(|d| !d.is_aggregate && !d.id.is_aggregate() && !d.id.is_no_data())
        .filter(|d| d.year.map_or(true, |y| y == snapshot.year))
        .filter(|d| match (client, d.client_id.as_deref()) {
            (Some(selected), Some(owner)) => selected == owner,
            _ => true,
        })
        .map(|d| {
            if let Err(e) = validate_dashboard(d) {
                log::warn!("{}; missing slots read as zero", e);
            }
            Dashboard {
                items: d.items.iter().map(|i| i.normalized()).collect(),
                ..d.clone()
            }
        })
        .collect()
}

/// Run one recomputation pass.
///
/// `now` is used only when the snapshot does not carry its own.
pub fn run_rollup(snapshot: &Snapshot, config: &EngineConfig, now: NaiveDate) -> RollupOutput {
    let ctx = ComplianceContext::new(snapshot.year, snapshot.mode, snapshot.now.unwrap_or(now));
    let thresholds = snapshot.thresholds.unwrap_or(config.default_thresholds);

    let boards = ingest(snapshot);
    let resolver = HierarchyResolver::new(&snapshot.users, &snapshot.viewer, &config.fallback_group);

    let mut real = resolver.relabel(&boards);
    real.sort_by(|a, b| a.order_number.cmp(&b.order_number).then_with(|| a.id.cmp(&b.id)));

    let mut dashboards = AggregationEngine::new(&resolver, config, ctx).build(&real);
    log::info!(
        "Roll-up for {}: {} boards, {} aggregates",
        snapshot.year,
        real.len(),
        dashboards.len()
    );
    dashboards.extend(real);

    let scorer = DashboardScorer::with_cap(config.percentage_cap);
    let scores = dashboards
        .iter()
        .map(|d| scorer.score_dashboard(d, &thresholds, &ctx))
        .collect();

    RollupOutput { dashboards, scores }
}
