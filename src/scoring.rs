//! Weighted dashboard score and monthly trend.
//!
//! score = Σ(min(pct, cap) × weight) / Σ(weight) over *active* indicators only.
//! Indicators without data for the period drop out of both sums, so their
//! weight is redistributed across the rest.

use serde::Serialize;

use crate::compliance::{compute_compliance, percentage, to_monthly, ComplianceContext};
use crate::types::{ComplianceThresholds, Dashboard, DashboardId, Indicator, MONTHS};

/// Per-indicator ceiling applied before weighting.
pub const DEFAULT_PERCENTAGE_CAP: f64 = 200.0;

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Score summary for one dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardScore {
    pub dashboard_id: DashboardId,
    pub score: f64,
    /// `None` marks a month without active indicators.
    pub monthly: [Option<f64>; MONTHS],
}

/// Computes weighted dashboard scores.
#[derive(Debug, Clone, Copy)]
pub struct DashboardScorer {
    cap: f64,
}

impl Default for DashboardScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardScorer {
    pub fn new() -> Self {
        Self {
            cap: DEFAULT_PERCENTAGE_CAP,
        }
    }

    pub fn with_cap(cap: f64) -> Self {
        Self { cap }
    }

    /// Weighted score (percent, one decimal) of `items` for the period.
    ///
    /// Returns `0` when nothing is active or all active weights are zero.
    pub fn weighted_score(
        &self,
        items: &[Indicator],
        thresholds: &ComplianceThresholds,
        ctx: &ComplianceContext,
    ) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for item in items {
            let result = compute_compliance(item, thresholds, ctx);
            if !result.is_active {
                continue;
            }
            let weight = item.effective_weight();
            weighted += self.capped(result.overall_percentage) * weight;
            total_weight += weight;
        }

        if total_weight > 0.0 {
            round1(weighted / total_weight)
        } else {
            0.0
        }
    }

    /// Independent per-month weighted scores up to `limit_month`.
    ///
    /// Months after the limit, and months where no indicator has data, are
    /// `None` so a trend can tell "no data" from "0%".
    pub fn monthly_scores(
        &self,
        items: &[Indicator],
        ctx: &ComplianceContext,
        limit_month: Option<usize>,
    ) -> [Option<f64>; MONTHS] {
        let mut scores = [None; MONTHS];
        let Some(limit) = limit_month else {
            return scores;
        };

        let monthly: Vec<Indicator> = items.iter().map(|i| to_monthly(i, ctx)).collect();

        for (month, slot) in scores.iter_mut().enumerate().take(limit.min(MONTHS - 1) + 1) {
            let mut weighted = 0.0;
            let mut total_weight = 0.0;
            let mut active = 0usize;

            for item in &monthly {
                let goal = item.goal_at(month);
                let actual = item.progress_at(month);
                if goal == 0.0 && actual == 0.0 {
                    continue;
                }
                active += 1;
                let pct = percentage(actual, goal, item.lower_is_better());
                let weight = item.effective_weight();
                weighted += self.capped(pct) * weight;
                total_weight += weight;
            }

            if active == 0 {
                continue;
            }
            *slot = Some(if total_weight > 0.0 {
                round1(weighted / total_weight)
            } else {
                0.0
            });
        }

        scores
    }

    /// Score and trend of a dashboard, using its own threshold override when set.
    pub fn score_dashboard(
        &self,
        dashboard: &Dashboard,
        default_thresholds: &ComplianceThresholds,
        ctx: &ComplianceContext,
    ) -> DashboardScore {
        let thresholds = dashboard.thresholds.unwrap_or(*default_thresholds);
        DashboardScore {
            dashboard_id: dashboard.id.clone(),
            score: self.weighted_score(&dashboard.items, &thresholds, ctx),
            monthly: self.monthly_scores(&dashboard.items, ctx, ctx.trend_limit()),
        }
    }

    fn capped(&self, pct: f64) -> f64 {
        if pct.is_finite() {
            pct.min(self.cap)
        } else {
            0.0
        }
    }
}
