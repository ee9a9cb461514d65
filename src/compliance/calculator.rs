//! Compliance percentage and traffic-light status for one indicator.

use serde::{Deserialize, Serialize};

use super::period::to_monthly;
use super::{current_month_index, ComplianceContext, YearPosition};
use crate::types::{ComplianceMode, ComplianceThresholds, Indicator, MONTHS};

/// Traffic-light status of an indicator for the selected period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComplianceStatus {
    OnTrack,
    AtRisk,
    OffTrack,
    /// The selected period is still open.
    InProgress,
    /// No data in the selected period.
    Neutral,
}

/// Outcome of [`compute_compliance`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceResult {
    pub current_progress: f64,
    pub current_target: f64,
    pub overall_percentage: f64,
    pub status: ComplianceStatus,
    pub is_active: bool,
    /// Last month index that was considered, if any.
    pub limit_month: Option<usize>,
}

impl ComplianceResult {
    fn inactive(limit_month: Option<usize>) -> Self {
        Self {
            current_progress: 0.0,
            current_target: 0.0,
            overall_percentage: 0.0,
            status: ComplianceStatus::Neutral,
            is_active: false,
            limit_month,
        }
    }
}

/// Compliance percentage of `actual` against `target`.
///
/// `0/0` is "no data" and yields `0`. A zero target otherwise reads as met
/// (100) or missed (0). Minimize goals invert the ratio, so staying under the
/// ceiling scores above 100.
pub fn percentage(actual: f64, target: f64, lower_is_better: bool) -> f64 {
    if target == 0.0 {
        if actual == 0.0 {
            return 0.0;
        }
        if lower_is_better {
            return 0.0;
        }
        return if actual > 0.0 { 100.0 } else { 0.0 };
    }

    if !lower_is_better {
        return actual / target * 100.0;
    }

    if actual <= 0.0 {
        100.0
    } else {
        target / actual * 100.0
    }
}

/// Map a percentage onto thresholds. `on_track` is checked first, so an
/// inverted pair is applied literally.
pub fn status_for(pct: f64, thresholds: &ComplianceThresholds) -> ComplianceStatus {
    if !pct.is_finite() {
        return ComplianceStatus::OffTrack;
    }
    if pct >= thresholds.on_track {
        ComplianceStatus::OnTrack
    } else if pct >= thresholds.at_risk {
        ComplianceStatus::AtRisk
    } else {
        ComplianceStatus::OffTrack
    }
}

fn has_data(indicator: &Indicator, month: usize) -> bool {
    indicator.goal_at(month) != 0.0 || indicator.progress_at(month) != 0.0
}

fn last_month_with_data(indicator: &Indicator, cap: usize) -> Option<usize> {
    (0..=cap).rev().find(|m| has_data(indicator, *m))
}

/// Last month index that counts for `indicator` under the context's mode.
///
/// `indicator` must already be monthly (see [`to_monthly`]).
pub fn limit_month(indicator: &Indicator, ctx: &ComplianceContext) -> Option<usize> {
    let last = MONTHS - 1;
    match (ctx.position(), ctx.mode) {
        (YearPosition::Future, _) => None,
        (YearPosition::Past, ComplianceMode::Definitive) => Some(last),
        (YearPosition::Past, ComplianceMode::RealTime) => last_month_with_data(indicator, last),
        (YearPosition::Current, ComplianceMode::Definitive) => {
            // Weekly data already dropped the open weeks.
            if indicator.is_weekly() {
                Some(ctx.current_month())
            } else {
                ctx.current_month().checked_sub(1)
            }
        }
        (YearPosition::Current, ComplianceMode::RealTime) => {
            last_month_with_data(indicator, ctx.current_month())
        }
    }
}

/// Compute compliance of one indicator for the context's period.
///
/// `thresholds` applies unless the indicator carries its own override.
pub fn compute_compliance(
    indicator: &Indicator,
    thresholds: &ComplianceThresholds,
    ctx: &ComplianceContext,
) -> ComplianceResult {
    let monthly = to_monthly(indicator, ctx);
    let Some(limit) = limit_month(&monthly, ctx) else {
        return ComplianceResult::inactive(None);
    };

    let accumulative = monthly.is_accumulative();
    let mut goal_sum = 0.0;
    let mut progress_sum = 0.0;
    let mut months_with_data = 0u32;

    for month in 0..=limit {
        let active = has_data(&monthly, month);
        if active {
            months_with_data += 1;
        }
        if accumulative || active {
            goal_sum += monthly.goal_at(month);
            progress_sum += monthly.progress_at(month);
        }
    }

    if months_with_data == 0 {
        return ComplianceResult::inactive(Some(limit));
    }

    let (target, actual) = if accumulative {
        (goal_sum, progress_sum)
    } else {
        let n = months_with_data as f64;
        (goal_sum / n, progress_sum / n)
    };

    let pct = percentage(actual, target, monthly.lower_is_better());
    let period_open = ctx.mode == ComplianceMode::RealTime
        && current_month_index(ctx.year, ctx.now) == Some(limit);
    let status = if period_open {
        ComplianceStatus::InProgress
    } else {
        status_for(pct, &monthly.thresholds.unwrap_or(*thresholds))
    };

    ComplianceResult {
        current_progress: actual,
        current_target: target,
        overall_percentage: pct,
        status,
        is_active: true,
        limit_month: Some(limit),
    }
}
