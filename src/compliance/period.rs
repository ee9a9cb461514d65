//! Weekly → monthly folding for weekly-frequency indicators.
//!
//! Week `0` starts on the configured week-start day on or before January 1 of
//! the target year; week `w` starts `7·w` days later. A week belongs to the
//! month its first day falls in (weeks starting in the previous year count
//! toward January, weeks starting after December 31 are dropped).
//!
//! For the current year only fully closed weeks are folded: the running week
//! and the one before it are left out to avoid partial-period bias.

use chrono::{Datelike, Duration, NaiveDate};

use super::{ComplianceContext, YearPosition};
use crate::types::{finite_or_zero, Indicator, WeekStart, MONTHS};

/// Twelve monthly buckets derived from weekly records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlySeries {
    pub goals: [f64; MONTHS],
    pub progress: [f64; MONTHS],
}

impl MonthlySeries {
    fn empty() -> Self {
        Self {
            goals: [0.0; MONTHS],
            progress: [0.0; MONTHS],
        }
    }
}

/// First day of week `0` for `year`.
pub fn week_zero_start(year: i32, week_start: WeekStart) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let back = (jan1.weekday().num_days_from_monday() + 7
        - week_start.weekday().num_days_from_monday())
        % 7;
    Some(jan1 - Duration::days(back as i64))
}

/// One-based number of the week containing `now`, counted within `now`'s year.
pub fn current_week_number(now: NaiveDate, week_start: WeekStart) -> i64 {
    match week_zero_start(now.year(), week_start) {
        Some(start) => (now - start).num_days() / 7 + 1,
        None => 0,
    }
}

/// Zero-based month a week index belongs to, or `None` past year end.
pub fn month_of_week(year: i32, week_start: WeekStart, week: usize) -> Option<usize> {
    let start = week_zero_start(year, week_start)? + Duration::days(7 * week as i64);
    match start.year().cmp(&year) {
        std::cmp::Ordering::Less => Some(0),
        std::cmp::Ordering::Equal => Some(start.month0() as usize),
        std::cmp::Ordering::Greater => None,
    }
}

/// Fold an indicator's weekly arrays into monthly goals and progress.
///
/// Accumulative indicators sum their weeks; the rest average over the weeks
/// that carry any non-zero goal or progress. Future years fold to zeros.
pub fn weekly_to_monthly(indicator: &Indicator, ctx: &ComplianceContext) -> MonthlySeries {
    let mut series = MonthlySeries::empty();

    let cutoff = match ctx.position() {
        YearPosition::Future => return series,
        YearPosition::Past => None,
        YearPosition::Current => Some(current_week_number(ctx.now, indicator.week_start) - 2),
    };

    let goals = indicator.weekly_goals.as_deref().unwrap_or(&[]);
    let progress = indicator.weekly_progress.as_deref().unwrap_or(&[]);
    let weeks = goals.len().max(progress.len());
    let accumulative = indicator.is_accumulative();
    let mut counts = [0u32; MONTHS];

    for week in 0..weeks {
        if matches!(cutoff, Some(limit) if week as i64 >= limit) {
            break;
        }
        let Some(month) = month_of_week(ctx.year, indicator.week_start, week) else {
            break;
        };
        let goal = finite_or_zero(goals.get(week).copied().flatten());
        let actual = finite_or_zero(progress.get(week).copied().flatten());

        if accumulative {
            series.goals[month] += goal;
            series.progress[month] += actual;
        } else if goal != 0.0 || actual != 0.0 {
            series.goals[month] += goal;
            series.progress[month] += actual;
            counts[month] += 1;
        }
    }

    if !accumulative {
        let slots = series.goals.iter_mut().zip(series.progress.iter_mut());
        for ((goal, actual), count) in slots.zip(counts) {
            if count > 0 {
                *goal /= count as f64;
                *actual /= count as f64;
            }
        }
    }

    series
}

/// Normalized copy of the indicator whose monthly arrays are ready for the
/// calculator. Weekly indicators with weekly data get their monthly arrays
/// rebuilt from the weeks; everything else is only padded to twelve slots.
pub fn to_monthly(indicator: &Indicator, ctx: &ComplianceContext) -> Indicator {
    let mut out = indicator.normalized();
    let has_weeks = indicator.weekly_goals.is_some() || indicator.weekly_progress.is_some();
    if !indicator.is_weekly() || !has_weeks {
        return out;
    }

    let series = weekly_to_monthly(indicator, ctx);
    out.monthly_goals = series.goals.iter().map(|v| Some(*v)).collect();
    out.monthly_progress = series.progress.iter().map(|v| Some(*v)).collect();
    out
}
