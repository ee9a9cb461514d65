//! Item-level roll-up used to build aggregate dashboards.
//!
//! Indicators from the member boards are matched by normalized name and
//! folded into one indicator per name. Accumulative indicators add up slot
//! by slot; the rest take a weight-weighted average of the members that have
//! data in that slot.

use std::collections::HashMap;

use crate::compliance::{to_monthly, ComplianceContext};
use crate::groups::normalize;
use crate::types::{
    finite_or_zero, ComplianceThresholds, Dashboard, Frequency, Indicator, ItemId, MONTHS,
};

/// Merge the indicators of `boards` into one indicator per distinct name.
///
/// Output order follows the first appearance of each name across `boards`.
pub fn merge_items(boards: &[&Dashboard], ctx: &ComplianceContext) -> Vec<Indicator> {
    let mut buckets: Vec<(String, Vec<&Indicator>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in boards.iter().flat_map(|b| b.items.iter()) {
        let mut key = normalize(&item.name);
        if key.is_empty() {
            key = item.id.to_string();
        }
        match index.get(&key) {
            Some(&i) => buckets[i].1.push(item),
            None => {
                index.insert(key.clone(), buckets.len());
                buckets.push((key, vec![item]));
            }
        }
    }

    buckets
        .into_iter()
        .map(|(key, members)| merge_indicator(&key, &members, ctx))
        .collect()
}

/// Fold same-named indicators into one. `members` must be non-empty.
fn merge_indicator(key: &str, members: &[&Indicator], ctx: &ComplianceContext) -> Indicator {
    let first = members[0];
    let accumulative = first.is_accumulative();
    let weights: Vec<f64> = members.iter().map(|m| m.effective_weight()).collect();

    let all_weekly = members.iter().all(|m| {
        m.is_weekly()
            && m.week_start == first.week_start
            && (m.weekly_goals.is_some() || m.weekly_progress.is_some())
    });

    let (monthly_goals, monthly_progress, weekly_goals, weekly_progress, frequency) = if all_weekly {
        let monthly: Vec<Indicator> = members.iter().map(|m| m.normalized()).collect();
        let (mg, mp) = combine(
            monthly.iter().map(|m| (&m.monthly_goals[..], &m.monthly_progress[..])),
            &weights,
            MONTHS,
            accumulative,
        );
        let weeks = members
            .iter()
            .map(|m| {
                let g = m.weekly_goals.as_ref().map_or(0, Vec::len);
                let p = m.weekly_progress.as_ref().map_or(0, Vec::len);
                g.max(p)
            })
            .max()
            .unwrap_or(0);
        let (wg, wp) = combine(
            members.iter().map(|m| {
                (
                    m.weekly_goals.as_deref().unwrap_or(&[]),
                    m.weekly_progress.as_deref().unwrap_or(&[]),
                )
            }),
            &weights,
            weeks,
            accumulative,
        );
        (mg, mp, Some(wg), Some(wp), Frequency::Weekly)
    } else {
        let monthly: Vec<Indicator> = members.iter().map(|m| to_monthly(m, ctx)).collect();
        let (mg, mp) = combine(
            monthly.iter().map(|m| (&m.monthly_goals[..], &m.monthly_progress[..])),
            &weights,
            MONTHS,
            accumulative,
        );
        (mg, mp, None, None, Frequency::Monthly)
    };

    Indicator {
        id: ItemId::Text(key.to_string()),
        name: first.name.trim().to_string(),
        weight: weights.iter().sum(),
        kind: first.kind,
        goal_type: first.goal_type,
        frequency,
        week_start: first.week_start,
        monthly_goals,
        monthly_progress,
        monthly_notes: vec![String::new(); MONTHS],
        weekly_goals,
        weekly_progress,
        thresholds: shared_thresholds(members.iter().map(|m| m.thresholds)),
    }
}

type Series = Vec<Option<f64>>;

/// Combine `(goals, progress)` slices slot by slot over `len` slots.
fn combine<'s>(
    series: impl Iterator<Item = (&'s [Option<f64>], &'s [Option<f64>])>,
    weights: &[f64],
    len: usize,
    accumulative: bool,
) -> (Series, Series) {
    let series: Vec<_> = series.collect();
    let mut goals = Vec::with_capacity(len);
    let mut progress = Vec::with_capacity(len);

    for slot in 0..len {
        let values = series.iter().zip(weights).map(|((g, p), w)| {
            (
                finite_or_zero(g.get(slot).copied().flatten()),
                finite_or_zero(p.get(slot).copied().flatten()),
                *w,
            )
        });
        let (goal, actual) = combine_slot(values, accumulative);
        goals.push(Some(goal));
        progress.push(Some(actual));
    }

    (goals, progress)
}

fn combine_slot(values: impl Iterator<Item = (f64, f64, f64)>, accumulative: bool) -> (f64, f64) {
    if accumulative {
        return values.fold((0.0, 0.0), |(g, p), (vg, vp, _)| (g + vg, p + vp));
    }

    let present: Vec<(f64, f64, f64)> = values.filter(|(g, p, _)| *g != 0.0 || *p != 0.0).collect();
    if present.is_empty() {
        return (0.0, 0.0);
    }

    let total_weight: f64 = present.iter().map(|(_, _, w)| w).sum();
    if total_weight > 0.0 {
        let goal = present.iter().map(|(g, _, w)| g * w).sum::<f64>() / total_weight;
        let actual = present.iter().map(|(_, p, w)| p * w).sum::<f64>() / total_weight;
        (goal, actual)
    } else {
        let n = present.len() as f64;
        let goal = present.iter().map(|(g, _, _)| g).sum::<f64>() / n;
        let actual = present.iter().map(|(_, p, _)| p).sum::<f64>() / n;
        (goal, actual)
    }
}

/// Thresholds shared by every entry, if they all agree.
pub(crate) fn shared_thresholds(
    mut all: impl Iterator<Item = Option<ComplianceThresholds>>,
) -> Option<ComplianceThresholds> {
    let first = all.next()??;
    all.all(|t| t == Some(first)).then_some(first)
}
