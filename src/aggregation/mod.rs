//! Synthetic aggregate dashboards.
//!
//! One aggregate per target group with at least one member board, plus a
//! global aggregate for an admin with a selected client or for a
//! super-director. Aggregates are rebuilt from the real boards on every pass
//! and never carry over from a previous one.

pub mod merge;

use std::collections::HashSet;

use crate::compliance::ComplianceContext;
use crate::config::EngineConfig;
use crate::groups::{normalize, GroupLabels};
use crate::hierarchy::HierarchyResolver;
use crate::types::{Dashboard, DashboardId, User};

pub use merge::merge_items;

/// Sort key of per-group aggregates (before every real board).
pub const GROUP_AGGREGATE_ORDER: i64 = -1;
/// Sort key of the global aggregate (before everything).
pub const GLOBAL_AGGREGATE_ORDER: i64 = -100;

/// `agg-<normalizedGroup>-<year>`
pub fn group_aggregate_id(group: &str, year: i32) -> DashboardId {
    DashboardId::Aggregate(format!("agg-{}-{}", normalize(group), year))
}

/// `agg-global-total-<year>`
pub fn global_aggregate_id(year: i32) -> DashboardId {
    DashboardId::Aggregate(format!("agg-global-total-{}", year))
}

/// Builds aggregate dashboards from relabeled real boards.
pub struct AggregationEngine<'r, 'a> {
    resolver: &'r HierarchyResolver<'a>,
    config: &'r EngineConfig,
    ctx: ComplianceContext,
}

impl<'r, 'a> AggregationEngine<'r, 'a> {
    pub fn new(
        resolver: &'r HierarchyResolver<'a>,
        config: &'r EngineConfig,
        ctx: ComplianceContext,
    ) -> Self {
        Self {
            resolver,
            config,
            ctx,
        }
    }

    /// Groups that get an aggregate: a super-director's sub-groups, or every
    /// official group otherwise.
    pub fn target_groups(&self) -> GroupLabels {
        let viewer = self.resolver.viewer();
        if viewer.is_super_director() {
            viewer.user.sub_groups.iter().map(String::as_str).collect()
        } else {
            self.resolver.official_groups().clone()
        }
    }

    /// Aggregates for `boards`: the global one first, then one per group.
    ///
    /// `boards` must already carry resolved groups (see
    /// [`HierarchyResolver::relabel`]).
    pub fn build(&self, boards: &[Dashboard]) -> Vec<Dashboard> {
        let mut aggregates = Vec::new();

        if let Some(global) = self.build_global(boards) {
            aggregates.push(global);
        }

        let groups = self.target_groups();
        for (key, display) in groups.iter() {
            let members = sorted_members(boards.iter().filter(|b| normalize(&b.group) == key));
            if members.is_empty() {
                continue;
            }
            aggregates.push(self.group_aggregate(key, display, &members));
        }

        aggregates
    }

    fn group_aggregate(&self, key: &str, display: &str, members: &[&Dashboard]) -> Dashboard {
        let title = self
            .resolver
            .director_for_group(key)
            .and_then(User::title)
            .unwrap_or(display)
            .to_string();

        log::debug!(
            "Aggregate '{}' over {} boards (year {})",
            title,
            members.len(),
            self.ctx.year
        );

        Dashboard {
            id: group_aggregate_id(key, self.ctx.year),
            original_id: None,
            title,
            group: display.to_string(),
            area: None,
            client_id: self.client_for(members),
            year: Some(self.ctx.year),
            order_number: GROUP_AGGREGATE_ORDER,
            items: merge_items(members, &self.ctx),
            thresholds: merge::shared_thresholds(members.iter().map(|m| m.thresholds)),
            is_aggregate: true,
            is_hierarchy_root: Some(self.is_hierarchy_root(key)),
            navigation_parent: self.navigation_parent(key),
            owner_id: None,
        }
    }

    fn build_global(&self, boards: &[Dashboard]) -> Option<Dashboard> {
        let viewer = self.resolver.viewer();

        let (title, members) = if viewer.is_admin() && viewer.selected_client_id.is_some() {
            (
                self.config.global_aggregate_title.clone(),
                sorted_members(boards.iter()),
            )
        } else if viewer.is_super_director() {
            let mut keys: HashSet<String> =
                viewer.user.sub_groups.iter().map(|g| normalize(g)).collect();
            let title = viewer.user.title().unwrap_or_default().to_string();
            keys.insert(normalize(&title));
            keys.remove("");
            let members =
                sorted_members(boards.iter().filter(|b| keys.contains(&normalize(&b.group))));
            (title, members)
        } else {
            return None;
        };

        if members.is_empty() {
            return None;
        }

        log::debug!("Global aggregate '{}' over {} boards", title, members.len());

        Some(Dashboard {
            id: global_aggregate_id(self.ctx.year),
            original_id: None,
            group: title.clone(),
            title,
            area: None,
            client_id: self.client_for(&members),
            year: Some(self.ctx.year),
            order_number: GLOBAL_AGGREGATE_ORDER,
            items: merge_items(&members, &self.ctx),
            thresholds: merge::shared_thresholds(members.iter().map(|m| m.thresholds)),
            is_aggregate: true,
            is_hierarchy_root: Some(true),
            navigation_parent: None,
            owner_id: None,
        })
    }

    /// A group is a hierarchy root when its director supervises sub-groups
    /// or is the viewer.
    fn is_hierarchy_root(&self, key: &str) -> bool {
        let viewer = self.resolver.viewer();
        let owns = |u: &User| u.title().map(normalize).as_deref() == Some(key);
        let is_viewer = |u: &User| !u.id.is_empty() && u.id == viewer.user.id;

        if viewer.is_super_director() && owns(&viewer.user) {
            return true;
        }
        self.resolver
            .directors()
            .iter()
            .any(|d| owns(*d) && (d.is_super_director() || is_viewer(*d)))
    }

    fn navigation_parent(&self, key: &str) -> Option<String> {
        let viewer = self.resolver.viewer();
        if viewer.is_super_director() && viewer.user.sub_groups.iter().any(|g| normalize(g) == key)
        {
            let own = viewer.user.title().map(normalize);
            if own.as_deref() != Some(key) {
                return own;
            }
        }
        self.resolver
            .supervisor_of(key)
            .and_then(User::title)
            .map(normalize)
    }

    fn client_for(&self, members: &[&Dashboard]) -> Option<String> {
        self.resolver
            .viewer()
            .selected_client_id
            .clone()
            .or_else(|| members.iter().find_map(|m| m.client_id.clone()))
    }
}

fn sorted_members<'b>(boards: impl Iterator<Item = &'b Dashboard>) -> Vec<&'b Dashboard> {
    let mut members: Vec<&Dashboard> = boards.collect();
    members.sort_by(|a, b| a.id.cmp(&b.id));
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AccessRole, ComplianceMode, Frequency, GlobalRole, GoalType, Indicator, IndicatorKind,
        ItemId, Viewer, WeekStart,
    };
    use chrono::NaiveDate;

    fn director(id: &str, title: &str, subs: &[&str]) -> User {
        User {
            id: id.to_string(),
            client_id: Some("c1".to_string()),
            global_role: GlobalRole::Director,
            director_title: Some(title.to_string()),
            sub_groups: subs.iter().map(|s| s.to_string()).collect(),
            dashboard_access: [("1".to_string(), AccessRole::Editor)].into_iter().collect(),
        }
    }

    fn ventas(goal: f64, progress: f64) -> Indicator {
        Indicator {
            id: ItemId::Number(1),
            name: "Ventas".to_string(),
            weight: 50.0,
            kind: IndicatorKind::Average,
            goal_type: GoalType::Maximize,
            frequency: Frequency::Monthly,
            week_start: WeekStart::Mon,
            monthly_goals: vec![Some(goal)],
            monthly_progress: vec![Some(progress)],
            monthly_notes: vec![],
            weekly_goals: None,
            weekly_progress: None,
            thresholds: None,
        }
    }

    fn board(id: i64, group: &str, items: Vec<Indicator>) -> Dashboard {
        Dashboard {
            id: DashboardId::Real(id),
            original_id: None,
            title: format!("Board {}", id),
            group: group.to_string(),
            area: None,
            client_id: Some("c1".to_string()),
            year: Some(2025),
            order_number: id,
            items,
            thresholds: None,
            is_aggregate: false,
            is_hierarchy_root: None,
            navigation_parent: None,
            owner_id: None,
        }
    }

    fn ctx() -> ComplianceContext {
        ComplianceContext::new(
            2025,
            ComplianceMode::Definitive,
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
        )
    }

    fn users() -> Vec<User> {
        vec![
            director("u1", "SUR", &[]),
            director("u2", "Norte", &[]),
            director("u3", "Gerencia", &["Sur", "Norte"]),
        ]
    }

    fn boards() -> Vec<Dashboard> {
        vec![
            board(2, "SUR", vec![ventas(200.0, 180.0)]),
            board(1, "SUR", vec![ventas(100.0, 80.0)]),
            board(3, "Norte", vec![ventas(50.0, 50.0)]),
            board(4, "GENERAL", vec![ventas(10.0, 10.0)]),
        ]
    }

    #[test]
    fn test_group_aggregate_combines_shared_indicator() {
        let users = users();
        let viewer = Viewer::default();
        let config = EngineConfig::default();
        let resolver = HierarchyResolver::new(&users, &viewer, &config.fallback_group);
        let aggregates = AggregationEngine::new(&resolver, &config, ctx()).build(&boards());

        let sur = aggregates
            .iter()
            .find(|a| a.id == DashboardId::Aggregate("agg-SUR-2025".to_string()))
            .expect("SUR aggregate");
        assert!(sur.is_aggregate);
        assert_eq!(sur.order_number, GROUP_AGGREGATE_ORDER);
        assert_eq!(sur.title, "SUR");
        assert_eq!(sur.items.len(), 1);
        assert_eq!(sur.items[0].goal_at(0), 150.0);
        assert_eq!(sur.items[0].progress_at(0), 130.0);
        assert_eq!(sur.navigation_parent.as_deref(), Some("GERENCIA"));
        assert_eq!(sur.is_hierarchy_root, Some(false));
    }

    #[test]
    fn test_no_aggregate_for_empty_or_unofficial_groups() {
        let users = users();
        let viewer = Viewer::default();
        let config = EngineConfig::default();
        let resolver = HierarchyResolver::new(&users, &viewer, &config.fallback_group);
        let aggregates = AggregationEngine::new(&resolver, &config, ctx()).build(&boards());

        let ids: Vec<String> = aggregates.iter().map(|a| a.id.to_string()).collect();
        assert_eq!(ids, vec!["agg-SUR-2025", "agg-NORTE-2025"]);
    }

    #[test]
    fn test_member_viewer_gets_no_global() {
        let users = users();
        let viewer = Viewer::default();
        let config = EngineConfig::default();
        let resolver = HierarchyResolver::new(&users, &viewer, &config.fallback_group);
        let aggregates = AggregationEngine::new(&resolver, &config, ctx()).build(&boards());
        assert!(aggregates.iter().all(|a| a.order_number != GLOBAL_AGGREGATE_ORDER));
    }

    #[test]
    fn test_admin_with_client_gets_global_first() {
        let users = users();
        let viewer = Viewer {
            user: User {
                id: "admin".to_string(),
                global_role: GlobalRole::Admin,
                ..Default::default()
            },
            selected_client_id: Some("c1".to_string()),
        };
        let config = EngineConfig::default();
        let resolver = HierarchyResolver::new(&users, &viewer, &config.fallback_group);
        let aggregates = AggregationEngine::new(&resolver, &config, ctx()).build(&boards());

        let global = &aggregates[0];
        assert_eq!(global.id, global_aggregate_id(2025));
        assert_eq!(global.title, "TOTAL GLOBAL");
        assert_eq!(global.order_number, GLOBAL_AGGREGATE_ORDER);
        assert_eq!(global.is_hierarchy_root, Some(true));
        assert_eq!(global.client_id.as_deref(), Some("c1"));
        // All four boards: (100 + 200 + 50 + 10) / 4
        assert_eq!(global.items[0].goal_at(0), 90.0);
    }

    #[test]
    fn test_admin_without_client_gets_no_global() {
        let users = users();
        let viewer = Viewer {
            user: User {
                global_role: GlobalRole::Admin,
                ..Default::default()
            },
            selected_client_id: None,
        };
        let config = EngineConfig::default();
        let resolver = HierarchyResolver::new(&users, &viewer, &config.fallback_group);
        let aggregates = AggregationEngine::new(&resolver, &config, ctx()).build(&boards());
        assert!(aggregates.iter().all(|a| a.id != global_aggregate_id(2025)));
    }

    #[test]
    fn test_super_director_scope() {
        let users = users();
        let viewer = Viewer {
            user: director("u3", "Gerencia", &["Sur", "Norte"]),
            selected_client_id: None,
        };
        let config = EngineConfig::default();
        let resolver = HierarchyResolver::new(&users, &viewer, &config.fallback_group);
        let relabeled = resolver.relabel(&boards());
        let engine = AggregationEngine::new(&resolver, &config, ctx());
        let aggregates = engine.build(&relabeled);

        let ids: Vec<String> = aggregates.iter().map(|a| a.id.to_string()).collect();
        assert_eq!(
            ids,
            vec!["agg-global-total-2025", "agg-SUR-2025", "agg-NORTE-2025"]
        );
        let global = &aggregates[0];
        assert_eq!(global.title, "Gerencia");
        // Boards 1, 2, 3; the GENERAL board is outside the scope.
        assert_eq!(global.items[0].goal_at(0), (100.0 + 200.0 + 50.0) / 3.0);
        // Sub-group spelling from the viewer, title from the director.
        assert_eq!(aggregates[1].group, "Sur");
        assert_eq!(aggregates[1].title, "SUR");
        assert_eq!(aggregates[1].navigation_parent.as_deref(), Some("GERENCIA"));
    }

    #[test]
    fn test_hierarchy_root_for_supervising_director_group() {
        let users = users();
        let viewer = Viewer::default();
        let config = EngineConfig::default();
        let resolver = HierarchyResolver::new(&users, &viewer, &config.fallback_group);
        let mut input = boards();
        input.push(board(9, "Gerencia", vec![ventas(1.0, 1.0)]));
        let aggregates = AggregationEngine::new(&resolver, &config, ctx()).build(&input);

        let gerencia = aggregates
            .iter()
            .find(|a| a.group == "Gerencia")
            .expect("Gerencia aggregate");
        assert_eq!(gerencia.is_hierarchy_root, Some(true));
        assert!(gerencia.navigation_parent.is_none());
    }

    #[test]
    fn test_viewer_own_group_is_root() {
        let users = users();
        let viewer = Viewer {
            user: director("u2", "Norte", &[]),
            selected_client_id: None,
        };
        let config = EngineConfig::default();
        let resolver = HierarchyResolver::new(&users, &viewer, &config.fallback_group);
        let aggregates = AggregationEngine::new(&resolver, &config, ctx()).build(&boards());
        let norte = aggregates.iter().find(|a| a.group == "Norte").unwrap();
        assert_eq!(norte.is_hierarchy_root, Some(true));
    }

    #[test]
    fn test_build_is_order_independent() {
        let users = users();
        let viewer = Viewer::default();
        let config = EngineConfig::default();
        let resolver = HierarchyResolver::new(&users, &viewer, &config.fallback_group);
        let engine = AggregationEngine::new(&resolver, &config, ctx());

        let forward = boards();
        let mut backward = boards();
        backward.reverse();
        assert_eq!(engine.build(&forward), engine.build(&backward));
    }
}
