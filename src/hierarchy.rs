//! Director hierarchy: which group owns each dashboard.
//!
//! Resolution order for a real board:
//! 1. A director holding an explicit grant for the board (its own implicit
//!    owner excluded). Among several, the leaf wins: a director who does not
//!    supervise any other candidate's title.
//! 2. An orphan board (blank or fallback group) the viewing director can
//!    access is claimed by the viewer.
//! 3. The board's own `group`, matched against official labels, or the
//!    fallback group.
//!
//! A super-director viewer then maps the result onto their own sub-group
//! spelling. Directors are ordered by user id, then normalized title, so ties
//! never depend on fetch order.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::groups::{matches_loosely, normalize, GroupLabels};
use crate::types::{Dashboard, User, Viewer};

/// Resolves group ownership against one snapshot of users.
#[derive(Debug, Clone)]
pub struct HierarchyResolver<'a> {
    directors: Vec<&'a User>,
    official: GroupLabels,
    viewer: &'a Viewer,
    fallback_group: String,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(users: &'a [User], viewer: &'a Viewer, fallback_group: &str) -> Self {
        let mut directors: Vec<&'a User> = users.iter().filter(|u| u.is_director()).collect();
        if viewer.is_director() && !directors.iter().any(|d| same_user(d, &viewer.user)) {
            directors.push(&viewer.user);
        }
        directors.sort_by(|a, b| director_order(a, b));
        directors.dedup_by(|a, b| same_user(a, b));

        let mut official = GroupLabels::new();
        for director in &directors {
            if let Some(title) = director.title() {
                official.insert(title);
            }
        }
        for director in &directors {
            for group in &director.sub_groups {
                official.insert(group);
            }
        }

        Self {
            directors,
            official,
            viewer,
            fallback_group: fallback_group.trim().to_string(),
        }
    }

    /// Directors in resolution order.
    pub fn directors(&self) -> &[&'a User] {
        &self.directors
    }

    /// Official labels: director titles, then super-director sub-groups.
    pub fn official_groups(&self) -> &GroupLabels {
        &self.official
    }

    pub fn fallback_group(&self) -> &str {
        &self.fallback_group
    }

    pub fn viewer(&self) -> &'a Viewer {
        self.viewer
    }

    pub fn is_fallback(&self, group: &str) -> bool {
        normalize(group) == normalize(&self.fallback_group)
    }

    /// Director whose title keys to `group`.
    pub fn director_for_group(&self, group: &str) -> Option<&'a User> {
        let key = normalize(group);
        self.directors
            .iter()
            .copied()
            .find(|d| d.title().map(normalize).as_deref() == Some(key.as_str()))
    }

    /// Super-director listing `group` among their sub-groups.
    pub fn supervisor_of(&self, group: &str) -> Option<&'a User> {
        let key = normalize(group);
        self.directors.iter().copied().find(|d| {
            d.title().map(normalize).as_deref() != Some(key.as_str())
                && d.sub_groups.iter().any(|g| normalize(g) == key)
        })
    }

    /// Director that owns the board through an explicit grant.
    pub fn owning_director(&self, dashboard: &Dashboard) -> Option<&'a User> {
        let candidates: Vec<&'a User> = self
            .directors
            .iter()
            .copied()
            .filter(|d| d.has_access(dashboard))
            .filter(|d| dashboard.owner_id.as_deref() != Some(d.id.as_str()))
            .collect();

        match candidates.as_slice() {
            [] => None,
            [only] => Some(*only),
            [first, ..] => {
                let leaf = candidates.iter().copied().find(|c| is_leaf(c, &candidates));
                if leaf.is_none() {
                    log::warn!(
                        "No leaf director among {} candidates for dashboard {}; using '{}'",
                        candidates.len(),
                        dashboard.id,
                        first.id
                    );
                }
                Some(leaf.unwrap_or(*first))
            }
        }
    }

    /// Owning group label for a board.
    pub fn resolve_group(&self, dashboard: &Dashboard) -> String {
        let base = self.base_group(dashboard);
        self.scope_to_viewer(base)
    }

    /// New boards with `group` replaced by the resolved label.
    pub fn relabel(&self, dashboards: &[Dashboard]) -> Vec<Dashboard> {
        dashboards
            .iter()
            .map(|d| {
                let group = self.resolve_group(d);
                if group != d.group {
                    log::debug!("Dashboard {} regrouped '{}' -> '{}'", d.id, d.group, group);
                }
                Dashboard {
                    group,
                    ..d.clone()
                }
            })
            .collect()
    }

    fn base_group(&self, dashboard: &Dashboard) -> String {
        if let Some(title) = self.owning_director(dashboard).and_then(User::title) {
            return self.official.display(title).unwrap_or(title).to_string();
        }

        let raw = dashboard.group.trim();
        let orphan = raw.is_empty() || self.is_fallback(raw);
        if orphan && self.viewer.is_director() && self.viewer.user.has_access(dashboard) {
            if let Some(title) = self.viewer.user.title() {
                return self.official.display(title).unwrap_or(title).to_string();
            }
        }

        match self.official.display(raw) {
            Some(display) => display.to_string(),
            None => self.fallback_group.clone(),
        }
    }

    fn scope_to_viewer(&self, group: String) -> String {
        if !self.viewer.is_super_director() || self.is_fallback(&group) {
            return group;
        }
        let key = normalize(&group);
        let subs: Vec<&str> = self
            .viewer
            .user
            .sub_groups
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .collect();

        if let Some(exact) = subs.iter().find(|g| normalize(g) == key) {
            return exact.to_string();
        }
        if let Some(sub) = subs.iter().find(|g| matches_loosely(g, &group)) {
            return sub.to_string();
        }
        self.official
            .display(&group)
            .map(str::to_string)
            .unwrap_or(group)
    }
}

/// Total order over directors: user id, then normalized title, then the raw
/// fields that can still tell two id-less records apart.
fn director_order(a: &User, b: &User) -> Ordering {
    let title_key = |u: &User| u.title().map(normalize).unwrap_or_default();
    let sub_keys = |u: &User| {
        let mut keys: Vec<String> = u.sub_groups.iter().map(|g| normalize(g)).collect();
        keys.sort();
        keys
    };

    a.id.cmp(&b.id)
        .then_with(|| title_key(a).cmp(&title_key(b)))
        .then_with(|| a.director_title.cmp(&b.director_title))
        .then_with(|| sub_keys(a).cmp(&sub_keys(b)))
        .then_with(|| a.dashboard_access.keys().cmp(b.dashboard_access.keys()))
        .then_with(|| a.client_id.cmp(&b.client_id))
}

/// Same person: equal non-empty ids, or identical id-less records.
fn same_user(a: &User, b: &User) -> bool {
    if a.id.is_empty() || b.id.is_empty() {
        a == b
    } else {
        a.id == b.id
    }
}

/// True when `candidate` supervises none of the other candidates.
fn is_leaf(candidate: &User, candidates: &[&User]) -> bool {
    let supervised: HashSet<String> = candidate.sub_groups.iter().map(|g| normalize(g)).collect();
    candidates
        .iter()
        .filter(|other| !std::ptr::eq(**other, candidate))
        .filter_map(|other| other.title())
        .all(|title| !supervised.contains(&normalize(title)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccessRole, DashboardId, GlobalRole};

    fn director(id: &str, title: &str, subs: &[&str], boards: &[&str]) -> User {
        User {
            id: id.to_string(),
            client_id: Some("c1".to_string()),
            global_role: GlobalRole::Director,
            director_title: Some(title.to_string()),
            sub_groups: subs.iter().map(|s| s.to_string()).collect(),
            dashboard_access: boards
                .iter()
                .map(|b| (b.to_string(), AccessRole::Viewer))
                .collect(),
        }
    }

    fn board(id: i64, group: &str) -> Dashboard {
        Dashboard {
            id: DashboardId::Real(id),
            original_id: None,
            title: format!("Board {}", id),
            group: group.to_string(),
            area: None,
            client_id: Some("c1".to_string()),
            year: Some(2025),
            order_number: id,
            items: vec![],
            thresholds: None,
            is_aggregate: false,
            is_hierarchy_root: None,
            navigation_parent: None,
            owner_id: None,
        }
    }

    fn users() -> Vec<User> {
        vec![
            director("u2", "Gerencia Regional", &["Dirección Sur", "Dirección Norte"], &["10", "11"]),
            director("u1", "Dirección Sur", &[], &["10"]),
            director("u3", "Dirección Norte", &[], &[]),
        ]
    }

    #[test]
    fn test_leaf_director_wins_over_supervisor() {
        let users = users();
        let viewer = Viewer::default();
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        assert_eq!(resolver.resolve_group(&board(10, "")), "Dirección Sur");
        assert_eq!(resolver.resolve_group(&board(11, "")), "Gerencia Regional");
    }

    #[test]
    fn test_group_field_matches_official_label() {
        let users = users();
        let viewer = Viewer::default();
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        assert_eq!(resolver.resolve_group(&board(12, "  direccion NORTE")), "Dirección Norte");
        assert_eq!(resolver.resolve_group(&board(13, "Marketing")), "GENERAL");
        assert_eq!(resolver.resolve_group(&board(14, "")), "GENERAL");
    }

    #[test]
    fn test_implicit_owner_is_not_a_candidate() {
        let users = users();
        let viewer = Viewer::default();
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        let mut owned = board(10, "Dirección Norte");
        owned.owner_id = Some("u1".to_string());
        // u2 still holds a grant and is the only remaining candidate.
        assert_eq!(resolver.resolve_group(&owned), "Gerencia Regional");
    }

    #[test]
    fn test_legacy_id_grant_counts() {
        let users = users();
        let viewer = Viewer::default();
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        let mut migrated = board(500, "");
        migrated.original_id = Some(DashboardId::Real(11));
        assert_eq!(resolver.resolve_group(&migrated), "Gerencia Regional");
    }

    #[test]
    fn test_mutual_supervision_falls_back_to_lowest_user_id() {
        let users = vec![
            director("b", "Beta", &["Alfa"], &["20"]),
            director("a", "Alfa", &["Beta"], &["20"]),
        ];
        let viewer = Viewer::default();
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        assert_eq!(resolver.resolve_group(&board(20, "")), "Alfa");
    }

    #[test]
    fn test_resolution_ignores_user_order() {
        let forward = users();
        let mut backward = users();
        backward.reverse();
        let viewer = Viewer::default();
        let a = HierarchyResolver::new(&forward, &viewer, "GENERAL");
        let b = HierarchyResolver::new(&backward, &viewer, "GENERAL");
        for id in [10, 11, 12, 13] {
            let d = board(id, "direccion norte");
            assert_eq!(a.resolve_group(&d), b.resolve_group(&d));
        }
        let keys_a: Vec<&str> = a.official_groups().iter().map(|(k, _)| k).collect();
        let keys_b: Vec<&str> = b.official_groups().iter().map(|(k, _)| k).collect();
        assert_eq!(keys_a, keys_b);
    }

    #[test]
    fn test_viewer_director_claims_orphan_board() {
        let users = users();
        let viewer = Viewer {
            user: director("u9", "Dirección Este", &[], &["30"]),
            selected_client_id: None,
        };
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        // The viewer is also a director with a grant, so step 1 already picks them.
        assert_eq!(resolver.resolve_group(&board(30, "GENERAL")), "Dirección Este");

        let mut own = board(30, "general");
        own.owner_id = Some("u9".to_string());
        assert_eq!(resolver.resolve_group(&own), "Dirección Este");

        // A grouped board is not an orphan.
        let mut grouped = board(30, "Dirección Norte");
        grouped.owner_id = Some("u9".to_string());
        assert_eq!(resolver.resolve_group(&grouped), "Dirección Norte");
    }

    #[test]
    fn test_super_director_viewer_uses_sub_group_spelling() {
        let users = users();
        let viewer = Viewer {
            user: director("u2", "Gerencia Regional", &["Sur", "DIRECCIÓN NORTE"], &["10", "11"]),
            selected_client_id: None,
        };
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        assert_eq!(resolver.resolve_group(&board(10, "")), "Sur");
        assert_eq!(resolver.resolve_group(&board(12, "direccion norte")), "DIRECCIÓN NORTE");
        // Own title stays put: it contains none of the sub-groups.
        assert_eq!(resolver.resolve_group(&board(11, "")), "Gerencia Regional");
        assert_eq!(resolver.resolve_group(&board(13, "Marketing")), "GENERAL");
    }

    #[test]
    fn test_super_director_own_title_containing_sub_group_is_relabeled() {
        let users = users();
        let viewer = Viewer {
            user: director("u9", "Gerencia Sur", &["Sur"], &["40"]),
            selected_client_id: None,
        };
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        assert_eq!(resolver.resolve_group(&board(40, "")), "Sur");
    }

    #[test]
    fn test_id_less_directors_resolve_independent_of_order() {
        let forward = vec![
            director("", "Sur", &[], &["1"]),
            director("", "Norte", &[], &["1"]),
        ];
        let mut backward = forward.clone();
        backward.reverse();
        let viewer = Viewer::default();
        let a = HierarchyResolver::new(&forward, &viewer, "GENERAL");
        let b = HierarchyResolver::new(&backward, &viewer, "GENERAL");

        assert_eq!(a.resolve_group(&board(1, "")), "Norte");
        assert_eq!(b.resolve_group(&board(1, "")), "Norte");
        assert_eq!(a.directors().len(), 2);
        let keys_a: Vec<&str> = a.official_groups().iter().map(|(k, _)| k).collect();
        let keys_b: Vec<&str> = b.official_groups().iter().map(|(k, _)| k).collect();
        assert_eq!(keys_a, keys_b);
    }

    #[test]
    fn test_duplicate_user_records_collapse() {
        let users = vec![
            director("u1", "Sur", &[], &["1"]),
            director("u1", "Sur", &[], &["1"]),
            director("", "Norte", &[], &[]),
            director("", "Norte", &[], &[]),
        ];
        let viewer = Viewer {
            user: director("u1", "Sur", &[], &["1"]),
            selected_client_id: None,
        };
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        assert_eq!(resolver.directors().len(), 2);
    }

    #[test]
    fn test_relabel_returns_new_boards() {
        let users = users();
        let viewer = Viewer::default();
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        let input = vec![board(10, "x"), board(12, "dirección norte")];
        let out = resolver.relabel(&input);
        assert_eq!(input[0].group, "x");
        assert_eq!(out[0].group, "Dirección Sur");
        assert_eq!(out[1].group, "Dirección Norte");
        assert_eq!(out[1].id, input[1].id);
    }

    #[test]
    fn test_director_lookup_helpers() {
        let users = users();
        let viewer = Viewer::default();
        let resolver = HierarchyResolver::new(&users, &viewer, "GENERAL");
        assert_eq!(resolver.director_for_group("DIRECCION SUR").map(|u| u.id.as_str()), Some("u1"));
        assert_eq!(resolver.supervisor_of("dirección norte").map(|u| u.id.as_str()), Some("u2"));
        assert!(resolver.supervisor_of("Gerencia Regional").is_none());
        assert_eq!(resolver.official_groups().len(), 3);
    }
}
