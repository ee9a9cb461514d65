use std::collections::BTreeMap;
use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of monthly slots every normalized indicator carries.
pub const MONTHS: usize = 12;

/// Coerce a nullable, possibly non-finite number to a usable value.
///
/// `None`, NaN and infinities all read as `0.0`.
pub fn finite_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

fn nullable_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

/// `null` reads as the type's default (empty string, empty list, ...).
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_notes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Option<String>>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.into_iter().map(Option::unwrap_or_default).collect())
}

// =============================================================================
// Identifiers
// =============================================================================

/// Dashboard identity, resolved once at ingestion.
///
/// Real boards carry positive integers. Synthetic aggregates carry
/// `agg-`-prefixed strings. Numeric strings on the wire resolve to `Real`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DashboardId {
    Real(i64),
    Aggregate(String),
}

impl DashboardId {
    /// Legacy "no data" sentinel.
    pub const NO_DATA: DashboardId = DashboardId::Real(-1);

    /// Parse a wire string: integers become `Real`, anything else `Aggregate`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(n) => DashboardId::Real(n),
            Err(_) => DashboardId::Aggregate(trimmed.to_string()),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, DashboardId::Aggregate(_))
    }

    pub fn is_no_data(&self) -> bool {
        *self == Self::NO_DATA
    }
}

impl fmt::Display for DashboardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardId::Real(n) => write!(f, "{}", n),
            DashboardId::Aggregate(s) => f.write_str(s),
        }
    }
}

impl Serialize for DashboardId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DashboardId::Real(n) => serializer.serialize_i64(*n),
            DashboardId::Aggregate(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for DashboardId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => DashboardId::Real(n),
            Raw::Float(f) => DashboardId::Real(f.trunc() as i64),
            Raw::Text(s) => DashboardId::parse(&s),
        })
    }
}

/// Indicator identity: numeric for legacy rows, string for newer ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{}", n),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

// =============================================================================
// Indicator
// =============================================================================

/// How monthly values combine into a period total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Accumulative,
    #[default]
    #[serde(other)]
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    #[default]
    #[serde(alias = "max")]
    Maximize,
    #[serde(alias = "min")]
    Minimize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Monthly,
    Weekly,
}

/// First day of the recording week for weekly indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeekStart {
    #[serde(alias = "sun", alias = "sunday", alias = "Sunday")]
    Sun,
    #[default]
    #[serde(alias = "mon", alias = "monday", alias = "Monday")]
    Mon,
}

impl WeekStart {
    pub fn weekday(&self) -> Weekday {
        match self {
            WeekStart::Sun => Weekday::Sun,
            WeekStart::Mon => Weekday::Mon,
        }
    }
}

/// Percentage cut-offs for the traffic-light status.
///
/// `on_track > at_risk` is expected but not enforced; an inverted pair is
/// compared literally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplianceThresholds {
    pub on_track: f64,
    pub at_risk: f64,
}

impl Default for ComplianceThresholds {
    fn default() -> Self {
        Self {
            on_track: 95.0,
            at_risk: 80.0,
        }
    }
}

impl ComplianceThresholds {
    pub fn is_inverted(&self) -> bool {
        self.at_risk > self.on_track
    }
}

/// One KPI tracked within a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicator {
    pub id: ItemId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable_number")]
    pub weight: f64,
    #[serde(rename = "type", default)]
    pub kind: IndicatorKind,
    #[serde(default)]
    pub goal_type: GoalType,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub week_start: WeekStart,
    #[serde(default, deserialize_with = "null_as_default")]
    pub monthly_goals: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub monthly_progress: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "nullable_notes")]
    pub monthly_notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_goals: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_progress: Option<Vec<Option<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ComplianceThresholds>,
}

impl Indicator {
    /// Weight usable as a multiplier: negative or non-finite reads as zero.
    pub fn effective_weight(&self) -> f64 {
        finite_or_zero(Some(self.weight)).max(0.0)
    }

    pub fn lower_is_better(&self) -> bool {
        self.goal_type == GoalType::Minimize
    }

    pub fn is_accumulative(&self) -> bool {
        self.kind == IndicatorKind::Accumulative
    }

    pub fn is_weekly(&self) -> bool {
        self.frequency == Frequency::Weekly
    }

    /// Monthly goal at `month`; missing slots read as zero.
    pub fn goal_at(&self, month: usize) -> f64 {
        finite_or_zero(self.monthly_goals.get(month).copied().flatten())
    }

    /// Monthly progress at `month`; missing slots read as zero.
    pub fn progress_at(&self, month: usize) -> f64 {
        finite_or_zero(self.monthly_progress.get(month).copied().flatten())
    }

    /// Copy with monthly arrays padded or truncated to exactly twelve slots.
    pub fn normalized(&self) -> Indicator {
        let mut out = self.clone();
        out.monthly_goals.resize(MONTHS, None);
        out.monthly_progress.resize(MONTHS, None);
        out.monthly_notes.resize(MONTHS, String::new());
        out
    }
}

// =============================================================================
// Dashboard
// =============================================================================

/// One organizational unit's indicators for a year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: DashboardId,
    /// Id the board had before a migration; access grants may still use it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<DashboardId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default)]
    pub order_number: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<Indicator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ComplianceThresholds>,
    #[serde(default)]
    pub is_aggregate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_hierarchy_root: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_parent: Option<String>,
    /// User id of the board's implicit owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

// =============================================================================
// Users and viewer
// =============================================================================

/// Closed set of global roles. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum GlobalRole {
    Admin,
    Director,
    #[default]
    Member,
}

impl GlobalRole {
    /// Parse from any casing; unknown roles fall back to `Member`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => GlobalRole::Admin,
            "director" => GlobalRole::Director,
            _ => GlobalRole::Member,
        }
    }
}

impl<'de> Deserialize<'de> for GlobalRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(GlobalRole::from_str_lossy(&raw))
    }
}

/// Per-board grant level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    Editor,
    #[default]
    Viewer,
}

impl AccessRole {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "editor" | "edit" | "owner" | "admin" => AccessRole::Editor,
            _ => AccessRole::Viewer,
        }
    }
}

impl<'de> Deserialize<'de> for AccessRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(AccessRole::from_str_lossy(&raw))
    }
}

/// A user as seen by the director hierarchy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, alias = "uid", deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub global_role: GlobalRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub director_title: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sub_groups: Vec<String>,
    /// Explicit grants keyed by the board id as it appears on the wire.
    #[serde(default, deserialize_with = "null_as_default")]
    pub dashboard_access: BTreeMap<String, AccessRole>,
}

impl User {
    /// Director title, if set and non-blank.
    pub fn title(&self) -> Option<&str> {
        self.director_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// A director with an official title.
    pub fn is_director(&self) -> bool {
        self.global_role == GlobalRole::Director && self.title().is_some()
    }

    /// A director who consolidates sub-groups.
    pub fn is_super_director(&self) -> bool {
        self.is_director() && self.sub_groups.iter().any(|g| !g.trim().is_empty())
    }

    /// Whether this user holds an explicit grant for the board (current or legacy id).
    pub fn has_access(&self, dashboard: &Dashboard) -> bool {
        let mut keys = vec![dashboard.id.to_string()];
        if let Some(original) = &dashboard.original_id {
            keys.push(original.to_string());
        }
        keys.iter().any(|k| self.dashboard_access.contains_key(k))
    }
}

/// The user the roll-up is computed for, plus their current selection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    #[serde(default)]
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_client_id: Option<String>,
}

impl Viewer {
    pub fn is_admin(&self) -> bool {
        self.user.global_role == GlobalRole::Admin
    }

    pub fn is_director(&self) -> bool {
        self.user.is_director()
    }

    pub fn is_super_director(&self) -> bool {
        self.user.is_super_director()
    }
}

/// Which periods count toward compliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComplianceMode {
    /// Include the in-progress month when it already has data.
    RealTime,
    /// Closed periods only.
    #[default]
    Definitive,
}
