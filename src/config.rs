use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::scoring::DEFAULT_PERCENTAGE_CAP;
use crate::types::ComplianceThresholds;

/// Engine configuration stored in ~/.kpi-rollup/config.json
///
/// Every field is optional; a missing file yields the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Thresholds used when neither the indicator nor the dashboard overrides them.
    #[serde(default)]
    pub default_thresholds: ComplianceThresholds,
    /// Per-indicator ceiling applied before weighting.
    #[serde(default = "default_percentage_cap")]
    pub percentage_cap: f64,
    /// Group for boards that match no official label.
    #[serde(default = "default_fallback_group")]
    pub fallback_group: String,
    /// Title of the admin-wide global aggregate.
    #[serde(default = "default_global_title")]
    pub global_aggregate_title: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_thresholds: ComplianceThresholds::default(),
            percentage_cap: default_percentage_cap(),
            fallback_group: default_fallback_group(),
            global_aggregate_title: default_global_title(),
        }
    }
}

fn default_percentage_cap() -> f64 {
    DEFAULT_PERCENTAGE_CAP
}

fn default_fallback_group() -> String {
    "GENERAL".to_string()
}

fn default_global_title() -> String {
    "TOTAL GLOBAL".to_string()
}

/// Path of the user-level config file.
pub fn config_path() -> Result<PathBuf, EngineError> {
    let home = dirs::home_dir()
        .ok_or_else(|| EngineError::ConfigurationError("Could not find home directory".into()))?;
    Ok(home.join(".kpi-rollup").join("config.json"))
}

/// Load the user-level config, falling back to defaults when absent.
pub fn load_config() -> Result<EngineConfig, EngineError> {
    let path = config_path()?;
    if !path.exists() {
        log::debug!("No config at {}; using defaults", path.display());
        return Ok(EngineConfig::default());
    }
    load_config_from(&path)
}

/// Load and validate a config file at an explicit path.
pub fn load_config_from(path: &Path) -> Result<EngineConfig, EngineError> {
    let content = fs::read_to_string(path).map_err(|e| {
        EngineError::ConfigurationError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let config: EngineConfig = serde_json::from_str(&content).map_err(|e| {
        EngineError::ConfigurationError(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject values the engine cannot work with. Inverted thresholds are only
/// logged: they are applied literally.
pub fn validate_config(config: &EngineConfig) -> Result<(), EngineError> {
    if !config.percentage_cap.is_finite() || config.percentage_cap <= 0.0 {
        return Err(EngineError::ConfigurationError(format!(
            "percentageCap must be a positive number, got {}",
            config.percentage_cap
        )));
    }
    if config.fallback_group.trim().is_empty() {
        return Err(EngineError::ConfigurationError(
            "fallbackGroup must not be blank".into(),
        ));
    }
    if config.default_thresholds.is_inverted() {
        log::warn!(
            "defaultThresholds are inverted (onTrack {} < atRisk {}); statuses will follow them literally",
            config.default_thresholds.on_track,
            config.default_thresholds.at_risk
        );
    }
    Ok(())
}
