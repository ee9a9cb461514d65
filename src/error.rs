//! Error types for the roll-up engine
//!
//! The scoring and aggregation functions are total and never fail. Errors
//! only surface at the edges:
//! - Structural: a record breaks a shape contract (e.g. monthly arrays not 12 long)
//! - Input: config or snapshot files that cannot be read or parsed

use thiserror::Error;

/// Error types for loading and validating roll-up inputs
#[derive(Debug, Error)]
pub enum EngineError {
    // Structural contract violations
    #[error("Dashboard {dashboard}, indicator '{indicator}': {field} has {found} slots, expected {expected}")]
    ShapeMismatch {
        dashboard: String,
        indicator: String,
        field: &'static str,
        expected: usize,
        found: usize,
    },

    // Input errors
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl EngineError {
    /// Returns true if this error describes a malformed record rather than
    /// an unreadable input.
    pub fn is_structural(&self) -> bool {
        matches!(self, EngineError::ShapeMismatch { .. })
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EngineError::ShapeMismatch { .. } => {
                "Re-save the indicator so its monthly arrays have 12 entries."
            }
            EngineError::ConfigurationError(_) => {
                "Check your configuration in ~/.kpi-rollup/config.json"
            }
            EngineError::ParseError(_) => "Check the file is valid JSON in the snapshot format.",
            EngineError::InvalidDate(_) => "Use a YYYY-MM-DD date.",
            EngineError::IoError(_) => "Check the file path and permissions.",
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::ParseError(err.to_string())
    }
}
