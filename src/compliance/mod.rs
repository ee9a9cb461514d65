//! Per-indicator compliance.
//!
//! `period` folds weekly records into monthly buckets; `calculator` turns a
//! monthly series into a percentage and a traffic-light status. Both are pure
//! functions of the indicator and a [`ComplianceContext`] carrying the single
//! "now" captured for the computation pass.

pub mod calculator;
pub mod period;

use chrono::{Datelike, NaiveDate};

use crate::error::EngineError;
use crate::types::{ComplianceMode, MONTHS};

pub use calculator::{compute_compliance, percentage, status_for, ComplianceResult, ComplianceStatus};
pub use period::to_monthly;

/// Zero-based month of `now` when `year` is the running year.
pub fn current_month_index(year: i32, now: NaiveDate) -> Option<usize> {
    (now.year() == year).then(|| now.month0() as usize)
}

/// Parse a `YYYY-MM-DD` reference date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| EngineError::InvalidDate(format!("'{}': {}", raw, e)))
}

/// Where the target year sits relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearPosition {
    Past,
    Current,
    Future,
}

/// Year, mode, and the injected "now" shared by every calculation in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceContext {
    pub year: i32,
    pub mode: ComplianceMode,
    pub now: NaiveDate,
}

impl ComplianceContext {
    pub fn new(year: i32, mode: ComplianceMode, now: NaiveDate) -> Self {
        Self { year, mode, now }
    }

    pub fn position(&self) -> YearPosition {
        match self.year.cmp(&self.now.year()) {
            std::cmp::Ordering::Less => YearPosition::Past,
            std::cmp::Ordering::Equal => YearPosition::Current,
            std::cmp::Ordering::Greater => YearPosition::Future,
        }
    }

    /// Zero-based month of "now".
    pub fn current_month(&self) -> usize {
        self.now.month0() as usize
    }

    /// Last month a dashboard trend should show for this mode.
    ///
    /// Past years show all twelve months; future years show nothing. For the
    /// current year, `realTime` includes the running month and `definitive`
    /// stops at the last closed one.
    pub fn trend_limit(&self) -> Option<usize> {
        match self.position() {
            YearPosition::Past => Some(MONTHS - 1),
            YearPosition::Future => None,
            YearPosition::Current => match self.mode {
                ComplianceMode::RealTime => Some(self.current_month()),
                ComplianceMode::Definitive => self.current_month().checked_sub(1),
            },
        }
    }
}
