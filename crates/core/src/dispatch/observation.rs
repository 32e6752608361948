//! Observation text derived from the vision subsystem's hazard stats.
//!
//! The dispatch agent treats observations as opaque strings; this module is
//! how callers turn a stats record into one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stats record returned by the vision server for one frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HazardStats {
    pub hazard_type: String,
    /// Share of the frame covered by hazard masks, 0-100
    pub coverage_pct: f64,
    pub mask_count: u32,
    /// Classifier confidence, 0-1
    #[serde(default)]
    pub hazard_confidence: Option<f64>,
}

/// Severity bucket derived from coverage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Minor,
    Moderate,
    Critical,
}

impl Severity {
    /// Above 40% coverage is critical, above 15% moderate
    pub fn from_coverage(coverage_pct: f64) -> Self {
        if coverage_pct > 40.0 {
            Self::Critical
        } else if coverage_pct > 15.0 {
            Self::Moderate
        } else {
            Self::Minor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "MINOR",
            Self::Moderate => "MODERATE",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HazardStats {
    pub fn severity(&self) -> Severity {
        Severity::from_coverage(self.coverage_pct)
    }
}

/// Render stats as the observation line fed to the commander
pub fn describe(stats: &HazardStats) -> String {
    format!(
        "Visual Scan: {}. Coverage: {}%. Severity: {}. Active Masks: {}.",
        stats.hazard_type.to_uppercase(),
        stats.coverage_pct,
        stats.severity(),
        stats.mask_count
    )
}
