//! Copyright risk levels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorical copyright risk, ordered by severity
///
/// `Ord` follows declaration order, so `RiskLevel::Low < RiskLevel::VeryHigh`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Wire representation ("LOW", "MEDIUM", "HIGH", "VERY_HIGH")
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::VeryHigh => "VERY_HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
