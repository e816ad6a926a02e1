use serde::{Deserialize, Serialize};

/// Scores at or above this value are high risk.
pub const HIGH_THRESHOLD: u32 = 60;
/// Scores at or above this value (and below [`HIGH_THRESHOLD`]) are medium risk.
pub const MEDIUM_THRESHOLD: u32 = 30;

/// Three-tier threat label shared by the applicant and officer scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThreatTier {
    Low,
    Medium,
    High,
}

impl ThreatTier {
    pub const fn from_score(total_score: u32) -> Self {
        if total_score >= HIGH_THRESHOLD {
            ThreatTier::High
        } else if total_score >= MEDIUM_THRESHOLD {
            ThreatTier::Medium
        } else {
            ThreatTier::Low
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ThreatTier::Low => "Low",
            ThreatTier::Medium => "Medium",
            ThreatTier::High => "High",
        }
    }
}
