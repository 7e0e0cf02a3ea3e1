use serde::{Deserialize, Serialize};

/// Portfolio alert kinds, in fixed priority order (lower fires first in the
/// feed).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    UrgentExpiry,
    ComplianceOverage,
    ReclaimOpportunity,
    HighValueOptimization,
}

impl AlertKind {
    pub fn priority(self) -> u8 {
        match self {
            Self::UrgentExpiry => 1,
            Self::ComplianceOverage => 2,
            Self::ReclaimOpportunity => 3,
            Self::HighValueOptimization => 4,
        }
    }
}
