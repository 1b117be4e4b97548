//! Stage-6 classification into the bounded recommendation set.
//!
//! Classification is a pure function of the scored analysis. The two
//! terminal outcomes, OVERPRICED and INSUFFICIENT_DATA, are decided first
//! and are not subject to the ranking of the four banded recommendations;
//! confidence caps apply only to the banded set and only ever downgrade.

mod audit;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use audit::{AuditTrail, ClassifiedOpportunity, ENGINE_VERSION, analysis_notes};

use crate::scoring::ScoredAsset;
use crate::valuation::ConfidenceCap;

/// Final recommendation for an opportunity.
///
/// The Deal Engine's public output is always one of these six values; there
/// is no "unknown" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// BMV at least 15% with a strong composite score.
    Strong,
    /// BMV at least 8% with a solid composite score.
    Moderate,
    /// BMV at least 3% with a fair composite score.
    Weak,
    /// Not worth pursuing.
    Avoid,
    /// Asking price exceeds the estimated market value.
    Overpriced,
    /// No comparable evidence at any fallback level.
    InsufficientData,
}

impl Recommendation {
    /// Position in the banded ordering STRONG > MODERATE > WEAK > AVOID.
    ///
    /// Terminal outcomes return `None`; they are outside the ordering.
    #[must_use]
    pub const fn band_rank(self) -> Option<u8> {
        match self {
            Self::Strong => Some(3),
            Self::Moderate => Some(2),
            Self::Weak => Some(1),
            Self::Avoid => Some(0),
            Self::Overpriced | Self::InsufficientData => None,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strong => write!(f, "STRONG"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::Weak => write!(f, "WEAK"),
            Self::Avoid => write!(f, "AVOID"),
            Self::Overpriced => write!(f, "OVERPRICED"),
            Self::InsufficientData => write!(f, "INSUFFICIENT_DATA"),
        }
    }
}

/// Classifies a scored asset, applying the confidence cap.
///
/// Returns the final recommendation and the reason string naming the branch
/// that fired and any cap that downgraded it.
#[must_use]
pub fn classify(scored: &ScoredAsset) -> (Recommendation, String) {
    let market = &scored.gated.market;

    if market.comps_used == 0 {
        return (
            Recommendation::InsufficientData,
            "INSUFFICIENT_DATA: no comparable evidence at any fallback level".to_string(),
        );
    }
    if market.bmv_percent < 0.0 {
        return (
            Recommendation::Overpriced,
            format!(
                "OVERPRICED: asking exceeds EMV by {:.2}%",
                market.bmv_percent.abs()
            ),
        );
    }

    let bmv = market.bmv_percent;
    let overall = scored.scores.overall_score;
    let base = if bmv >= 15.0 && overall >= 70.0 {
        Recommendation::Strong
    } else if bmv >= 8.0 && overall >= 50.0 {
        Recommendation::Moderate
    } else if bmv >= 3.0 && overall >= 30.0 {
        Recommendation::Weak
    } else {
        Recommendation::Avoid
    };
    let base_reason = format!("{base}: BMV {bmv:.2}% with overall score {overall:.1}");

    let Some(cap) = scored.gated.recommendation_cap else {
        return (base, base_reason);
    };

    let (capped, cap_reason) = match cap {
        // comps_used == 0 was handled above; unreachable here but total.
        ConfidenceCap::InsufficientData => (
            Recommendation::InsufficientData,
            "no comparable evidence".to_string(),
        ),
        ConfidenceCap::Weak => (Recommendation::Weak, "cap: WEAK (<3 comps)".to_string()),
        ConfidenceCap::Moderate => (
            Recommendation::Moderate,
            "LOW confidence cap".to_string(),
        ),
    };

    // min(base, cap) in the banded ordering; a cap never upgrades.
    let downgrade = match (base.band_rank(), capped.band_rank()) {
        (Some(b), Some(c)) => b > c,
        _ => capped == Recommendation::InsufficientData,
    };
    if downgrade {
        (capped, format!("{base}\u{2192}{capped}: {cap_reason}"))
    } else {
        (base, base_reason)
    }
}
