//! Stage-4 confidence gating.
//!
//! Confidence reflects only the quality of the comparable evidence: how
//! many comps, how recent, how close. The gate also derives the
//! recommendation cap the classifier must honour; caps can only ever
//! downgrade a recommendation.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::market::MarketAnalysis;

/// Confidence in a valuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// At least five comps within 12 months and 0.5 miles.
    High,
    /// At least three comps within 18 months and 1.0 miles.
    Medium,
    /// Anything weaker.
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "HIGH"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::Low => write!(f, "LOW"),
        }
    }
}

/// Cap on the final recommendation, derived from evidence quality.
///
/// Caps are monotonic: they may only downgrade the classifier's base
/// recommendation, never upgrade it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceCap {
    /// Low confidence: recommendation cannot exceed MODERATE.
    Moderate,
    /// Fewer than three comps: recommendation cannot exceed WEAK.
    Weak,
    /// Zero comps: the outcome is fixed to INSUFFICIENT_DATA.
    InsufficientData,
}

/// A market analysis with its confidence rating and recommendation cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceGatedAnalysis {
    /// The underlying market analysis.
    pub market: MarketAnalysis,

    /// Confidence in the valuation.
    pub confidence: Confidence,

    /// Why that confidence was assigned.
    pub confidence_reason: String,

    /// Cap the classifier must apply, if any.
    pub recommendation_cap: Option<ConfidenceCap>,
}

/// Minimum comp count for an uncapped recommendation.
const MIN_COMPS_ACCEPTABLE: u32 = 3;

/// Comp count required for high confidence.
const MIN_COMPS_TARGET: u32 = 5;

/// Assigns confidence and derives the recommendation cap.
#[must_use]
pub fn gate(market: MarketAnalysis) -> ConfidenceGatedAnalysis {
    let comps = market.comps_used;
    let months = market.comp_date_range_months;
    let radius = market.comp_radius_miles;

    let (confidence, confidence_reason) =
        if comps >= MIN_COMPS_TARGET && months <= 12 && radius <= 0.5 {
            (
                Confidence::High,
                format!("{comps} comps within {radius} mi and {months} months"),
            )
        } else if comps >= MIN_COMPS_ACCEPTABLE && months <= 18 && radius <= 1.0 {
            (
                Confidence::Medium,
                format!("{comps} comps within {radius} mi and {months} months"),
            )
        } else {
            (
                Confidence::Low,
                format!("limited comparable evidence ({comps} comps at fallback level {})",
                    market.fallback_level),
            )
        };

    // The strictest applicable cap wins; the classifier treats
    // InsufficientData < Weak < Moderate.
    let recommendation_cap = if comps == 0 {
        Some(ConfidenceCap::InsufficientData)
    } else if comps < MIN_COMPS_ACCEPTABLE {
        Some(ConfidenceCap::Weak)
    } else if confidence == Confidence::Low {
        Some(ConfidenceCap::Moderate)
    } else {
        None
    };

    ConfidenceGatedAnalysis {
        market,
        confidence,
        confidence_reason,
        recommendation_cap,
    }
}
