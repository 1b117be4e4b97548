//! Stage-5 deterministic scoring and ranking.
//!
//! The scoring surface sees only asset facts and the gated analysis: the
//! [`ScoringInput`] type has no field for source metadata, so a
//! source-specific scoring adjustment cannot be written without changing
//! this module's types. All component scores are pure functions; ranking is
//! a stable sort with a fully specified comparator.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::valuation::{Confidence, ConfidenceGatedAnalysis};

/// Weight of the BMV component in the overall score.
pub const WEIGHT_BMV: f64 = 0.50;

/// Weight of the urgency component.
pub const WEIGHT_URGENCY: f64 = 0.20;

/// Weight of the location component.
pub const WEIGHT_LOCATION: f64 = 0.15;

/// Weight of the value component.
pub const WEIGHT_VALUE: f64 = 0.15;

/// Neutral location score while location intelligence is reserved.
const LOCATION_SCORE_DEFAULT: f64 = 50.0;

/// Everything scoring is allowed to see.
///
/// Constructed from a validated asset and its gated analysis; source
/// metadata is structurally absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringInput {
    /// Below-market percentage from the market analysis.
    pub bmv_percent: f64,

    /// Confidence assigned by the gate.
    pub confidence: Confidence,

    /// Days the listing has been on the market.
    pub days_on_market: u32,

    /// Asking price in GBP (used only as a ranking tie-break).
    pub asking_price: i64,
}

impl ScoringInput {
    /// Builds the scoring surface from the pipeline stages that precede it.
    #[must_use]
    pub fn new(
        days_on_market: u32,
        asking_price: i64,
        gated: &ConfidenceGatedAnalysis,
    ) -> Self {
        Self {
            bmv_percent: gated.market.bmv_percent,
            confidence: gated.confidence,
            days_on_market,
            asking_price,
        }
    }
}

/// The four component scores and their weighted composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    /// Below-market-value score, 0..=100.
    pub bmv_score: f64,

    /// Urgency score from time on market, 0..=100.
    pub urgency_score: f64,

    /// Location score. Reserved; currently the neutral default.
    pub location_score: f64,

    /// Target-tier value score, 0..=100.
    pub value_score: f64,

    /// Weighted composite, 0..=100.
    pub overall_score: f64,
}

/// Computes all component scores for an input.
#[must_use]
pub fn score(input: &ScoringInput, target_bmv_percent: f64) -> ComponentScores {
    let bmv_score = bmv_score(input.bmv_percent, input.confidence);
    let urgency_score = urgency_score(input.days_on_market);
    let location_score = LOCATION_SCORE_DEFAULT;
    let value_score = value_score(input.bmv_percent, target_bmv_percent);
    let overall_score = WEIGHT_BMV * bmv_score
        + WEIGHT_URGENCY * urgency_score
        + WEIGHT_LOCATION * location_score
        + WEIGHT_VALUE * value_score;

    ComponentScores {
        bmv_score,
        urgency_score,
        location_score,
        value_score,
        overall_score,
    }
}

/// Piecewise BMV score with confidence modifier.
///
/// Base bands (half-open intervals):
///
/// | bmv%      | base                          |
/// |-----------|-------------------------------|
/// | <= 0      | 0                             |
/// | (0, 5)    | bmv × 5                       |
/// | [5, 10)   | 25 + (bmv − 5) × 5            |
/// | [10, 20)  | 50 + (bmv − 10) × 3           |
/// | >= 20     | min(80 + (bmv − 20) × 2, 100) |
///
/// Modifier: HIGH ×1.0, MEDIUM ×0.85, LOW ×0.70.
#[must_use]
pub fn bmv_score(bmv_percent: f64, confidence: Confidence) -> f64 {
    let base = if bmv_percent <= 0.0 {
        0.0
    } else if bmv_percent < 5.0 {
        bmv_percent * 5.0
    } else if bmv_percent < 10.0 {
        25.0 + (bmv_percent - 5.0) * 5.0
    } else if bmv_percent < 20.0 {
        50.0 + (bmv_percent - 10.0) * 3.0
    } else {
        (80.0 + (bmv_percent - 20.0) * 2.0).min(100.0)
    };

    let modifier = match confidence {
        Confidence::High => 1.0,
        Confidence::Medium => 0.85,
        Confidence::Low => 0.70,
    };
    base * modifier
}

/// Urgency score from days on market.
///
/// | days      | score                          |
/// |-----------|--------------------------------|
/// | < 30      | days × 20/30                   |
/// | [30, 60)  | 20 + (days − 30) × 20/30       |
/// | [60, 90)  | 40 + (days − 60)               |
/// | >= 90     | min(70 + (days − 90)/3, 100)   |
#[must_use]
pub fn urgency_score(days_on_market: u32) -> f64 {
    let days = f64::from(days_on_market);
    if days < 30.0 {
        days * 20.0 / 30.0
    } else if days < 60.0 {
        20.0 + (days - 30.0) * 20.0 / 30.0
    } else if days < 90.0 {
        40.0 + (days - 60.0)
    } else {
        (70.0 + (days - 90.0) / 3.0).min(100.0)
    }
}

/// Value score: how well the deal hits the configured target BMV tier.
///
/// Full marks territory starts at the target; half-target deals score in a
/// middle band; anything positive scores proportionally below that.
#[must_use]
pub fn value_score(bmv_percent: f64, target_bmv_percent: f64) -> f64 {
    if target_bmv_percent <= 0.0 {
        return 0.0;
    }
    if bmv_percent >= target_bmv_percent {
        (70.0 + (bmv_percent - target_bmv_percent) * 3.0).min(100.0)
    } else if bmv_percent >= target_bmv_percent / 2.0 {
        30.0 + (bmv_percent / target_bmv_percent) * 40.0
    } else if bmv_percent > 0.0 {
        (bmv_percent / (target_bmv_percent / 2.0)) * 30.0
    } else {
        0.0
    }
}

/// A scored asset awaiting classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAsset {
    /// The gated analysis the scores were computed from.
    pub gated: ConfidenceGatedAnalysis,

    /// Component and composite scores.
    pub scores: ComponentScores,

    /// 1-indexed rank after sorting; single-asset runs rank 1.
    pub rank: u32,
}

/// Ranking comparator: overall DESC, then bmv% DESC, then asking price ASC.
///
/// Uses total ordering on the floats so the sort is deterministic; combined
/// with a stable sort, equal keys preserve insertion order.
#[must_use]
pub fn ranking_order(a: &(ComponentScores, ScoringInput), b: &(ComponentScores, ScoringInput)) -> Ordering {
    b.0.overall_score
        .total_cmp(&a.0.overall_score)
        .then_with(|| b.1.bmv_percent.total_cmp(&a.1.bmv_percent))
        .then_with(|| a.1.asking_price.cmp(&b.1.asking_price))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bmv_bands_and_boundaries() {
        assert_eq!(bmv_score(-5.0, Confidence::High), 0.0);
        assert_eq!(bmv_score(0.0, Confidence::High), 0.0);
        assert!((bmv_score(2.0, Confidence::High) - 10.0).abs() < 1e-9);
        assert!((bmv_score(5.0, Confidence::High) - 25.0).abs() < 1e-9);
        assert!((bmv_score(7.0, Confidence::High) - 35.0).abs() < 1e-9);
        assert!((bmv_score(10.0, Confidence::High) - 50.0).abs() < 1e-9);
        assert!((bmv_score(17.241_379, Confidence::High) - 71.724_137).abs() < 1e-3);
        // The [10, 20) band meets the >= 20 band exactly at 80.
        assert!((bmv_score(19.999_999, Confidence::High) - 80.0).abs() < 1e-3);
        assert!((bmv_score(20.0, Confidence::High) - 80.0).abs() < 1e-9);
        assert_eq!(bmv_score(40.0, Confidence::High), 100.0);
    }

    #[test]
    fn confidence_modifier_applied() {
        assert!((bmv_score(10.0, Confidence::Medium) - 42.5).abs() < 1e-9);
        assert!((bmv_score(10.0, Confidence::Low) - 35.0).abs() < 1e-9);
    }

    #[test]
    fn urgency_bands() {
        assert_eq!(urgency_score(0), 0.0);
        assert!((urgency_score(15) - 10.0).abs() < 1e-9);
        assert!((urgency_score(30) - 20.0).abs() < 1e-9);
        assert!((urgency_score(45) - 30.0).abs() < 1e-9);
        assert!((urgency_score(60) - 40.0).abs() < 1e-9);
        assert!((urgency_score(75) - 55.0).abs() < 1e-9);
        assert!((urgency_score(90) - 70.0).abs() < 1e-9);
        assert!((urgency_score(120) - 80.0).abs() < 1e-9);
        assert_eq!(urgency_score(500), 100.0);
    }

    #[test]
    fn value_score_tiers() {
        // At or above target.
        assert!((value_score(15.0, 15.0) - 70.0).abs() < 1e-9);
        assert!((value_score(20.0, 15.0) - 85.0).abs() < 1e-9);
        assert_eq!(value_score(40.0, 15.0), 100.0);
        // Between half-target and target.
        assert!((value_score(10.0, 15.0) - (30.0 + 10.0 / 15.0 * 40.0)).abs() < 1e-9);
        // Below half-target.
        assert!((value_score(3.0, 15.0) - (3.0 / 7.5 * 30.0)).abs() < 1e-9);
        assert_eq!(value_score(0.0, 15.0), 0.0);
        assert_eq!(value_score(-5.0, 15.0), 0.0);
    }

    #[test]
    fn overall_is_the_documented_weighting() {
        let input = ScoringInput {
            bmv_percent: 17.241_379,
            confidence: Confidence::High,
            days_on_market: 60,
            asking_price: 300_000,
        };
        let scores = score(&input, 15.0);
        let expected = 0.5 * scores.bmv_score
            + 0.2 * scores.urgency_score
            + 0.15 * scores.location_score
            + 0.15 * scores.value_score;
        assert!((scores.overall_score - expected).abs() < 1e-9);
        assert_eq!(scores.location_score, 50.0);
        assert!((scores.urgency_score - 40.0).abs() < 1e-9);
    }

    #[test]
    fn ranking_comparator_orders_and_tie_breaks() {
        let make = |overall: f64, bmv: f64, asking: i64| {
            (
                ComponentScores {
                    bmv_score: 0.0,
                    urgency_score: 0.0,
                    location_score: 50.0,
                    value_score: 0.0,
                    overall_score: overall,
                },
                ScoringInput {
                    bmv_percent: bmv,
                    confidence: Confidence::High,
                    days_on_market: 0,
                    asking_price: asking,
                },
            )
        };
        // Higher overall first.
        assert_eq!(ranking_order(&make(60.0, 5.0, 100), &make(50.0, 9.0, 100)), Ordering::Less);
        // Equal overall: higher bmv first.
        assert_eq!(ranking_order(&make(60.0, 9.0, 100), &make(60.0, 5.0, 100)), Ordering::Less);
        // Equal overall and bmv: lower asking price first.
        assert_eq!(ranking_order(&make(60.0, 5.0, 100), &make(60.0, 5.0, 200)), Ordering::Less);
        // Fully equal keys compare equal, so a stable sort preserves order.
        assert_eq!(ranking_order(&make(60.0, 5.0, 100), &make(60.0, 5.0, 100)), Ordering::Equal);
    }
}
