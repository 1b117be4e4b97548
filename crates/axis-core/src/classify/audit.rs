//! The audit trail attached to every classified opportunity.
//!
//! Every stage of the pipeline leaves its provenance here: what was
//! ingested, how it validated, which comps were used, what the market
//! analysis concluded, how confidence gated it, every component score, and
//! the final classification with its reason. Two runs over identical inputs
//! produce identical audit trails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Recommendation;
use crate::schema::ValidatedAsset;
use crate::scoring::ComponentScores;
use crate::valuation::{Confidence, MarketAnalysis};

/// Version stamp recorded on every audit trail.
pub const ENGINE_VERSION: &str = "1.1.0";

/// Complete provenance for one classified opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    /// When the asset was ingested (its validation stamp).
    pub ingested_at: DateTime<Utc>,

    /// Validation outcome. Always `"validated"` for records that reached
    /// the pipeline; rejected records never get this far.
    pub validation_outcome: String,

    /// Validation errors, empty for validated records.
    pub validation_errors: Vec<String>,

    /// Number of comps used in the valuation.
    pub comps_used: u32,

    /// Transaction ids of the comps.
    pub comp_ids: Vec<String>,

    /// Raw prices of the comps.
    pub comp_prices: Vec<i64>,

    /// Radius the comps were drawn from, in miles.
    pub comp_radius_miles: f64,

    /// Date window the comps were drawn from, in months.
    pub comp_date_range_months: u32,

    /// Fallback level that produced the comps.
    pub fallback_level: u8,

    /// Estimated market value.
    pub emv: f64,

    /// Confidence rating.
    pub confidence: Confidence,

    /// Why that confidence was assigned.
    pub confidence_reason: String,

    /// Description of the cap that was applied, if any.
    pub cap_applied: Option<String>,

    /// BMV component score.
    pub bmv_score: f64,

    /// Urgency component score.
    pub urgency_score: f64,

    /// Location component score.
    pub location_score: f64,

    /// Value component score.
    pub value_score: f64,

    /// Weighted composite score.
    pub overall_score: f64,

    /// Final recommendation.
    pub recommendation: Recommendation,

    /// Which classification branch fired and any downgrade.
    pub classification_reason: String,

    /// Analyst-facing commentary generated from the analysis.
    pub notes: Vec<String>,

    /// Engine version that produced this record.
    pub engine_version: String,

    /// When the pipeline processed this asset.
    pub processing_timestamp: DateTime<Utc>,
}

/// The pipeline's final output: a fully scored, classified, and audited
/// opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedOpportunity {
    /// The validated asset the pipeline ran on.
    pub asset: ValidatedAsset,

    /// The market analysis.
    pub market: MarketAnalysis,

    /// Confidence rating.
    pub confidence: Confidence,

    /// Component and composite scores.
    pub scores: ComponentScores,

    /// 1-indexed rank within the evaluated batch.
    pub rank: u32,

    /// Final recommendation.
    pub recommendation: Recommendation,

    /// Which classification branch fired and any downgrade.
    pub classification_reason: String,

    /// Full provenance.
    pub audit: AuditTrail,
}

/// Builds the analyst commentary for an opportunity.
///
/// Informational only: nothing downstream reads these strings.
#[must_use]
pub fn analysis_notes(
    market: &MarketAnalysis,
    confidence: Confidence,
    days_on_market: u32,
) -> Vec<String> {
    let mut notes = Vec::new();
    let bmv = market.bmv_percent;
    if market.comps_used > 0 {
        if bmv >= 15.0 {
            notes.push(format!("Strong BMV: {bmv:.1}% below comparable sales"));
        } else if bmv >= 8.0 {
            notes.push(format!("Good BMV: {bmv:.1}% below comparable sales"));
        } else if bmv >= 3.0 {
            notes.push(format!("Marginal BMV: {bmv:.1}% below comparable sales"));
        } else if bmv < 0.0 {
            notes.push(format!(
                "Overpriced by {:.1}% vs comparable sales",
                bmv.abs()
            ));
        }
    }
    match confidence {
        Confidence::High => notes.push(format!("High confidence ({} comps)", market.comps_used)),
        Confidence::Medium => {
            notes.push(format!("Medium confidence ({} comps)", market.comps_used));
        }
        Confidence::Low => notes.push(format!(
            "Low confidence, limited comparable data ({} comps)",
            market.comps_used
        )),
    }
    if days_on_market >= 90 {
        notes.push(format!(
            "Long time on market ({days_on_market} days), motivated seller likely"
        ));
    } else if days_on_market <= 7 {
        notes.push("New listing, may have competition".to_string());
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(comps: u32, bmv: f64) -> MarketAnalysis {
        MarketAnalysis {
            emv: 300_000.0,
            bmv_percent: bmv,
            comps_used: comps,
            comp_ids: Vec::new(),
            comp_prices: Vec::new(),
            comp_radius_miles: 0.5,
            comp_date_range_months: 12,
            fallback_level: 1,
        }
    }

    #[test]
    fn notes_reflect_bmv_band_and_confidence() {
        let notes = analysis_notes(&market(6, 17.2), Confidence::High, 60);
        assert!(notes.iter().any(|n| n.starts_with("Strong BMV")));
        assert!(notes.iter().any(|n| n.contains("High confidence (6 comps)")));
    }

    #[test]
    fn stale_listings_flag_motivated_seller() {
        let notes = analysis_notes(&market(3, 5.0), Confidence::Medium, 120);
        assert!(notes.iter().any(|n| n.contains("motivated seller")));
    }

    #[test]
    fn zero_comps_generate_no_bmv_note() {
        let notes = analysis_notes(&market(0, 0.0), Confidence::Low, 30);
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("0 comps"));
    }
}
