//! The Deal Engine: orchestration of stages 3 through 6.
//!
//! Each asset flows through comparable selection, market analysis, the
//! confidence gate, scoring, and classification independently of its peers;
//! batch evaluation then ranks the whole set with the stable comparator.
//! Given the same assets, comps, configuration, and clock, the engine
//! produces byte-identical output; nothing in the pipeline reads ambient
//! state or unordered container iteration order.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

use crate::classify::{AuditTrail, ClassifiedOpportunity, ENGINE_VERSION, analysis_notes, classify};
use crate::comps::{CompSelection, ComparableStore, PostcodeGazetteer, select_comps};
use crate::config::EngineConfig;
use crate::schema::ValidatedAsset;
use crate::scoring::{ComponentScores, ScoredAsset, ScoringInput, ranking_order, score};
use crate::valuation::{ConfidenceCap, ConfidenceGatedAnalysis, analyse, gate};

/// The deterministic evaluation engine.
pub struct DealEngine {
    config: EngineConfig,
    reference_date: NaiveDate,
    processed_at: DateTime<Utc>,
}

impl DealEngine {
    /// Creates an engine against today's date and the current clock.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let now = Utc::now();
        Self {
            config,
            reference_date: now.date_naive(),
            processed_at: now,
        }
    }

    /// Creates an engine with a pinned reference date and processing stamp.
    ///
    /// Identical inputs evaluated by two engines built with the same pins
    /// produce byte-identical output.
    #[must_use]
    pub fn with_clock(
        config: EngineConfig,
        reference_date: NaiveDate,
        processed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            reference_date,
            processed_at,
        }
    }

    /// The reference date all comp-age arithmetic uses.
    #[must_use]
    pub const fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    /// Evaluates a single asset against a pre-selected set of comps.
    ///
    /// The opportunity is ranked 1; batch ranking only applies across
    /// [`Self::evaluate_batch`].
    #[must_use]
    pub fn evaluate(
        &self,
        asset: &ValidatedAsset,
        selection: &CompSelection,
    ) -> ClassifiedOpportunity {
        let staged = self.run_stages(asset, selection);
        self.finish(asset, staged, 1)
    }

    /// Evaluates a batch of assets, selecting comps for each from the store,
    /// and returns the opportunities ranked best-first.
    ///
    /// Assets are independent; a rejected or insufficient asset never stops
    /// its peers. The sort is stable: equal-keyed assets keep input order.
    #[must_use]
    pub fn evaluate_batch(
        &self,
        assets: &[ValidatedAsset],
        store: &ComparableStore,
        gazetteer: &PostcodeGazetteer,
    ) -> Vec<ClassifiedOpportunity> {
        let mut staged: Vec<(&ValidatedAsset, Staged)> = assets
            .iter()
            .map(|asset| {
                let selection = select_comps(store, gazetteer, asset, self.reference_date);
                (asset, self.run_stages(asset, &selection))
            })
            .collect();

        staged.sort_by(|a, b| {
            ranking_order(&(a.1.scores, a.1.input), &(b.1.scores, b.1.input))
        });

        let ranked: Vec<ClassifiedOpportunity> = staged
            .into_iter()
            .enumerate()
            .map(|(index, (asset, staged))| {
                #[allow(clippy::cast_possible_truncation)]
                let rank = (index + 1) as u32;
                self.finish(asset, staged, rank)
            })
            .collect();
        info!(
            evaluated = ranked.len(),
            reference_date = %self.reference_date,
            "batch evaluation complete"
        );
        ranked
    }

    fn run_stages(&self, asset: &ValidatedAsset, selection: &CompSelection) -> Staged {
        let market = analyse(selection, asset.asking_price);
        let gated = gate(market);
        let input = ScoringInput::new(asset.days_on_market, asset.asking_price, &gated);
        let scores = score(&input, self.config.target_bmv_percent);
        Staged {
            gated,
            input,
            scores,
        }
    }

    fn finish(
        &self,
        asset: &ValidatedAsset,
        staged: Staged,
        rank: u32,
    ) -> ClassifiedOpportunity {
        let Staged {
            gated,
            input,
            scores,
        } = staged;
        let scored = ScoredAsset {
            gated,
            scores,
            rank,
        };
        let (recommendation, classification_reason) = classify(&scored);
        let gated = scored.gated;

        let cap_applied = gated.recommendation_cap.map(|cap| {
            match cap {
                ConfidenceCap::Moderate => "MODERATE (LOW confidence)".to_string(),
                ConfidenceCap::Weak => "WEAK (<3 comps)".to_string(),
                ConfidenceCap::InsufficientData => "INSUFFICIENT_DATA (0 comps)".to_string(),
            }
        });
        let notes = analysis_notes(&gated.market, gated.confidence, input.days_on_market);

        let audit = AuditTrail {
            ingested_at: asset.validated_at,
            validation_outcome: "validated".to_string(),
            validation_errors: Vec::new(),
            comps_used: gated.market.comps_used,
            comp_ids: gated.market.comp_ids.clone(),
            comp_prices: gated.market.comp_prices.clone(),
            comp_radius_miles: gated.market.comp_radius_miles,
            comp_date_range_months: gated.market.comp_date_range_months,
            fallback_level: gated.market.fallback_level,
            emv: gated.market.emv,
            confidence: gated.confidence,
            confidence_reason: gated.confidence_reason.clone(),
            cap_applied,
            bmv_score: scores.bmv_score,
            urgency_score: scores.urgency_score,
            location_score: scores.location_score,
            value_score: scores.value_score,
            overall_score: scores.overall_score,
            recommendation,
            classification_reason: classification_reason.clone(),
            notes,
            engine_version: ENGINE_VERSION.to_string(),
            processing_timestamp: self.processed_at,
        };

        ClassifiedOpportunity {
            asset: asset.clone(),
            market: gated.market.clone(),
            confidence: gated.confidence,
            scores,
            rank,
            recommendation,
            classification_reason,
            audit,
        }
    }
}

struct Staged {
    gated: ConfidenceGatedAnalysis,
    input: ScoringInput,
    scores: ComponentScores,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::comps::ComparableSale;
    use crate::schema::{
        ASSET_SCHEMA_VERSION, ListingStatus, PropertyType, SourceCategory, SourceMetadata, Tenure,
    };

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn engine() -> DealEngine {
        DealEngine::with_clock(
            EngineConfig::default(),
            reference(),
            Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
        )
    }

    fn asset(id: &str, asking_price: i64, days_on_market: u32) -> ValidatedAsset {
        ValidatedAsset {
            asset_id: id.to_string(),
            address: "14 Priory Road".to_string(),
            postcode: "N8 7EX".to_string(),
            city: "London".to_string(),
            area: None,
            property_type: PropertyType::Terraced,
            tenure: Tenure::Freehold,
            asking_price,
            price_qualifier: None,
            listing_status: ListingStatus::Active,
            listing_date: reference() - chrono::Duration::days(i64::from(days_on_market)),
            days_on_market,
            bedrooms: Some(3),
            bathrooms: Some(1),
            square_feet: None,
            plot_acres: None,
            latitude: Some(51.583),
            longitude: Some(-0.121),
            source: SourceMetadata {
                source_id: "mock_source".to_string(),
                source_name: "Mock Source".to_string(),
                source_listing_id: id.to_string(),
                source_url: format!("https://example.org/{id}"),
                source_category: SourceCategory::Other,
                auction_date: None,
                lot_number: None,
                receiver_name: None,
                insolvency_type: None,
                scraped_at: None,
            },
            validated_at: Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap(),
            schema_version: ASSET_SCHEMA_VERSION.to_string(),
        }
    }

    fn comp(id: &str, price: i64) -> ComparableSale {
        ComparableSale {
            transaction_id: id.to_string(),
            postcode: "N8 7EX".to_string(),
            latitude: 51.583,
            longitude: -0.121,
            price,
            sale_date: reference() - chrono::Duration::days(90),
            property_type: PropertyType::Terraced,
            tenure: Tenure::Freehold,
            new_build: false,
        }
    }

    fn selection(prices: &[i64]) -> CompSelection {
        CompSelection {
            comps: prices
                .iter()
                .enumerate()
                .map(|(i, p)| comp(&format!("t{i}"), *p))
                .collect(),
            radius_miles: 0.3,
            window_months: 10,
            fallback_level: 1,
        }
    }

    #[test]
    fn pipeline_is_deterministic() {
        let subject = asset("a1", 300_000, 60);
        let sel = selection(&[305_000, 340_000, 360_000, 365_000, 380_000, 420_000]);
        let first = engine().evaluate(&subject, &sel);
        let second = engine().evaluate(&subject, &sel);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn audit_trail_carries_full_provenance() {
        let subject = asset("a1", 300_000, 60);
        let sel = selection(&[305_000, 340_000, 360_000, 365_000, 380_000, 420_000]);
        let result = engine().evaluate(&subject, &sel);
        assert_eq!(result.audit.engine_version, "1.1.0");
        assert_eq!(result.audit.comps_used, 6);
        assert_eq!(result.audit.comp_ids.len(), 6);
        assert_eq!(result.audit.comp_prices.len(), 6);
        assert_eq!(result.audit.emv, 362_500.0);
        assert_eq!(result.audit.recommendation, result.recommendation);
        assert!(!result.audit.notes.is_empty());
    }

    #[test]
    fn batch_ranking_is_stable_and_one_indexed() {
        let store = ComparableStore::new();
        store.load((0..6).map(|i| comp(&format!("t{i}"), 360_000)));
        let gazetteer = PostcodeGazetteer::new();
        // Identical asking prices and facts: input order must be preserved.
        let assets = vec![
            asset("first", 300_000, 60),
            asset("second", 300_000, 60),
            asset("third", 250_000, 60),
        ];
        let ranked = engine().evaluate_batch(&assets, &store, &gazetteer);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].rank, 1);
        // "third" has the higher BMV and sorts first.
        assert_eq!(ranked[0].asset.asset_id, "third");
        assert_eq!(ranked[1].asset.asset_id, "first");
        assert_eq!(ranked[2].asset.asset_id, "second");
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn metadata_cannot_influence_scores() {
        let sel = selection(&[305_000, 340_000, 360_000, 365_000, 380_000, 420_000]);
        let plain = asset("a1", 300_000, 60);
        let mut rebranded = asset("a1", 300_000, 60);
        rebranded.source.source_id = "different_source".to_string();
        rebranded.source.source_name = "Different Source".to_string();
        rebranded.source.source_category = SourceCategory::Receivership;
        rebranded.source.receiver_name = Some("Receiver LLP".to_string());

        let a = engine().evaluate(&plain, &sel);
        let b = engine().evaluate(&rebranded, &sel);
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.recommendation, b.recommendation);
        assert_eq!(a.rank, b.rank);
    }
}
