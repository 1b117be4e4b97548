//! Stage-3a progressive comparable selection.
//!
//! Candidates that pass the hard filters are narrowed by geodesic distance
//! and sale-date window, widening through a fixed ladder of levels until at
//! least one comp is found. The level that produced the result is recorded;
//! if the ladder is exhausted the selection is empty at the final level and
//! the pipeline later classifies the asset as insufficient data.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::{ComparableSale, ComparableStore, DAYS_PER_MONTH, PostcodeGazetteer};
use crate::schema::ValidatedAsset;

/// The fallback ladder: `(radius in miles, window in months)`, tried in
/// order. The first level yielding at least one comp wins.
pub const FALLBACK_LEVELS: [(f64, u32); 6] = [
    (0.5, 12),
    (1.0, 12),
    (0.5, 18),
    (1.0, 18),
    (1.0, 24),
    (1.5, 24),
];

/// Result of comparable selection for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompSelection {
    /// Selected comps, sorted by `(sale_date DESC, transaction_id ASC)`.
    pub comps: Vec<ComparableSale>,

    /// Radius of the level that produced the result, in miles.
    pub radius_miles: f64,

    /// Date window of the level that produced the result, in months.
    pub window_months: u32,

    /// 1-based index of the level that produced the result. When no level
    /// produced a comp this is the final level with an empty `comps`.
    pub fallback_level: u8,
}

impl CompSelection {
    /// An empty selection at the final fallback level.
    #[must_use]
    pub fn empty() -> Self {
        let (radius_miles, window_months) = FALLBACK_LEVELS[FALLBACK_LEVELS.len() - 1];
        Self {
            comps: Vec::new(),
            radius_miles,
            window_months,
            #[allow(clippy::cast_possible_truncation)]
            fallback_level: FALLBACK_LEVELS.len() as u8,
        }
    }
}

/// Selects comparables for a subject asset.
///
/// Distance is measured from the asset's own coordinates when present,
/// otherwise from the gazetteer centroid of its postcode. A subject with no
/// resolvable coordinates gets an empty selection; the engine never guesses
/// a location.
#[must_use]
pub fn select_comps(
    store: &ComparableStore,
    gazetteer: &PostcodeGazetteer,
    asset: &ValidatedAsset,
    reference_date: NaiveDate,
) -> CompSelection {
    let Some((subject_lat, subject_lon)) = asset
        .coordinates()
        .or_else(|| gazetteer.resolve(&asset.postcode))
    else {
        debug!(asset_id = %asset.asset_id, "no coordinates resolvable, empty selection");
        return CompSelection::empty();
    };

    let candidates = store.candidates(asset.property_type, asset.tenure, reference_date);

    for (index, (radius_miles, window_months)) in FALLBACK_LEVELS.iter().enumerate() {
        let cutoff = reference_date - Duration::days(i64::from(*window_months) * DAYS_PER_MONTH);
        let selected: Vec<ComparableSale> = candidates
            .iter()
            .filter(|c| c.sale_date >= cutoff)
            .filter(|c| {
                haversine_miles(subject_lat, subject_lon, c.latitude, c.longitude)
                    <= *radius_miles
            })
            .cloned()
            .collect();
        if !selected.is_empty() {
            #[allow(clippy::cast_possible_truncation)]
            let fallback_level = (index + 1) as u8;
            debug!(
                asset_id = %asset.asset_id,
                level = fallback_level,
                comps = selected.len(),
                "comparable selection complete"
            );
            return CompSelection {
                comps: selected,
                radius_miles: *radius_miles,
                window_months: *window_months,
                fallback_level,
            };
        }
    }

    debug!(asset_id = %asset.asset_id, "no comps at any fallback level");
    CompSelection::empty()
}

/// Great-circle distance between two points in miles (haversine).
#[must_use]
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_MILES: f64 = 3959.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * a.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::schema::{
        ListingStatus, PropertyType, SourceCategory, SourceMetadata, Tenure, ValidatedAsset,
        ASSET_SCHEMA_VERSION,
    };

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn subject(lat: Option<f64>, lon: Option<f64>) -> ValidatedAsset {
        ValidatedAsset {
            asset_id: "va-20260401-abcdef-01234567".to_string(),
            address: "14 Priory Road".to_string(),
            postcode: "N8 7EX".to_string(),
            city: "London".to_string(),
            area: None,
            property_type: PropertyType::Terraced,
            tenure: Tenure::Freehold,
            asking_price: 450_000,
            price_qualifier: None,
            listing_status: ListingStatus::Active,
            listing_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            days_on_market: 61,
            bedrooms: Some(3),
            bathrooms: Some(1),
            square_feet: None,
            plot_acres: None,
            latitude: lat,
            longitude: lon,
            source: SourceMetadata {
                source_id: "mock_source".to_string(),
                source_name: "Mock Source".to_string(),
                source_listing_id: "L1".to_string(),
                source_url: "https://example.org/1".to_string(),
                source_category: SourceCategory::Other,
                auction_date: None,
                lot_number: None,
                receiver_name: None,
                insolvency_type: None,
                scraped_at: None,
            },
            validated_at: chrono::Utc::now(),
            schema_version: ASSET_SCHEMA_VERSION.to_string(),
        }
    }

    /// ~0.01 degrees latitude is ~0.69 miles.
    fn comp_at(id: &str, lat: f64, months_ago: u32) -> ComparableSale {
        let days = i64::from(months_ago) * 30;
        ComparableSale {
            transaction_id: id.to_string(),
            postcode: "N8 7EX".to_string(),
            latitude: lat,
            longitude: -0.121,
            price: 500_000,
            sale_date: reference() - Duration::days(days),
            property_type: PropertyType::Terraced,
            tenure: Tenure::Freehold,
            new_build: false,
        }
    }

    #[test]
    fn haversine_known_distance() {
        // London to Birmingham is roughly 101 miles.
        let d = haversine_miles(51.5074, -0.1278, 52.4862, -1.8904);
        assert!((d - 101.0).abs() < 2.0, "got {d}");
    }

    #[test]
    fn first_level_wins_when_close_recent_comps_exist() {
        let store = ComparableStore::new();
        store.load([comp_at("t1", 51.583, 2), comp_at("t2", 51.584, 3)]);
        let asset = subject(Some(51.583), Some(-0.121));
        let selection = select_comps(&store, &PostcodeGazetteer::new(), &asset, reference());
        assert_eq!(selection.fallback_level, 1);
        assert_eq!(selection.radius_miles, 0.5);
        assert_eq!(selection.window_months, 12);
        assert_eq!(selection.comps.len(), 2);
    }

    #[test]
    fn older_comps_require_wider_window() {
        let store = ComparableStore::new();
        // 16 months old: outside 12-month windows, inside 18.
        store.load([comp_at("t1", 51.583, 16)]);
        let asset = subject(Some(51.583), Some(-0.121));
        let selection = select_comps(&store, &PostcodeGazetteer::new(), &asset, reference());
        assert_eq!(selection.fallback_level, 3);
        assert_eq!(selection.window_months, 18);
        assert_eq!(selection.comps.len(), 1);
    }

    #[test]
    fn distant_comps_require_wider_radius() {
        let store = ComparableStore::new();
        // ~0.9 miles north: outside 0.5-mile levels, inside 1.0.
        store.load([comp_at("t1", 51.596, 2)]);
        let asset = subject(Some(51.583), Some(-0.121));
        let selection = select_comps(&store, &PostcodeGazetteer::new(), &asset, reference());
        assert_eq!(selection.fallback_level, 2);
        assert_eq!(selection.radius_miles, 1.0);
    }

    #[test]
    fn exhausted_ladder_returns_empty_at_level_six() {
        let store = ComparableStore::new();
        let asset = subject(Some(51.583), Some(-0.121));
        let selection = select_comps(&store, &PostcodeGazetteer::new(), &asset, reference());
        assert!(selection.comps.is_empty());
        assert_eq!(selection.fallback_level, 6);
        assert_eq!(selection.radius_miles, 1.5);
        assert_eq!(selection.window_months, 24);
    }

    #[test]
    fn postcode_centroid_used_when_asset_has_no_coordinates() {
        let store = ComparableStore::new();
        store.load([comp_at("t1", 51.583, 2)]);
        let mut gazetteer = PostcodeGazetteer::new();
        gazetteer.insert_postcode("N8 7EX", 51.583, -0.121);
        let asset = subject(None, None);
        let selection = select_comps(&store, &gazetteer, &asset, reference());
        assert_eq!(selection.fallback_level, 1);
    }

    #[test]
    fn unresolvable_location_yields_empty_selection() {
        let store = ComparableStore::new();
        store.load([comp_at("t1", 51.583, 2)]);
        let asset = subject(None, None);
        let selection = select_comps(&store, &PostcodeGazetteer::new(), &asset, reference());
        assert!(selection.comps.is_empty());
        assert_eq!(selection.fallback_level, 6);
    }
}
