//! The canonical normalised property record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ListingStatus, PropertyType, SourceCategory, Tenure};

/// Source-specific provenance that never influences scoring.
///
/// These fields are retained for the audit trail only. The scoring surface
/// is constructed from asset facts alone and has no access to this struct,
/// so a source-specific scoring adjustment is unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Registered source identifier (lowercase snake case).
    pub source_id: String,

    /// Human-readable source name.
    pub source_name: String,

    /// The listing's identifier within the source.
    pub source_listing_id: String,

    /// URL of the original listing.
    pub source_url: String,

    /// Source classification.
    pub source_category: SourceCategory,

    /// Auction date, if the source is an auction house.
    pub auction_date: Option<NaiveDate>,

    /// Auction lot number, if any.
    pub lot_number: Option<String>,

    /// Receiver name for receivership listings.
    pub receiver_name: Option<String>,

    /// Insolvency classification for receivership listings.
    pub insolvency_type: Option<String>,

    /// When the source record was fetched.
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Canonical normalised property record: the only schema the Deal Engine
/// pipeline accepts.
///
/// Invariants:
///
/// - `asset_id` is globally unique and immutable.
/// - `property_type` and `tenure` hold exactly one normalised value.
/// - `asking_price` is a positive integer in GBP.
/// - No field can carry an estimated value, BMV percentage, score, or
///   recommendation; those exist only on pipeline outputs.
/// - [`SourceMetadata`] is never read by scoring.
///
/// Construction goes through the structural validator, which enforces the
/// field-presence and range rules before this record exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedAsset {
    /// Globally unique asset identifier.
    pub asset_id: String,

    /// Full street address.
    pub address: String,

    /// Normalised UK postcode.
    pub postcode: String,

    /// City or town.
    pub city: String,

    /// Area or locality within the city, when supplied.
    pub area: Option<String>,

    /// Normalised property type.
    pub property_type: PropertyType,

    /// Normalised tenure.
    pub tenure: Tenure,

    /// Asking price in whole GBP. Always positive.
    pub asking_price: i64,

    /// Pricing qualifier such as "guide price" or "offers over".
    pub price_qualifier: Option<String>,

    /// Current listing status.
    pub listing_status: ListingStatus,

    /// Date the listing went live.
    pub listing_date: NaiveDate,

    /// Days between `listing_date` and the validation reference date.
    pub days_on_market: u32,

    /// Bedrooms, when the source supplies them.
    pub bedrooms: Option<u8>,

    /// Bathrooms, when the source supplies them.
    pub bathrooms: Option<u8>,

    /// Internal floor area in square feet, when supplied.
    pub square_feet: Option<u32>,

    /// Plot size in acres, when supplied.
    pub plot_acres: Option<f64>,

    /// Latitude in decimal degrees, when supplied.
    pub latitude: Option<f64>,

    /// Longitude in decimal degrees, when supplied.
    pub longitude: Option<f64>,

    /// Provenance of the record. Audit only; never read by scoring.
    pub source: SourceMetadata,

    /// When the record passed structural validation.
    pub validated_at: DateTime<Utc>,

    /// Schema version of this record.
    pub schema_version: String,
}

impl ValidatedAsset {
    /// Outward postcode district (`"SW1A 1AA"` → `"SW1A"`).
    #[must_use]
    pub fn postcode_district(&self) -> &str {
        super::postcode_district(&self.postcode)
    }

    /// Coordinates as a pair, when both are present.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Generates a deterministic, globally unique asset identifier.
///
/// Format: `va-{yyyymmdd}-{sha256(source_id)[..6]}-{sha256(source_listing_id)[..8]}`.
/// The same source listing always receives the same id, so re-ingestion is
/// idempotent.
#[must_use]
pub fn generate_asset_id(
    source_id: &str,
    source_listing_id: &str,
    listing_date: NaiveDate,
) -> String {
    let source_hash = short_hex(source_id, 6);
    let listing_hash = short_hex(source_listing_id, 8);
    format!(
        "va-{}-{}-{}",
        listing_date.format("%Y%m%d"),
        source_hash,
        listing_hash
    )
}

fn short_hex(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..len].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_id_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let a = generate_asset_id("auction_house_london", "LOT-42", date);
        let b = generate_asset_id("auction_house_london", "LOT-42", date);
        assert_eq!(a, b);
        assert!(a.starts_with("va-20260314-"));
    }

    #[test]
    fn asset_id_varies_by_listing() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let a = generate_asset_id("auction_house_london", "LOT-42", date);
        let b = generate_asset_id("auction_house_london", "LOT-43", date);
        assert_ne!(a, b);
    }
}
