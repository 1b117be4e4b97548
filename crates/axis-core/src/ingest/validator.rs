//! Stage-2 structural validation.
//!
//! Applies the field-presence and range rules to a [`RawListing`], in a
//! fixed order, and produces either an immutable
//! [`ValidatedAsset`](crate::schema::ValidatedAsset) or a
//! [`RejectionRecord`] with a stable code. The first failing rule rejects;
//! later rules are not evaluated.
//!
//! Rule order:
//!
//! 1. required field presence
//! 2. UK postcode format
//! 3. property type in the synonym table
//! 4. tenure in the synonym table
//! 5. asking price at or above the minimum
//! 6. asking price at or below the maximum
//! 7. listing date not in the future
//! 8. listing date not stale
//!
//! Optional fields that fail their own range checks are dropped to `None`
//! rather than rejecting the record.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use super::adapter::RawListing;
use super::{standard_property_type_map, standard_tenure_map};
use crate::schema::{
    ListingStatus, PropertyType, RejectionCode, RejectionRecord, SourceMetadata, Tenure,
    ValidatedAsset, generate_asset_id, normalise_uk_postcode, validate_uk_postcode,
    ASSET_SCHEMA_VERSION,
};

/// Minimum accepted asking price in GBP.
pub const MIN_ASKING_PRICE: i64 = 10_000;

/// Maximum accepted asking price in GBP.
pub const MAX_ASKING_PRICE: i64 = 50_000_000;

/// Maximum listing age in days before a listing is considered stale.
pub const MAX_LISTING_AGE_DAYS: i64 = 365;

/// Stage-2 structural validator.
///
/// Holds the reference date all age calculations are made against, plus the
/// synonym tables of the adapter whose records it validates. A fixed
/// validation timestamp can be injected for deterministic output.
#[derive(Debug, Clone)]
pub struct StructuralValidator {
    reference_date: NaiveDate,
    validated_at: Option<DateTime<Utc>>,
    property_type_map: HashMap<String, PropertyType>,
    tenure_map: HashMap<String, Tenure>,
}

impl StructuralValidator {
    /// Creates a validator with the shared synonym tables.
    #[must_use]
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            reference_date,
            validated_at: None,
            property_type_map: standard_property_type_map(),
            tenure_map: standard_tenure_map(),
        }
    }

    /// Replaces the synonym tables with adapter-specific ones.
    #[must_use]
    pub fn with_maps(
        mut self,
        property_type_map: HashMap<String, PropertyType>,
        tenure_map: HashMap<String, Tenure>,
    ) -> Self {
        self.property_type_map = property_type_map;
        self.tenure_map = tenure_map;
        self
    }

    /// Pins the `validated_at` stamp instead of reading the clock, making
    /// repeated validation byte-identical.
    #[must_use]
    pub fn with_timestamp(mut self, validated_at: DateTime<Utc>) -> Self {
        self.validated_at = Some(validated_at);
        self
    }

    /// Validates a raw listing into a [`ValidatedAsset`].
    ///
    /// # Errors
    ///
    /// Returns a [`RejectionRecord`] naming the first rule that failed.
    pub fn validate(&self, raw: &RawListing) -> Result<ValidatedAsset, Box<RejectionRecord>> {
        let address = self.required_text(raw, raw.address.as_deref(), "address")?;
        let raw_postcode = self.required_text(raw, raw.postcode.as_deref(), "postcode")?;
        // City falls back to the locality before presence is enforced.
        let city_value = raw
            .city
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(raw.area.as_deref().filter(|s| !s.trim().is_empty()));
        let city = self.required_text(raw, city_value, "city")?;
        let raw_type = self.required_text(raw, raw.property_type.as_deref(), "property_type")?;
        let raw_tenure = self.required_text(raw, raw.tenure.as_deref(), "tenure")?;
        let asking_price = raw
            .asking_price
            .ok_or_else(|| self.reject_missing(raw, "asking_price"))?;
        let listing_date = raw
            .listing_date
            .ok_or_else(|| self.reject_missing(raw, "listing_date"))?;
        let listing_url = self.required_text(raw, raw.listing_url.as_deref(), "listing_url")?;

        if !validate_uk_postcode(&raw_postcode) {
            return Err(self.reject(
                raw,
                RejectionCode::InvalidPostcode,
                format!("postcode format validation failed: {raw_postcode}"),
            ));
        }
        let postcode = normalise_uk_postcode(&raw_postcode);

        let type_key = raw_type.to_lowercase();
        let Some(property_type) = self.property_type_map.get(type_key.trim()).copied() else {
            return Err(self.reject(
                raw,
                RejectionCode::UnmappedPropertyType,
                format!("property type could not be normalised: {raw_type}"),
            ));
        };

        let tenure_key = raw_tenure.to_lowercase();
        let Some(tenure) = self.tenure_map.get(tenure_key.trim()).copied() else {
            return Err(self.reject(
                raw,
                RejectionCode::UnmappedTenure,
                format!("tenure could not be normalised: {raw_tenure}"),
            ));
        };

        if asking_price < MIN_ASKING_PRICE {
            return Err(self.reject(
                raw,
                RejectionCode::PriceBelowThreshold,
                format!("asking price {asking_price} below minimum {MIN_ASKING_PRICE}"),
            ));
        }
        if asking_price > MAX_ASKING_PRICE {
            return Err(self.reject(
                raw,
                RejectionCode::PriceAboveThreshold,
                format!("asking price {asking_price} above maximum {MAX_ASKING_PRICE}"),
            ));
        }

        if listing_date > self.reference_date {
            return Err(self.reject(
                raw,
                RejectionCode::FutureListingDate,
                format!("listing date {listing_date} is in the future"),
            ));
        }
        let age_days = (self.reference_date - listing_date).num_days();
        if age_days > MAX_LISTING_AGE_DAYS {
            return Err(self.reject(
                raw,
                RejectionCode::StaleListing,
                format!("listing date {listing_date} is {age_days} days old"),
            ));
        }

        let asset = ValidatedAsset {
            asset_id: generate_asset_id(&raw.source_id, &raw.source_listing_id, listing_date),
            address,
            postcode,
            city,
            area: raw.area.clone().filter(|s| !s.trim().is_empty()),
            property_type,
            tenure,
            asking_price,
            price_qualifier: raw.price_qualifier.clone(),
            listing_status: ListingStatus::Active,
            listing_date,
            days_on_market: u32::try_from(age_days).unwrap_or(0),
            bedrooms: clamp_count(raw.bedrooms),
            bathrooms: clamp_count(raw.bathrooms),
            square_feet: raw
                .square_feet
                .filter(|v| *v > 0)
                .and_then(|v| u32::try_from(v).ok()),
            plot_acres: raw.plot_acres.filter(|v| *v > 0.0),
            latitude: valid_coordinate(raw.latitude, 90.0),
            longitude: valid_coordinate(raw.longitude, 180.0),
            source: SourceMetadata {
                source_id: raw.source_id.clone(),
                source_name: raw.source_name.clone(),
                source_listing_id: raw.source_listing_id.clone(),
                source_url: listing_url,
                source_category: raw.source_category,
                auction_date: raw.auction_date,
                lot_number: raw.lot_number.clone(),
                receiver_name: raw.receiver_name.clone(),
                insolvency_type: raw.insolvency_type.clone(),
                scraped_at: self.validated_at,
            },
            validated_at: self.validated_at.unwrap_or_else(Utc::now),
            schema_version: ASSET_SCHEMA_VERSION.to_string(),
        };
        debug!(asset_id = %asset.asset_id, source = %raw.source_id, "listing validated");
        Ok(asset)
    }

    fn reject(
        &self,
        raw: &RawListing,
        code: RejectionCode,
        reason: String,
    ) -> Box<RejectionRecord> {
        warn!(
            source = %raw.source_id,
            listing = %raw.source_listing_id,
            code = %code,
            "listing rejected"
        );
        Box::new(RejectionRecord::new(
            raw.source_id.clone(),
            raw.source_listing_id.clone(),
            code,
            reason,
            &raw.canonical_bytes(),
        ))
    }

    fn reject_missing(&self, raw: &RawListing, field: &str) -> Box<RejectionRecord> {
        self.reject(
            raw,
            RejectionCode::MissingRequiredField,
            format!("required field '{field}' not provided"),
        )
    }

    fn required_text(
        &self,
        raw: &RawListing,
        value: Option<&str>,
        field: &str,
    ) -> Result<String, Box<RejectionRecord>> {
        match value {
            Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(self.reject_missing(raw, field)),
        }
    }
}

fn clamp_count(value: Option<i64>) -> Option<u8> {
    value.filter(|v| *v >= 0).and_then(|v| u8::try_from(v).ok())
}

fn valid_coordinate(value: Option<f64>, bound: f64) -> Option<f64> {
    value.filter(|v| v.is_finite() && v.abs() <= bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn complete_raw() -> RawListing {
        RawListing {
            source_id: "auction_house_london".to_string(),
            source_name: "Auction House London".to_string(),
            source_listing_id: "LOT-7".to_string(),
            address: Some("14 Priory Road".to_string()),
            postcode: Some("n8 7ex".to_string()),
            city: Some("London".to_string()),
            property_type: Some("Terraced House".to_string()),
            tenure: Some("Freehold".to_string()),
            asking_price: Some(450_000),
            listing_date: NaiveDate::from_ymd_opt(2026, 4, 2),
            listing_url: Some("https://example.org/lot-7".to_string()),
            ..RawListing::default()
        }
    }

    #[test]
    fn complete_listing_validates() {
        let validator = StructuralValidator::new(reference());
        let asset = validator.validate(&complete_raw()).unwrap();
        assert_eq!(asset.postcode, "N8 7EX");
        assert_eq!(asset.property_type, PropertyType::Terraced);
        assert_eq!(asset.tenure, Tenure::Freehold);
        assert_eq!(asset.days_on_market, 60);
        assert_eq!(asset.schema_version, ASSET_SCHEMA_VERSION);
    }

    #[test]
    fn missing_required_field_rejects_first() {
        let mut raw = complete_raw();
        raw.address = None;
        raw.postcode = Some("not a postcode".to_string());
        let err = StructuralValidator::new(reference()).validate(&raw).unwrap_err();
        // Presence is checked before format.
        assert_eq!(err.rejection_code, RejectionCode::MissingRequiredField);
        assert!(err.reason.contains("address"));
    }

    #[test]
    fn city_falls_back_to_area() {
        let mut raw = complete_raw();
        raw.city = None;
        raw.area = Some("Crouch End".to_string());
        let asset = StructuralValidator::new(reference()).validate(&raw).unwrap();
        assert_eq!(asset.city, "Crouch End");
    }

    #[test]
    fn invalid_postcode_rejected() {
        let mut raw = complete_raw();
        raw.postcode = Some("12345".to_string());
        let err = StructuralValidator::new(reference()).validate(&raw).unwrap_err();
        assert_eq!(err.rejection_code, RejectionCode::InvalidPostcode);
    }

    #[test]
    fn unmapped_property_type_rejected_not_substituted() {
        let mut raw = complete_raw();
        raw.property_type = Some("Houseboat".to_string());
        let err = StructuralValidator::new(reference()).validate(&raw).unwrap_err();
        assert_eq!(err.rejection_code, RejectionCode::UnmappedPropertyType);
    }

    #[test]
    fn unmapped_tenure_rejected() {
        let mut raw = complete_raw();
        raw.tenure = Some("Shared Ownership".to_string());
        let err = StructuralValidator::new(reference()).validate(&raw).unwrap_err();
        assert_eq!(err.rejection_code, RejectionCode::UnmappedTenure);
    }

    #[test]
    fn share_of_freehold_maps_to_freehold() {
        let mut raw = complete_raw();
        raw.tenure = Some("Share of Freehold".to_string());
        let asset = StructuralValidator::new(reference()).validate(&raw).unwrap();
        assert_eq!(asset.tenure, Tenure::Freehold);
    }

    #[test]
    fn price_thresholds_enforced() {
        let mut low = complete_raw();
        low.asking_price = Some(9_999);
        let err = StructuralValidator::new(reference()).validate(&low).unwrap_err();
        assert_eq!(err.rejection_code, RejectionCode::PriceBelowThreshold);

        let mut high = complete_raw();
        high.asking_price = Some(50_000_001);
        let err = StructuralValidator::new(reference()).validate(&high).unwrap_err();
        assert_eq!(err.rejection_code, RejectionCode::PriceAboveThreshold);
    }

    #[test]
    fn date_rules_enforced() {
        let mut future = complete_raw();
        future.listing_date = NaiveDate::from_ymd_opt(2026, 6, 2);
        let err = StructuralValidator::new(reference()).validate(&future).unwrap_err();
        assert_eq!(err.rejection_code, RejectionCode::FutureListingDate);

        let mut stale = complete_raw();
        stale.listing_date = NaiveDate::from_ymd_opt(2025, 5, 1);
        let err = StructuralValidator::new(reference()).validate(&stale).unwrap_err();
        assert_eq!(err.rejection_code, RejectionCode::StaleListing);
    }

    #[test]
    fn invalid_optional_fields_dropped_not_rejected() {
        let mut raw = complete_raw();
        raw.bedrooms = Some(-2);
        raw.latitude = Some(120.0);
        raw.longitude = Some(-0.12);
        let asset = StructuralValidator::new(reference()).validate(&raw).unwrap();
        assert_eq!(asset.bedrooms, None);
        assert_eq!(asset.latitude, None);
        assert_eq!(asset.longitude, Some(-0.12));
    }

    #[test]
    fn validation_is_idempotent_with_pinned_timestamp() {
        let stamp = DateTime::parse_from_rfc3339("2026-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let validator = StructuralValidator::new(reference()).with_timestamp(stamp);
        let first = validator.validate(&complete_raw()).unwrap();
        let second = validator.validate(&complete_raw()).unwrap();
        assert_eq!(first, second);
    }
}
