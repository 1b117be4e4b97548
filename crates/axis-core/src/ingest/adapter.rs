//! The source adapter contract.
//!
//! Adapters fetch raw records from a source and own the synonym tables that
//! map source-specific property-type and tenure strings onto the closed
//! enums. An unmapped value causes rejection downstream; adapters never
//! substitute a "close enough" variant, and a raw record has no field that
//! could carry a source-supplied estimated value.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::SourceRegistration;
use crate::schema::{PropertyType, SourceCategory, Tenure};

/// Boxed future type used by adapter methods, keeping the trait object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from fetching raw records out of a source.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The source could not be reached. Non-recoverable for this batch.
    #[error("source unreachable: {detail}")]
    Unreachable {
        /// Transport-level detail.
        detail: String,
    },

    /// The source responded with something the adapter could not parse.
    #[error("malformed source response: {detail}")]
    MalformedResponse {
        /// Parse-level detail.
        detail: String,
    },
}

/// A raw listing as fetched from a source, before any validation.
///
/// Every substantive field is optional: presence is checked by the
/// structural validator, not by the adapter. There is deliberately no field
/// for a source-supplied estimated value: if a source provides one, the
/// adapter has nowhere to put it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    /// Registered source identifier.
    pub source_id: String,

    /// Human-readable source name.
    pub source_name: String,

    /// The listing's identifier within the source.
    pub source_listing_id: String,

    /// Source classification.
    #[serde(default)]
    pub source_category: SourceCategory,

    /// Street address.
    pub address: Option<String>,

    /// Postcode, unnormalised.
    pub postcode: Option<String>,

    /// City or town.
    pub city: Option<String>,

    /// Area or locality. Used as a city fallback when city is absent.
    pub area: Option<String>,

    /// Raw property type string.
    pub property_type: Option<String>,

    /// Raw tenure string.
    pub tenure: Option<String>,

    /// Asking price in whole GBP.
    pub asking_price: Option<i64>,

    /// Pricing qualifier such as "guide price".
    pub price_qualifier: Option<String>,

    /// Bedrooms.
    pub bedrooms: Option<i64>,

    /// Bathrooms.
    pub bathrooms: Option<i64>,

    /// Internal floor area in square feet.
    pub square_feet: Option<i64>,

    /// Plot size in acres.
    pub plot_acres: Option<f64>,

    /// Latitude in decimal degrees.
    pub latitude: Option<f64>,

    /// Longitude in decimal degrees.
    pub longitude: Option<f64>,

    /// Date the listing went live.
    pub listing_date: Option<NaiveDate>,

    /// URL of the original listing.
    pub listing_url: Option<String>,

    /// Auction date, for auction sources.
    pub auction_date: Option<NaiveDate>,

    /// Auction lot number, for auction sources.
    pub lot_number: Option<String>,

    /// Receiver name, for receivership sources.
    pub receiver_name: Option<String>,

    /// Insolvency classification, for receivership sources.
    pub insolvency_type: Option<String>,
}

impl RawListing {
    /// Canonical byte serialisation used for rejection hashing.
    ///
    /// Struct field order is fixed, so the serialisation is deterministic.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Contract every data source integration implements.
///
/// Fetch methods return boxed futures so the trait stays object-safe and
/// adapters can be held as `Box<dyn SourceAdapter>` in a registry. Network
/// adapters may block on I/O inside the future; the [`super::Ingestor`]
/// applies the configured timeout around each call.
pub trait SourceAdapter: Send + Sync {
    /// The source's registration record.
    fn registration(&self) -> &SourceRegistration;

    /// Fetches raw listings, optionally restricted to records modified
    /// after `since`.
    fn fetch_raw(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> BoxFuture<'_, Result<Vec<RawListing>, FetchError>>;

    /// Fetches a single raw listing by its source-specific id.
    fn fetch_raw_single(
        &self,
        source_listing_id: &str,
    ) -> BoxFuture<'_, Result<Option<RawListing>, FetchError>>;

    /// Property-type synonym table for this source.
    ///
    /// Defaults to the shared table; adapters override to extend it with
    /// source-specific vocabulary.
    fn property_type_map(&self) -> HashMap<String, PropertyType> {
        standard_property_type_map()
    }

    /// Tenure synonym table for this source.
    fn tenure_map(&self) -> HashMap<String, Tenure> {
        standard_tenure_map()
    }
}

/// Shared property-type synonym table.
///
/// Keys are lowercase. Lookups are case-insensitive by normalising the input
/// before the lookup; anything not in the table rejects the listing.
#[must_use]
pub fn standard_property_type_map() -> HashMap<String, PropertyType> {
    let entries: [(&str, PropertyType); 26] = [
        ("flat", PropertyType::Flat),
        ("apartment", PropertyType::Flat),
        ("studio", PropertyType::Flat),
        ("studio flat", PropertyType::Flat),
        ("studio apartment", PropertyType::Flat),
        ("penthouse", PropertyType::Flat),
        ("ground floor flat", PropertyType::Flat),
        ("upper floor flat", PropertyType::Flat),
        ("maisonette", PropertyType::Maisonette),
        ("terraced", PropertyType::Terraced),
        ("terrace", PropertyType::Terraced),
        ("terraced house", PropertyType::Terraced),
        ("end terrace", PropertyType::Terraced),
        ("end of terrace", PropertyType::Terraced),
        ("mid terrace", PropertyType::Terraced),
        ("mid-terrace", PropertyType::Terraced),
        ("town house", PropertyType::Terraced),
        ("townhouse", PropertyType::Terraced),
        ("semi-detached", PropertyType::SemiDetached),
        ("semi detached", PropertyType::SemiDetached),
        ("semi", PropertyType::SemiDetached),
        ("semi-detached house", PropertyType::SemiDetached),
        ("detached", PropertyType::Detached),
        ("detached house", PropertyType::Detached),
        ("bungalow", PropertyType::Detached),
        ("cottage", PropertyType::Detached),
    ];
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Shared tenure synonym table.
#[must_use]
pub fn standard_tenure_map() -> HashMap<String, Tenure> {
    let entries: [(&str, Tenure); 5] = [
        ("freehold", Tenure::Freehold),
        ("share of freehold", Tenure::Freehold),
        ("share freehold", Tenure::Freehold),
        ("leasehold", Tenure::Leasehold),
        ("long leasehold", Tenure::Leasehold),
    ];
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
