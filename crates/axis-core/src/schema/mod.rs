//! Canonical schema for the Deal Engine.
//!
//! Everything that enters the evaluation pipeline is normalised into the
//! types defined here. Property type and tenure are closed-set enums so that
//! comparable matching is total and can never silently widen; the
//! [`ValidatedAsset`] record deliberately has no field that could carry an
//! estimated value, score, or recommendation; those exist only on pipeline
//! *outputs*.

mod asset;
mod rejection;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use asset::{SourceMetadata, ValidatedAsset, generate_asset_id};
pub use rejection::{RejectionCode, RejectionRecord};

/// Schema version stamped on every [`ValidatedAsset`].
pub const ASSET_SCHEMA_VERSION: &str = "1.0";

/// Normalised property type.
///
/// Exactly five values; exact match only. Source-specific strings are mapped
/// through adapter synonym tables; an unmapped value rejects the listing,
/// it is never coerced to a "close enough" variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// Flat or apartment (includes studios and penthouses).
    Flat,
    /// Maisonette.
    Maisonette,
    /// Terraced house (end, mid, or town house).
    Terraced,
    /// Semi-detached house.
    SemiDetached,
    /// Detached house (includes bungalows and cottages).
    Detached,
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => write!(f, "flat"),
            Self::Maisonette => write!(f, "maisonette"),
            Self::Terraced => write!(f, "terraced"),
            Self::SemiDetached => write!(f, "semi_detached"),
            Self::Detached => write!(f, "detached"),
        }
    }
}

/// Normalised tenure.
///
/// Freehold matches freehold only, leasehold matches leasehold only.
/// Shared-ownership listings are not representable and reject upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tenure {
    /// Freehold (includes share of freehold).
    Freehold,
    /// Leasehold.
    Leasehold,
}

impl fmt::Display for Tenure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Freehold => write!(f, "freehold"),
            Self::Leasehold => write!(f, "leasehold"),
        }
    }
}

/// Current listing status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Actively listed.
    Active,
    /// Under offer.
    UnderOffer,
    /// Sold.
    Sold,
    /// Withdrawn from market.
    Withdrawn,
}

/// Classification of a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    /// Auction house.
    Auction,
    /// Receivership or insolvency feed.
    Receivership,
    /// Distressed-sale channel.
    Distressed,
    /// Anything else.
    #[default]
    Other,
}

// Matches AA9A 9AA, A9A 9AA, A9 9AA, A99 9AA, AA9 9AA, AA99 9AA.
static UK_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z]{1,2}[0-9][A-Z0-9]?\s?[0-9][A-Z]{2}$").expect("postcode regex is valid")
});

/// Returns true if `postcode` is a syntactically valid UK postcode.
///
/// Whitespace is collapsed before matching, so `"sw1a1aa"` and
/// `"SW1A  1AA"` both validate.
#[must_use]
pub fn validate_uk_postcode(postcode: &str) -> bool {
    let collapsed: String = postcode.split_whitespace().collect::<Vec<_>>().join(" ");
    !collapsed.is_empty() && UK_POSTCODE.is_match(&collapsed)
}

/// Normalises a UK postcode to canonical form: uppercase with a single space
/// before the three-character inward code.
#[must_use]
pub fn normalise_uk_postcode(postcode: &str) -> String {
    let clean: String = postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if clean.len() >= 4 {
        let split = clean.len() - 3;
        format!("{} {}", &clean[..split], &clean[split..])
    } else {
        clean
    }
}

/// Extracts the outward district from a normalised postcode
/// (`"SW1A 1AA"` → `"SW1A"`).
#[must_use]
pub fn postcode_district(postcode: &str) -> &str {
    postcode
        .split_whitespace()
        .next()
        .unwrap_or(postcode)
}
