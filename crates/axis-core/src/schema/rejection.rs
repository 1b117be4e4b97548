//! Rejection records for listings that fail normalisation.
//!
//! Rejections are emitted to a side channel and stored out-of-band; they
//! never appear in pipeline output. Codes are stable UPPER_SNAKE_CASE tokens
//! that collaborator surfaces may render directly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable rejection code for a listing that failed normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionCode {
    /// A required field was absent or empty.
    MissingRequiredField,
    /// The postcode failed UK format validation.
    InvalidPostcode,
    /// The property type string had no entry in the synonym table.
    UnmappedPropertyType,
    /// The tenure string had no entry in the synonym table.
    UnmappedTenure,
    /// Asking price below the minimum threshold.
    PriceBelowThreshold,
    /// Asking price above the maximum threshold.
    PriceAboveThreshold,
    /// Listing date is in the future.
    FutureListingDate,
    /// Listing date is more than the maximum age.
    StaleListing,
    /// The source fetch timed out before producing the record.
    FetchTimeout,
}

impl RejectionCode {
    /// Stable wire token for this code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::InvalidPostcode => "INVALID_POSTCODE",
            Self::UnmappedPropertyType => "UNMAPPED_PROPERTY_TYPE",
            Self::UnmappedTenure => "UNMAPPED_TENURE",
            Self::PriceBelowThreshold => "PRICE_BELOW_THRESHOLD",
            Self::PriceAboveThreshold => "PRICE_ABOVE_THRESHOLD",
            Self::FutureListingDate => "FUTURE_LISTING_DATE",
            Self::StaleListing => "STALE_LISTING",
            Self::FetchTimeout => "FETCH_TIMEOUT",
        }
    }
}

impl fmt::Display for RejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Structured report of a listing that failed normalisation or validation.
///
/// The raw payload itself is not retained, only a SHA-256 hash, enough to
/// correlate with source logs without storing personal data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    /// Registered source identifier.
    pub source_id: String,

    /// The listing's identifier within the source.
    pub source_listing_id: String,

    /// Stable rejection code.
    pub rejection_code: RejectionCode,

    /// Human-readable reason, including the offending field where relevant.
    pub reason: String,

    /// SHA-256 hex digest of the raw payload, truncated to 16 characters.
    pub raw_data_hash: String,

    /// When the rejection was recorded.
    pub rejected_at: DateTime<Utc>,
}

impl RejectionRecord {
    /// Creates a rejection record, hashing the raw payload for correlation.
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        source_listing_id: impl Into<String>,
        rejection_code: RejectionCode,
        reason: impl Into<String>,
        raw_payload: &[u8],
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_listing_id: source_listing_id.into(),
            rejection_code,
            reason: reason.into(),
            raw_data_hash: hash_raw_payload(raw_payload),
            rejected_at: Utc::now(),
        }
    }
}

/// Hashes a raw payload for rejection correlation (truncated SHA-256).
#[must_use]
pub fn hash_raw_payload(raw: &[u8]) -> String {
    if raw.is_empty() {
        return "no_data".to_string();
    }
    let digest = Sha256::digest(raw);
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}
