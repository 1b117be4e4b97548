//! Source registration and lookup.
//!
//! Every data source is formally registered before integration. The
//! registration declares identity, classification, which fields the source
//! actually supplies, and operational constraints. Sources that do not
//! declare a field never have it silently inferred downstream.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::SourceCategory;

/// Errors from the source registry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// A source with this id is already registered.
    #[error("source already registered: {source_id}")]
    DuplicateSource {
        /// The conflicting source id.
        source_id: String,
    },

    /// The source id is not lowercase alphanumeric with underscores.
    #[error("invalid source id: {source_id}")]
    InvalidSourceId {
        /// The offending source id.
        source_id: String,
    },
}

/// Immutable registration record for a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRegistration {
    /// Source identifier: lowercase alphanumeric with underscores.
    pub source_id: String,

    /// Human-readable source name.
    pub source_name: String,

    /// Source classification.
    pub source_category: SourceCategory,

    /// Whether listings sell at auction.
    pub is_auction: bool,

    /// Whether listings are distressed sales.
    pub is_distressed: bool,

    /// Whether listings are off-market.
    pub is_off_market: bool,

    /// Declared field coverage: tenure.
    pub provides_tenure: bool,

    /// Declared field coverage: property type.
    pub provides_property_type: bool,

    /// Declared field coverage: bedrooms.
    pub provides_bedrooms: bool,

    /// Declared field coverage: bathrooms.
    pub provides_bathrooms: bool,

    /// Declared field coverage: coordinates.
    pub provides_coordinates: bool,

    /// Declared field coverage: floor area.
    pub provides_square_feet: bool,

    /// Minimum interval between requests to the source.
    #[serde(with = "duration_secs")]
    pub rate_limit: Duration,

    /// Whether the source requires authentication.
    pub requires_authentication: bool,

    /// Whether the source is active. Inactive sources are never fetched.
    pub active: bool,

    /// Date the source was registered.
    pub registered_date: NaiveDate,

    /// Date the registration was last verified.
    pub last_verified_date: NaiveDate,
}

impl SourceRegistration {
    fn validate(&self) -> Result<(), RegistryError> {
        let well_formed = !self.source_id.is_empty()
            && self
                .source_id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if well_formed {
            Ok(())
        } else {
            Err(RegistryError::InvalidSourceId {
                source_id: self.source_id.clone(),
            })
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

/// Registry of data sources, many-reader/single-writer.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<String, SourceRegistration>>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new source.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidSourceId`] if the id is malformed.
    /// - [`RegistryError::DuplicateSource`] if the id is taken.
    pub fn register(&self, registration: SourceRegistration) -> Result<(), RegistryError> {
        registration.validate()?;
        let mut sources = self.sources.write().expect("registry lock poisoned");
        if sources.contains_key(&registration.source_id) {
            return Err(RegistryError::DuplicateSource {
                source_id: registration.source_id,
            });
        }
        sources.insert(registration.source_id.clone(), registration);
        Ok(())
    }

    /// Looks up a registered source by id.
    #[must_use]
    pub fn get(&self, source_id: &str) -> Option<SourceRegistration> {
        self.sources
            .read()
            .expect("registry lock poisoned")
            .get(source_id)
            .cloned()
    }

    /// All active sources, sorted by id for deterministic iteration.
    #[must_use]
    pub fn active_sources(&self) -> Vec<SourceRegistration> {
        let mut active: Vec<_> = self
            .sources
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        active
    }

    /// All sources in a category, sorted by id.
    #[must_use]
    pub fn sources_by_category(&self, category: SourceCategory) -> Vec<SourceRegistration> {
        let mut matched: Vec<_> = self
            .sources
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|s| s.source_category == category)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        matched
    }

    /// Number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.read().expect("registry lock poisoned").len()
    }

    /// True if no sources are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(id: &str, active: bool) -> SourceRegistration {
        SourceRegistration {
            source_id: id.to_string(),
            source_name: "Test Source".to_string(),
            source_category: SourceCategory::Auction,
            is_auction: true,
            is_distressed: false,
            is_off_market: false,
            provides_tenure: true,
            provides_property_type: true,
            provides_bedrooms: false,
            provides_bathrooms: false,
            provides_coordinates: false,
            provides_square_feet: false,
            rate_limit: Duration::from_secs_f64(1.5),
            requires_authentication: false,
            active,
            registered_date: NaiveDate::from_ymd_opt(2026, 1, 17).unwrap(),
            last_verified_date: NaiveDate::from_ymd_opt(2026, 1, 17).unwrap(),
        }
    }

    #[test]
    fn register_and_lookup() {
        let registry = SourceRegistry::new();
        registry.register(registration("auction_house_london", true)).unwrap();
        assert!(registry.get("auction_house_london").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = SourceRegistry::new();
        registry.register(registration("dup", true)).unwrap();
        let err = registry.register(registration("dup", true)).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSource { .. }));
    }

    #[test]
    fn malformed_id_rejected() {
        let registry = SourceRegistry::new();
        let err = registry.register(registration("Bad-Id", true)).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSourceId { .. }));
    }

    #[test]
    fn active_listing_is_sorted_and_filtered() {
        let registry = SourceRegistry::new();
        registry.register(registration("zeta", true)).unwrap();
        registry.register(registration("alpha", true)).unwrap();
        registry.register(registration("mid", false)).unwrap();
        let active = registry.active_sources();
        let ids: Vec<_> = active.iter().map(|s| s.source_id.as_str()).collect();
        assert_eq!(ids, ["alpha", "zeta"]);
    }
}
