//! In-memory index of Land Registry completed sales.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schema::{PropertyType, Tenure, normalise_uk_postcode, postcode_district};

/// Maximum comparable age in months enforced as a hard filter.
pub(crate) const MAX_COMP_AGE_MONTHS: u32 = 24;

/// Days per month used for date-window arithmetic.
pub(crate) const DAYS_PER_MONTH: i64 = 30;

/// A comparable completed sale from Land Registry Price Paid Data.
///
/// Completed sales only: no asking prices, nothing under offer, nothing
/// withdrawn or relisted. Records are never fabricated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableSale {
    /// Land Registry transaction identifier.
    pub transaction_id: String,

    /// Normalised postcode of the sold property.
    pub postcode: String,

    /// Latitude in decimal degrees.
    pub latitude: f64,

    /// Longitude in decimal degrees.
    pub longitude: f64,

    /// Sale price in whole GBP.
    pub price: i64,

    /// Completion date of the sale.
    pub sale_date: NaiveDate,

    /// Property type, matched exactly against the subject.
    pub property_type: PropertyType,

    /// Tenure, matched exactly against the subject.
    pub tenure: Tenure,

    /// Whether the sale was a new build.
    pub new_build: bool,
}

/// Many-reader/single-writer in-memory comparable store.
///
/// Writers hold the lock only for the index update; queries clone matching
/// records out so no lock is held during downstream computation.
#[derive(Debug, Default)]
pub struct ComparableStore {
    sales: RwLock<Vec<ComparableSale>>,
}

impl ComparableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a single completed sale.
    pub fn insert(&self, sale: ComparableSale) {
        self.sales.write().expect("comp store lock poisoned").push(sale);
    }

    /// Bulk-loads completed sales.
    pub fn load(&self, sales: impl IntoIterator<Item = ComparableSale>) {
        self.sales
            .write()
            .expect("comp store lock poisoned")
            .extend(sales);
    }

    /// Number of sales in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sales.read().expect("comp store lock poisoned").len()
    }

    /// True if the store holds no sales.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidates passing the hard filters: exact property type, exact
    /// tenure, and sale date within the maximum comparable age.
    ///
    /// Results are sorted by `(sale_date DESC, transaction_id ASC)` so that
    /// downstream output never depends on insertion order.
    #[must_use]
    pub fn candidates(
        &self,
        property_type: PropertyType,
        tenure: Tenure,
        reference_date: NaiveDate,
    ) -> Vec<ComparableSale> {
        let cutoff = reference_date - chrono::Duration::days(
            i64::from(MAX_COMP_AGE_MONTHS) * DAYS_PER_MONTH,
        );
        let mut matched: Vec<ComparableSale> = self
            .sales
            .read()
            .expect("comp store lock poisoned")
            .iter()
            .filter(|s| {
                s.property_type == property_type && s.tenure == tenure && s.sale_date >= cutoff
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.sale_date
                .cmp(&a.sale_date)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        matched
    }
}

/// Postcode-to-centroid lookup used when a subject has no coordinates.
///
/// Exact postcode entries are preferred; an outward-district centroid is the
/// fallback. A postcode that resolves through neither leaves the subject
/// without coordinates, which yields zero comps rather than a guess.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PostcodeGazetteer {
    exact: HashMap<String, (f64, f64)>,
    district: HashMap<String, (f64, f64)>,
}

impl PostcodeGazetteer {
    /// Creates an empty gazetteer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact-postcode centroid.
    pub fn insert_postcode(&mut self, postcode: &str, latitude: f64, longitude: f64) {
        self.exact
            .insert(normalise_uk_postcode(postcode), (latitude, longitude));
    }

    /// Adds an outward-district centroid (e.g. `"N8"`).
    pub fn insert_district(&mut self, district: &str, latitude: f64, longitude: f64) {
        self.district
            .insert(district.trim().to_uppercase(), (latitude, longitude));
    }

    /// Resolves a postcode to a centroid, exact first, district fallback.
    #[must_use]
    pub fn resolve(&self, postcode: &str) -> Option<(f64, f64)> {
        let normalised = normalise_uk_postcode(postcode);
        if let Some(coords) = self.exact.get(&normalised) {
            return Some(*coords);
        }
        self.district.get(postcode_district(&normalised)).copied()
    }
}
