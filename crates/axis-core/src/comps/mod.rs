//! Comparable completed sales: store, gazetteer, and progressive selection.
//!
//! Comparables come exclusively from Land Registry completed sales: never
//! asking prices, never synthesised records. The store applies the hard
//! filters (exact property type, exact tenure, bounded age); the selector
//! widens radius and date window through a fixed ladder until at least one
//! comp appears.

mod selector;
mod store;

pub use selector::{CompSelection, FALLBACK_LEVELS, haversine_miles, select_comps};
pub use store::{ComparableSale, ComparableStore, PostcodeGazetteer};
