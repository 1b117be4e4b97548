//! # axis-core
//!
//! Core library for the Axis property platform: a deterministic deal
//! evaluation engine fed by comparable completed sales, and an append-only
//! submission logbook with content-addressed document storage.
//!
//! ## Deal Engine
//!
//! Raw listings from registered sources are normalised into the canonical
//! [`schema::ValidatedAsset`] record and pushed through a six-stage pipeline:
//!
//! ```text
//! ingest -> validate -> select comps -> market analysis -> confidence gate
//!        -> score -> classify -> ClassifiedOpportunity (+ audit trail)
//! ```
//!
//! The engine never fabricates market data: the estimated market value is the
//! median of exact-match comparable sales, zero comps is a valid result, and
//! every output carries the full provenance of how it was computed.
//!
//! ## Submission Logbook
//!
//! Agent submissions are stored as append-only version histories. Documents
//! are content-addressed (SHA-256) and verified on every read. Previous
//! versions remain readable forever; state only moves through the submission
//! status machine.
//!
//! ## Example
//!
//! ```rust,no_run
//! use axis_core::comps::{ComparableStore, PostcodeGazetteer};
//! use axis_core::engine::DealEngine;
//! use axis_core::config::EngineConfig;
//!
//! let engine = DealEngine::new(EngineConfig::default());
//! let store = ComparableStore::new();
//! let gazetteer = PostcodeGazetteer::new();
//! let opportunities = engine.evaluate_batch(&[], &store, &gazetteer);
//! assert!(opportunities.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod classify;
pub mod comps;
pub mod config;
pub mod documents;
pub mod engine;
pub mod ingest;
pub mod logbook;
pub mod persist;
pub mod schema;
pub mod scoring;
pub mod valuation;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::classify::{ClassifiedOpportunity, Recommendation};
    pub use crate::comps::{ComparableSale, ComparableStore, PostcodeGazetteer};
    pub use crate::config::EngineConfig;
    pub use crate::engine::DealEngine;
    pub use crate::logbook::{LogbookStore, SubmissionLogbook, SubmissionStatus};
    pub use crate::schema::{PropertyType, Tenure, ValidatedAsset};
}

pub use classify::{ClassifiedOpportunity, Recommendation};
pub use config::EngineConfig;
pub use engine::DealEngine;
pub use schema::{PropertyType, Tenure, ValidatedAsset};
