//! Stage 3b/4: market-reality valuation and the confidence gate.
//!
//! The estimated market value is always a median of comparable completed
//! sale prices: never a mean, never a model output, never a source-supplied
//! estimate. Zero comps is a valid result (`emv = 0`), not an error.

mod confidence;
mod market;

pub use confidence::{Confidence, ConfidenceCap, ConfidenceGatedAnalysis, gate};
pub use market::{MarketAnalysis, analyse};
