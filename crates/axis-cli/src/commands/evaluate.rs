//! Batch evaluation from local files.
//!
//! Reads raw listings and comparable sales from JSON files, runs the full
//! pipeline, and emits the ranked opportunities as JSON. Rejected listings
//! are summarised on stderr; they never appear in the output document.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use axis_core::comps::{ComparableSale, ComparableStore, PostcodeGazetteer};
use axis_core::config::EngineConfig;
use axis_core::engine::DealEngine;
use axis_core::ingest::{RawListing, StructuralValidator};
use axis_core::schema::ValidatedAsset;

pub fn run(
    config: &EngineConfig,
    listings_path: &Path,
    comps_path: &Path,
    gazetteer_path: Option<&Path>,
    reference_date: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let reference_date = match reference_date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid reference date: {raw}"))?,
        None => chrono::Utc::now().date_naive(),
    };

    let raw_listings: Vec<RawListing> = read_json(listings_path)?;
    let sales: Vec<ComparableSale> = read_json(comps_path)?;
    let gazetteer: PostcodeGazetteer = match gazetteer_path {
        Some(path) => read_json(path)?,
        None => PostcodeGazetteer::new(),
    };

    let validator = StructuralValidator::new(reference_date);
    let mut assets: Vec<ValidatedAsset> = Vec::with_capacity(raw_listings.len());
    let mut rejected = 0_usize;
    for raw in &raw_listings {
        match validator.validate(raw) {
            Ok(asset) => assets.push(asset),
            Err(rejection) => {
                rejected += 1;
                warn!(
                    source = %rejection.source_id,
                    listing = %rejection.source_listing_id,
                    code = %rejection.rejection_code,
                    reason = %rejection.reason,
                    "listing rejected"
                );
            }
        }
    }

    let store = ComparableStore::new();
    store.load(sales);

    let engine = DealEngine::with_clock(config.clone(), reference_date, chrono::Utc::now());
    let opportunities = engine.evaluate_batch(&assets, &store, &gazetteer);
    info!(
        evaluated = opportunities.len(),
        rejected,
        comps = store.len(),
        "evaluation complete"
    );

    let rendered = serde_json::to_string_pretty(&opportunities)?;
    match output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("writing output to {}", path.display()))?,
        None => println!("{rendered}"),
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}
