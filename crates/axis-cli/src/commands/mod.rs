//! CLI subcommand implementations.

pub mod evaluate;
pub mod logbook;

use std::path::Path;

use anyhow::{Context, Result};
use axis_core::config::EngineConfig;

/// Loads engine configuration, falling back to defaults when no path is
/// given. A malformed file is a hard error, never a silent default.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}
