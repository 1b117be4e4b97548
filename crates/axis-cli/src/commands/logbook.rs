//! Logbook inspection over a persisted snapshot.
//!
//! These commands are read-only consumers of the logbook store: the latest
//! snapshot, the ordered version history, and immutable point-in-time
//! versions, loaded from the snapshot file named in the configuration.

use anyhow::{Context, Result, bail};
use clap::Subcommand;

use axis_core::config::EngineConfig;
use axis_core::logbook::LogbookStore;
use axis_core::persist::load_snapshot;

/// Read-only logbook inspection commands.
#[derive(Subcommand, Debug)]
pub enum LogbookCommand {
    /// List all property ids in the snapshot
    List,

    /// Show the latest submission snapshot for a property
    Show {
        /// Property id (PROP- followed by 12 hex characters)
        property_id: String,
    },

    /// Show the ordered version history for a property
    History {
        /// Property id
        property_id: String,
    },

    /// Show an immutable version snapshot
    Version {
        /// Property id
        property_id: String,

        /// 1-indexed version number
        version_number: u32,
    },

    /// Verify the hash chain of every logbook in the snapshot
    Verify,
}

pub fn run(config: &EngineConfig, command: &LogbookCommand) -> Result<()> {
    let store = load_snapshot(&config.snapshot_path).with_context(|| {
        format!(
            "loading logbook snapshot from {}",
            config.snapshot_path.display()
        )
    })?;

    match command {
        LogbookCommand::List => {
            for property_id in store.property_ids() {
                println!("{property_id}");
            }
            Ok(())
        }
        LogbookCommand::Show { property_id } => {
            let snapshot = store.current_snapshot(property_id)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        LogbookCommand::History { property_id } => {
            let history = store.history(property_id)?;
            println!("{}", serde_json::to_string_pretty(&history)?);
            Ok(())
        }
        LogbookCommand::Version {
            property_id,
            version_number,
        } => {
            let version = store.version(property_id, *version_number)?;
            println!("{}", serde_json::to_string_pretty(&version)?);
            Ok(())
        }
        LogbookCommand::Verify => verify_all(&store),
    }
}

fn verify_all(store: &LogbookStore) -> Result<()> {
    let mut broken = 0_usize;
    for property_id in store.property_ids() {
        let result = store.with_logbook(&property_id, |logbook| logbook.verify_chain())?;
        match result {
            None => println!("{property_id}: ok"),
            Some(version) => {
                broken += 1;
                println!("{property_id}: chain broken at version {version}");
            }
        }
    }
    if broken > 0 {
        bail!("{broken} logbook(s) failed chain verification");
    }
    Ok(())
}
