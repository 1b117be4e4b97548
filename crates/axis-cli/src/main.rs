//! axis - operator CLI for the Axis deal engine and submission logbook.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// axis - property deal evaluation and submission logbook tooling
#[derive(Parser, Debug)]
#[command(name = "axis")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate raw listings against a comparable sales file
    Evaluate {
        /// JSON file of raw listings
        #[arg(long)]
        listings: PathBuf,

        /// JSON file of Land Registry completed sales
        #[arg(long)]
        comps: PathBuf,

        /// JSON file of postcode centroids
        #[arg(long)]
        gazetteer: Option<PathBuf>,

        /// Reference date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        reference_date: Option<String>,

        /// Write the ranked opportunities here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Inspect the submission logbook snapshot
    Logbook {
        #[command(subcommand)]
        command: commands::logbook::LogbookCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Evaluate {
            listings,
            comps,
            gazetteer,
            reference_date,
            output,
        } => commands::evaluate::run(
            &config,
            &listings,
            &comps,
            gazetteer.as_deref(),
            reference_date.as_deref(),
            output.as_deref(),
        ),
        Commands::Logbook { command } => commands::logbook::run(&config, &command),
    }
}
