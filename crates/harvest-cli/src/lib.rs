//! Harvest CLI Library
//!
//! Command-line front end for the extraction engine:
//!
//! - **Run**: execute a job configuration end to end (`harvest run`)
//! - **Schema**: print a job's declared schema (`harvest schema`)
//! - **Transports**: list the transports this binary ships (`harvest transports`)

pub mod http;
pub mod runner;

pub use http::HttpTransport;
pub use runner::{default_registry, load_config, run, RunSummary};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Harvest - schema-driven multi-page data extraction
#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an extraction job to completion
    Run {
        /// Path to the job configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Write records to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the declared schema of a job configuration
    Schema {
        /// Path to the job configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// List the registered transports
    Transports,
}
