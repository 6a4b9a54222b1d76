//! Harvest CLI - Main entry point

use clap::Parser;
use harvest_cli::{Cli, Commands};
use harvest_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Load .env if present; environment always wins over defaults
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging based on verbose flag and environment
    let log_config = if cli.verbose {
        LogConfig::builder()
            .level(LogLevel::Debug)
            .output(LogOutput::Console)
            .log_file_prefix("harvest".to_string())
            .build()
    } else {
        LogConfig::builder()
            .level(LogLevel::Warn)
            .output(LogOutput::Console)
            .log_file_prefix("harvest".to_string())
            .build()
    };

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    // Logging failures never block the CLI itself
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(cli).await {
        error!(error = %e, "command failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn execute_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run { config, output } => {
            let config = harvest_cli::load_config(&config)?;
            let registry = harvest_cli::default_registry();

            // Ctrl-C requests a cooperative stop at the next call boundary.
            let cancel = CancellationToken::new();
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received; finishing the current page");
                    signal_token.cancel();
                }
            });

            let summary = harvest_cli::run(&registry, config, output, cancel).await?;
            info!(
                pages = summary.pages,
                fetched = summary.records_fetched,
                emitted = summary.records_emitted,
                batches = summary.batches,
                "run complete"
            );
            eprintln!(
                "Fetched {} records over {} pages; emitted {} in {} batches",
                summary.records_fetched, summary.pages, summary.records_emitted, summary.batches
            );
            Ok(())
        }

        Commands::Schema { config } => {
            let config = harvest_cli::load_config(&config)?;
            print!("{}", harvest_cli::runner::describe_schema(&config)?);
            Ok(())
        }

        Commands::Transports => {
            for identifier in harvest_cli::default_registry().identifiers() {
                println!("{identifier}");
            }
            Ok(())
        }
    }
}
