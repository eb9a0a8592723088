use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docload::{run_load, run_verify, LoadConfig, LogFormat};
use tracing_subscriber::EnvFilter;

/// Bulk-load a delimited-text file into a document collection.
#[derive(Debug, Parser)]
#[command(name = "docload", version, about)]
struct Cli {
    /// Configuration file (defaults to ./docload.{toml,yaml,json,ini} if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream the data file into the configured collection.
    Load {
        /// Overrides `data_file`.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Overrides `ingest.batch_size`.
        #[arg(long, allow_negative_numbers = true)]
        batch_size: Option<i64>,
    },
    /// Check that the collection is populated with the expected fields.
    Verify,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config =
        LoadConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config);

    match cli.command {
        Command::Load { file, batch_size } => {
            if let Some(file) = file {
                config.data_file = Some(file);
            }
            if let Some(batch_size) = batch_size {
                config.ingest.batch_size = batch_size;
            }

            match run_load(&config) {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(())
                }
                Err(err) => {
                    if let Some(partial) = err.partial_result() {
                        println!("{}", serde_json::to_string_pretty(partial)?);
                    }
                    Err(err).context("load aborted")
                }
            }
        }
        Command::Verify => {
            let report = run_verify(&config).context("verification failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn init_tracing(config: &LoadConfig) {
    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Plain => builder.init(),
    }
}
