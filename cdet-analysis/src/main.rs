//! Copyright analysis (cdet-analysis) - Main entry point
//!
//! Runs one analysis (or one embedding extraction) and prints the result as
//! JSON on stdout. Logs go to stderr or the configured log file.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use cdet_analysis::{AnalysisConfig, AnalysisOrchestrator, AnalysisRequest};
use cdet_common::config::{resolve_config_path, LoggingConfig, TomlConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code when the printed result reports a failure
const EXIT_ANALYSIS_FAILED: u8 = 2;

/// Command-line arguments for cdet-analysis
#[derive(Parser, Debug)]
#[command(name = "cdet-analysis")]
#[command(about = "Copyright risk analysis for audio files")]
#[command(version)]
struct Args {
    /// Configuration file (overrides CDET_CONFIG and the platform default)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the embedding, search the index and score the copyright risk
    Analyze {
        /// Audio file to analyze
        audio: String,

        /// Embedding model
        #[arg(short, long)]
        model: Option<String>,

        /// Maximum number of matches
        #[arg(short, long)]
        limit: Option<usize>,

        /// Similarity threshold in [0, 1]
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Similarity index (overrides the configured one)
        #[arg(short, long)]
        index: Option<PathBuf>,
    },

    /// Extract the embedding only
    Extract {
        /// Audio file to process
        audio: String,

        /// Embedding model
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // The bootstrap file configures logging, so its source is logged afterwards
    let config_path = resolve_config_path(args.config.as_deref());
    let (mut toml_config, source) = TomlConfig::load_with_source(config_path.as_deref())
        .with_context(|| match &config_path {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })?;

    init_tracing(&toml_config.logging)?;
    source.log();
    toml_config.apply_env_overrides();

    let config = AnalysisConfig::from_toml(&toml_config).context("Invalid configuration")?;
    let orchestrator = AnalysisOrchestrator::from_config(&config);

    let success = match args.command {
        Command::Analyze {
            audio,
            model,
            limit,
            threshold,
            index,
        } => {
            let request = AnalysisRequest {
                audio_reference: audio,
                model_id: model,
                result_limit: limit,
                similarity_threshold: threshold,
                index_path: index,
            };
            let report = orchestrator.analyze(request).await;
            print_json(&report)?;
            report.is_success()
        }
        Command::Extract { audio, model } => {
            let record = orchestrator.extract_only(&audio, model.as_deref()).await;
            print_json(&record)?;
            record.success
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_ANALYSIS_FAILED)
    })
}

/// Initialize tracing: RUST_LOG wins over the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level: {}", logging.level))?;

    let registry = tracing_subscriber::registry().with(filter);

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{}", json);
    Ok(())
}
