//! Atlas Codex CLI: `run <url> <query>` drives one extraction job to
//! completion and prints the response on stdout; `validate <bundle>`
//! checks a saved response for schema drift.

mod cache;
mod config;
mod job_manager;
mod static_fetch;
mod validate;

use anyhow::{Context, Result};
use atlas_core::{JobInput, JobOptions, Mode, OpenAiModelClient, Strategy};
use clap::{Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "atlas-cli")]
#[command(about = "Evidence-first web extraction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one extraction job and print the response as JSON.
    Run {
        url: String,
        query: String,
        #[arg(long, value_enum)]
        mode: Option<CliMode>,
        #[arg(long)]
        max_pages: Option<u32>,
    },
    /// Check a saved response bundle for schema conformance.
    Validate { bundle: PathBuf },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliMode {
    Strict,
    Soft,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Strict => Mode::Strict,
            CliMode::Soft => Mode::Soft,
        }
    }
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_USAGE: u8 = 2;
const EXIT_ABSTAINED: u8 = 3;
const EXIT_PIPELINE_FAILURE: u8 = 4;
const EXIT_ALL_STRATEGIES_FAILED: u8 = 5;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    if std::env::var("ATLAS_TELEMETRY_SINK").as_deref() != Ok("disabled") {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(fmt::layer())
            .init();
    }

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!(error = %err, "atlas-cli failed");
            eprintln!("{err:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { url, query, mode, max_pages } => cmd_run(url, query, mode, max_pages).await,
        Commands::Validate { bundle } => cmd_validate(&bundle),
    }
}

async fn cmd_run(url: String, query: String, mode: Option<CliMode>, max_pages: Option<u32>) -> Result<u8> {
    let config = Config::from_env().context("loading configuration")?;

    let mut client = atlas_model::OpenAiClient::new(config.openai_api_key.clone());
    if let Some(base_url) = &config.openai_base_url {
        client = client.with_base_url(base_url.clone());
    }
    if let Some(model) = &config.openai_model {
        client = client.with_model(model.clone());
    }
    let model_client = OpenAiModelClient::with_rate_limit(client, config.model_rate_limit_per_min);

    let cache = Arc::new(cache::Cache::new(config.cache_abstain_ttl));
    let strategies: Vec<Arc<dyn Strategy>> =
        vec![Arc::new(static_fetch::StaticFetchStrategy::new(config.static_fetch_timeout))];
    let manager = job_manager::JobManager::new(config.max_concurrent_jobs, cache, strategies);

    let input = JobInput {
        url,
        query,
        mode: mode.map(Into::into),
        max_pages,
        budget: None,
        options: JobOptions { allowed_pii: config.allow_pii.clone(), ..JobOptions::default() },
    };

    match manager.run(&model_client, input).await {
        Ok(response) => {
            println!("{}", serde_json::to_string(&response)?);
            Ok(EXIT_SUCCESS)
        }
        Err(atlas_core::AtlasError::ContractAbstain { reason }) => {
            eprintln!("abstained: {reason}");
            Ok(EXIT_ABSTAINED)
        }
        Err(atlas_core::AtlasError::AllStrategiesFailed { detail }) => {
            eprintln!("all acquisition strategies failed: {detail}");
            Ok(EXIT_ALL_STRATEGIES_FAILED)
        }
        Err(err) => {
            eprintln!("pipeline failure: {err}");
            Ok(EXIT_PIPELINE_FAILURE)
        }
    }
}

fn cmd_validate(bundle: &PathBuf) -> Result<u8> {
    match validate::validate_bundle(bundle) {
        Ok(()) => {
            println!("{{\"valid\":true}}");
            Ok(EXIT_SUCCESS)
        }
        Err(err) => {
            println!("{{\"valid\":false,\"reason\":{:?}}}", err.to_string());
            Ok(EXIT_PIPELINE_FAILURE)
        }
    }
}
