//! Snowdesk CLI: the main entry point.
//!
//! The shared collaborators (config, weather caches, HTTP clients, tool
//! set) are constructed once at startup; every `ask` runs one dialogue
//! through the orchestrator and prints the structured report as JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use snowdesk_agent::{AnswerRequest, Orchestrator};
use snowdesk_config::AppConfig;
use snowdesk_providers::{GenerationParams, OpenAiCompatModel};
use snowdesk_safety::ModerationGate;
use snowdesk_tools::{NwsWeatherClient, ToolSet, VectorSearchClient, WeatherCaches};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "snowdesk",
    about = "Snowdesk: safety-gated Q&A agent for snow services",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file (defaults apply when absent)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the agent one question
    Ask {
        /// The question to answer
        query: String,

        /// Latitude for weather context
        #[arg(long)]
        latitude: Option<f64>,

        /// Longitude for weather context
        #[arg(long)]
        longitude: Option<f64>,

        /// Withhold the weather capability from the model
        #[arg(long)]
        no_weather: bool,
    },

    /// Print the effective configuration (secrets redacted)
    Config,
}

fn build_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let model = OpenAiCompatModel::new(
        config.model.endpoint.clone(),
        config.model.api_key.clone(),
        GenerationParams {
            model: config.model.model.clone(),
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
            system_instruction: config.model.system_instruction.clone(),
        },
        Duration::from_secs(config.model.timeout_secs),
    )
    .context("failed to build model client")?;

    let safety = ModerationGate::new(
        config.safety.input_endpoint.clone(),
        config.safety.output_endpoint.clone(),
        config.safety.api_key.clone(),
        Duration::from_secs(config.safety.timeout_secs),
    )
    .context("failed to build safety gate")?;

    let retrieval = VectorSearchClient::new(
        config.retrieval.endpoint.clone(),
        Duration::from_secs(config.retrieval.timeout_secs),
    )
    .context("failed to build retrieval client")?;

    let weather = NwsWeatherClient::new(
        config.weather.base_url.clone(),
        config.weather.user_agent.clone(),
        Duration::from_secs(config.weather.timeout_secs),
    )
    .context("failed to build weather client")?;

    let caches = Arc::new(WeatherCaches::new(Duration::from_secs(
        config.weather.cache_ttl_secs,
    )));

    let tools = Arc::new(ToolSet::from_services(
        Arc::new(retrieval),
        Arc::new(weather),
        caches,
        config.retrieval.top_k,
        config.weather.region.clone(),
    ));

    Ok(Orchestrator::new(
        Arc::new(model),
        Arc::new(safety),
        tools,
        config.location.latitude,
        config.location.longitude,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path).context("failed to load config")?,
        None => AppConfig::from_env(),
    };

    match cli.command {
        Commands::Ask {
            query,
            latitude,
            longitude,
            no_weather,
        } => {
            let orchestrator = build_orchestrator(&config)?;

            let mut request = AnswerRequest::new(query);
            request.latitude = latitude;
            request.longitude = longitude;
            request.include_weather = !no_weather;

            info!(has_location = request.latitude.is_some(), "Question received");
            let report = orchestrator.answer(request).await;
            info!(
                security_passed = report.security_passed,
                functions = ?report.functions_called,
                "Answer generated"
            );

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Config => {
            println!("{config:#?}");
        }
    }

    Ok(())
}
