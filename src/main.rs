use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use model_bootstrap::{
    AppConfig, BootstrapError, ModelRef, OllamaClient, Readiness, Supervisor, load_desired,
    preload_models, run_smoke_test, wait_for_service,
};

/// Starts a local model server and preloads the models listed in its manifest.
#[derive(Parser, Debug)]
#[command(name = "model-bootstrap")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the backing service, preload models, then run it in the foreground (default)
    Run,
    /// Reconcile the manifest against an already running backing service
    Sync,
    /// Send a prompt to each model and print the answers as JSON
    Verify {
        /// Prompt to send; defaults to SMOKE_PROMPT
        #[arg(short, long)]
        prompt: Option<String>,
        /// Models to try; defaults to the manifest
        models: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "loaded configuration");

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Sync => sync(config).await,
        Commands::Verify { prompt, models } => verify(config, prompt, models).await,
    };

    match result {
        Ok(code) => Ok(ExitCode::from(code)),
        Err(err) => {
            tracing::error!(error = %err, "bootstrap failed");
            Ok(ExitCode::from(err.exit_code()))
        }
    }
}

async fn run(config: AppConfig) -> Result<u8, BootstrapError> {
    let mut supervisor = Supervisor::new(config)?;
    let completion = supervisor.run().await?;
    if let Some(report) = completion.report.as_ref() {
        let rendered = serde_json::to_string(report).unwrap_or_default();
        tracing::debug!(report = %rendered, "preload report");
    }
    Ok(completion.exit_code)
}

async fn sync(config: AppConfig) -> Result<u8, BootstrapError> {
    let client = OllamaClient::from_config(&config)?;
    if let Readiness::TimedOut { attempts } =
        wait_for_service(&client, config.ready_max_attempts, config.ready_interval).await
    {
        return Err(BootstrapError::ReadinessTimeout { attempts });
    }

    let report = preload_models(&client, &config.models_file).await?;
    if let Some(report) = report {
        print_json(&report);
        if report.failed().next().is_some() {
            return Ok(1);
        }
    }
    Ok(0)
}

async fn verify(
    config: AppConfig,
    prompt: Option<String>,
    models: Vec<String>,
) -> Result<u8, BootstrapError> {
    let client = OllamaClient::from_config(&config)?;
    let models: Vec<ModelRef> = if models.is_empty() {
        load_desired(&config.models_file)?
    } else {
        models.into_iter().map(ModelRef::from).collect()
    };
    let prompt = prompt.unwrap_or_else(|| config.smoke_prompt.clone());

    let report = run_smoke_test(&client, &models, &prompt).await;
    print_json(&report);
    Ok(if report.passed() { 0 } else { 1 })
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(err) => tracing::error!(error = %err, "failed to render report"),
    }
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,hyper=warn,reqwest=warn".into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
