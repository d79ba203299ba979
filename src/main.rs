//! reqflow - prioritized request lifecycle engine
//!
//! Main entry point for the reqflow CLI and its long-running loops.

use clap::Parser;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reqflow_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};

mod backends;
mod cli;
mod cmd_queue;
mod cmd_run;
mod cmd_store;

use cli::{Cli, Commands};

/// Initialize tracing with console and daily-rolling file output.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = ConfigLoader::expand_path(&logging.directory.to_string_lossy());
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("reqflow")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keeps the background writer alive until the process exits.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Reject invalid configuration and log warnings.
fn validate_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let warnings = ConfigValidator::validate(config).into_result()?;
    for warning in warnings {
        warn!("config {}: {}", warning.path, warning.message);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_or_default(&cli.config)?;
    init_tracing(&config.logging)?;
    if !cli.config.exists() {
        info!("{} not found, using default configuration", cli.config.display());
    }
    validate_config(&config)?;

    match cli.command {
        Commands::Submitter => {
            info!("Starting reqflow submitter v{}", env!("CARGO_PKG_VERSION"));
            cmd_run::run_submitter(config).await
        }
        Commands::Poller { run_to_completion } => {
            info!("Starting reqflow poller v{}", env!("CARGO_PKG_VERSION"));
            cmd_run::run_poller(config, run_to_completion).await
        }
        Commands::Send {
            token,
            target,
            priority,
            last,
        } => cmd_queue::send(config, &token, target, priority, last).await,
        Commands::Request {
            name,
            title,
            identifier_type,
            identifiers,
            fields,
            format,
            priority,
        } => {
            let spec = cmd_queue::request_spec(
                &config,
                name,
                title,
                identifier_type,
                identifiers,
                fields,
                format,
                priority,
            );
            cmd_queue::request(config, spec).await
        }
        Commands::Clear { target } => cmd_queue::clear(config, target).await,
        Commands::Status { request_id } => cmd_store::status(config, &request_id).await,
        Commands::List { status } => cmd_store::list(config, status).await,
        Commands::Purge { days } => cmd_store::purge(config, days).await,
    }
}
