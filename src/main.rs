#![forbid(unsafe_code)]

mod cli;
mod config;
mod constants;
mod error;
mod navigation;
mod pipeline;
mod session;
mod staging;

use anyhow::Result;
use clap::Parser;
use tracing::{Level as TraceLevel, error};
use tracing_subscriber::FmtSubscriber;

use cli::Cli;
use error::LimitsError;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };
    let log_level = if cli.verbose { log_level.max(TraceLevel::DEBUG) } else { log_level };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Err(err) = cli::run(cli) {
        if let Some(LimitsError::ReconciliationExhausted { key, expected, observed, attempts }) =
            err.downcast_ref::<LimitsError>()
        {
            error!(
                key = %key,
                expected,
                observed = ?observed,
                attempts,
                "The new config is written but the farm is not running it; reload the engine by hand"
            );
            std::process::exit(constants::exit::RECONCILIATION_EXHAUSTED);
        }
        return Err(err);
    }
    Ok(())
}
