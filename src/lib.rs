pub mod cli;
pub mod core;
pub mod providers;

pub use crate::core::{ConversionError, RateProvider, RateSnapshot, RateSource};

use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Convert {
        amount: f64,
        from: String,
        to: Option<String>,
    },
    Rates,
    Watch,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("ratekeeper starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let provider = cli::connect(&config).await?;

    let result = match command {
        AppCommand::Convert { amount, from, to } => {
            let to = to.as_deref().unwrap_or(&config.currency);
            cli::convert::run(&provider, amount, &from, to)
        }
        AppCommand::Rates => {
            cli::rates::run(&provider, &config.currency, &config.display_currencies);
            Ok(())
        }
        AppCommand::Watch => cli::watch::run(&provider, &config.currency).await,
    };

    provider.shutdown().await;
    result
}
