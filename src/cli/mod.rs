pub mod convert;
pub mod rates;
pub mod setup;
pub mod ui;
pub mod watch;

use crate::core::RateProvider;
use crate::core::config::AppConfig;
use crate::providers::OpenExchangeRatesSource;
use anyhow::Result;
use tracing::warn;

/// Builds the provider described by `config` and waits for its first fetch.
pub async fn connect(config: &AppConfig) -> Result<RateProvider> {
    let source = OpenExchangeRatesSource::from_config(config)?;

    let pb = ui::new_spinner("Fetching exchange rates...");
    let provider = RateProvider::start(source, config.refresh.options()).await;
    pb.finish_and_clear();

    if !provider.has_rates() {
        warn!("Starting without exchange rates; conversions will fail until a refresh succeeds");
    }
    Ok(provider)
}
