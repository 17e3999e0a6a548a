//! openexchangerates.org client.
//!
//! The `latest.json` endpoint returns every supported currency against a
//! single base (USD on the free plan) in one response, which is exactly the
//! unit a [`RateSnapshot`] holds.

use crate::core::config::{AppConfig, RefreshConfig};
use crate::core::currency::RateSource;
use crate::core::snapshot::RateSnapshot;
use crate::providers::util::with_retry;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct LatestResponse {
    base: Option<String>,
    /// Unix seconds at which the rates were published.
    timestamp: Option<i64>,
    rates: HashMap<String, f64>,
}

pub struct OpenExchangeRatesSource {
    base_url: String,
    app_id: SecretString,
    client: Client,
    retries: usize,
    retry_delay_ms: u64,
}

impl OpenExchangeRatesSource {
    pub fn new(base_url: &str, app_id: SecretString, refresh: &RefreshConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("ratekeeper/0.1")
            .timeout(refresh.fetch_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(OpenExchangeRatesSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id,
            client,
            retries: refresh.retries,
            retry_delay_ms: refresh.retry_delay_ms,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            config.openexchangerates_url(),
            config.app_id()?,
            &config.refresh,
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/latest.json?app_id={}",
            self.base_url,
            self.app_id.expose_secret()
        )
    }
}

#[async_trait]
impl RateSource for OpenExchangeRatesSource {
    #[instrument(name = "OpenExchangeRatesFetch", skip(self), fields(base_url = %self.base_url))]
    async fn fetch_latest(&self) -> Result<RateSnapshot> {
        let url = self.endpoint();
        debug!("Requesting latest exchange rates");

        let response = with_retry(
            || self.client.get(&url).send(),
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .context("Failed to send exchange rate request")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP error: {} from exchange rate service", status));
        }

        let text = response
            .text()
            .await
            .map_err(reqwest::Error::without_url)
            .context("Failed to read exchange rate response")?;

        if text.trim().is_empty() {
            return Err(anyhow!("Received empty response from exchange rate service"));
        }

        let data: LatestResponse = serde_json::from_str(&text).with_context(|| {
            format!("Failed to parse exchange rate response. Response: '{text}'")
        })?;

        let published_at = data
            .timestamp
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());

        debug!(
            base = ?data.base,
            currencies = data.rates.len(),
            "Received exchange rates"
        );

        Ok(RateSnapshot::new(
            data.base,
            data.rates,
            Utc::now(),
            published_at,
        ))
    }

    fn name(&self) -> &str {
        "openexchangerates"
    }
}
