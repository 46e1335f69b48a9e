use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::config::ProviderConfig;
use crate::core::rates::RateProvider;
use crate::providers::util::send_with_retry;

/// Central Bank of Russia daily rates, quoted in roubles.
pub struct CbrRateProvider {
    base_url: String,
    client: reqwest::Client,
    retries: usize,
    retry_delay: Duration,
}

impl CbrRateProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fxledger/1.0")
            .timeout(config.timeout())
            .build()?;
        Ok(CbrRateProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }
}

#[derive(Deserialize, Debug)]
struct DailyResponse {
    #[serde(rename = "Date")]
    date: Option<DateTime<FixedOffset>>,
    #[serde(rename = "Valute")]
    valute: HashMap<String, Quote>,
}

fn default_nominal() -> f64 {
    1.0
}

#[derive(Deserialize, Debug)]
struct Quote {
    #[serde(rename = "Nominal", default = "default_nominal")]
    nominal: f64,
    #[serde(rename = "Value")]
    value: f64,
}

impl Quote {
    // Some currencies are quoted per 10 or 100 units.
    fn per_unit(&self) -> f64 {
        if self.nominal > 0.0 {
            self.value / self.nominal
        } else {
            self.value
        }
    }
}

#[async_trait]
impl RateProvider for CbrRateProvider {
    #[instrument(name = "CbrRateFetch", skip(self))]
    async fn fetch_rates(&self, codes: &[String]) -> Result<HashMap<String, f64>> {
        let url = format!("{}/daily_json.js", self.base_url);
        debug!("Requesting currency rates from {}", url);

        let response = send_with_retry(|| self.client.get(&url).send(), self.retries, self.retry_delay)
            .await
            .map_err(|e| anyhow!("Request error: {} URL: {}", e, url))?;

        if !response.status().is_success() {
            return Err(anyhow!("HTTP error: {} URL: {}", response.status(), url));
        }

        let text = response.text().await?;
        let data: DailyResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response: {}", e))?;
        debug!(date = ?data.date, quotes = data.valute.len(), "Received CBR rates");

        codes
            .iter()
            .map(|code| {
                data.valute
                    .get(code)
                    .map(|quote| (code.clone(), quote.per_unit()))
                    .ok_or_else(|| anyhow!("No rate data found for currency: {}", code))
            })
            .collect()
    }
}
