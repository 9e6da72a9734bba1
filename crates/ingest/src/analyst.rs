//! HTTP analyst-consensus provider.
//!
//! Expects `GET {api_url}/{ticker}` to return the consensus summary the
//! collection scripts produce:
//!
//! ```json
//! { "ticker": "AAPL", "success": true, "consensusEPS": 1.58,
//!   "consensusRevenue": 9.4e10, "targetPrice": 210.5,
//!   "rating": "buy", "analystCount": 38 }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use sentinel_core::config::AnalystConfig;
use sentinel_core::{AnalystSnapshot, SharedClock};

use crate::error::ProviderError;
use crate::provider::AnalystProvider;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsensusResponse {
    #[serde(default = "default_success")]
    success: bool,
    error: Option<String>,
    #[serde(rename = "consensusEPS")]
    consensus_eps: Option<f64>,
    consensus_revenue: Option<f64>,
    target_price: Option<f64>,
    rating: Option<String>,
    analyst_count: Option<i32>,
}

fn default_success() -> bool {
    true
}

pub struct HttpAnalystProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    request_delay: Duration,
    clock: SharedClock,
}

impl HttpAnalystProvider {
    pub fn new(config: &AnalystConfig, clock: SharedClock) -> Result<Self, ProviderError> {
        let api_url = config
            .api_url
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("ANALYST_API_URL is not set".into()))?
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            api_url,
            api_key: config.api_key.clone(),
            request_delay: Duration::from_millis(config.request_delay_ms),
            clock,
        })
    }

    fn snapshot_from(&self, ticker: &str, body: ConsensusResponse) -> Result<AnalystSnapshot, ProviderError> {
        if !body.success {
            return Err(ProviderError::Api {
                status: 200,
                body: body.error.unwrap_or_else(|| format!("no consensus for {ticker}")),
            });
        }
        Ok(AnalystSnapshot {
            ticker: ticker.to_string(),
            as_of: self.clock.now(),
            consensus_eps: body.consensus_eps,
            consensus_revenue: body.consensus_revenue,
            target_price: body.target_price,
            rating: body.rating,
            analyst_count: body.analyst_count,
        })
    }
}

#[async_trait]
impl AnalystProvider for HttpAnalystProvider {
    async fn fetch(&self, ticker: &str) -> Result<AnalystSnapshot, ProviderError> {
        let url = format!("{}/{}", self.api_url, ticker);
        debug!(%ticker, %url, "fetching analyst consensus");

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: ConsensusResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("{ticker}: {e}")))?;

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        self.snapshot_from(ticker, body)
    }
}
