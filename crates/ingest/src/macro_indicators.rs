//! Macro indicators from daily price history.
//!
//! Two series feed the snapshot: the US dollar index and a broad equity
//! index standing in for GDP sentiment. [`HttpMacroProvider`] reads them
//! from a chart API answering `GET {price_url}/{symbol}?range=13mo&interval=1d`
//! with
//!
//! ```json
//! { "chart": { "result": [ { "indicators": { "quote": [ { "close": [103.2, null, 103.9] } ] } } ],
//!              "error": null } }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use sentinel_core::config::MacroConfig;
use sentinel_core::{FlowBias, Level, MacroSnapshot};

use crate::error::ProviderError;
use crate::provider::MacroProvider;

/// Sessions in the dollar trend window.
const DOLLAR_TREND_SESSIONS: usize = 30;
/// Sessions in the equity momentum window.
const EQUITY_TREND_SESSIONS: usize = 60;
/// Percent away from the yearly mean that counts as a strong or weak dollar.
const DOLLAR_BAND_PCT: f64 = 3.0;
const EQUITY_STRONG_PCT: f64 = 8.0;
const EQUITY_WEAK_PCT: f64 = -5.0;

fn pct_change(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

/// Classify two close series, oldest first.
///
/// The dollar series needs at least 30 sessions. A short equity series
/// reads as neutral.
pub fn summarize(as_of: NaiveDate, dollar: &[f64], equity: &[f64]) -> Result<MacroSnapshot, ProviderError> {
    if dollar.len() < DOLLAR_TREND_SESSIONS {
        return Err(ProviderError::InsufficientData(format!(
            "{} dollar index closes, need {DOLLAR_TREND_SESSIONS}",
            dollar.len()
        )));
    }
    let last = dollar[dollar.len() - 1];

    let trend_start = dollar[dollar.len() - DOLLAR_TREND_SESSIONS];
    let year_avg = dollar.iter().sum::<f64>() / dollar.len() as f64;
    let vs_avg = pct_change(year_avg, last);
    let dollar_strength = if vs_avg > DOLLAR_BAND_PCT {
        Level::Strong
    } else if vs_avg < -DOLLAR_BAND_PCT {
        Level::Weak
    } else {
        Level::Neutral
    };

    let gdp_proxy_trend = if equity.len() < EQUITY_TREND_SESSIONS {
        Level::Neutral
    } else {
        let change = pct_change(equity[equity.len() - EQUITY_TREND_SESSIONS], equity[equity.len() - 1]);
        if change > EQUITY_STRONG_PCT {
            Level::Strong
        } else if change < EQUITY_WEAK_PCT {
            Level::Weak
        } else {
            Level::Neutral
        }
    };

    Ok(MacroSnapshot {
        as_of,
        dollar_index: last,
        dollar_30d_change: pct_change(trend_start, last),
        dollar_vs_year_avg: vs_avg,
        dollar_strength,
        gdp_proxy_trend,
        equity_flow_bias: FlowBias::from_dollar(dollar_strength),
    })
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Closes, oldest first, with gaps and non-positive values dropped.
fn closes(symbol: &str, body: ChartResponse) -> Result<Vec<f64>, ProviderError> {
    if let Some(err) = body.chart.error {
        return Err(ProviderError::Api {
            status: 200,
            body: format!("{symbol}: {} {}", err.code, err.description.unwrap_or_default()),
        });
    }
    let quote = body
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .and_then(|result| result.indicators.quote.into_iter().next())
        .ok_or_else(|| ProviderError::Parse(format!("{symbol}: no quote series")))?;
    Ok(quote
        .close
        .into_iter()
        .flatten()
        .filter(|c| c.is_finite() && *c > 0.0)
        .collect())
}

pub struct HttpMacroProvider {
    client: reqwest::Client,
    price_url: String,
    dollar_symbol: String,
    equity_symbol: String,
    request_delay: Duration,
}

impl HttpMacroProvider {
    pub fn new(config: &MacroConfig) -> Result<Self, ProviderError> {
        let price_url = config
            .price_url
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("MACRO_PRICE_URL is not set".into()))?
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?,
            price_url,
            dollar_symbol: config.dollar_symbol.clone(),
            equity_symbol: config.equity_symbol.clone(),
            request_delay: Duration::from_millis(config.request_delay_ms),
        })
    }

    async fn history(&self, symbol: &str) -> Result<Vec<f64>, ProviderError> {
        let url = format!("{}/{}", self.price_url, symbol);
        debug!(%symbol, %url, "fetching price history");

        let response = self
            .client
            .get(&url)
            .query(&[("range", "13mo"), ("interval", "1d")])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("{symbol}: {e}")))?;
        closes(symbol, body)
    }
}

#[async_trait]
impl MacroProvider for HttpMacroProvider {
    async fn fetch(&self, as_of: NaiveDate) -> Result<MacroSnapshot, ProviderError> {
        let dollar = self.history(&self.dollar_symbol).await?;
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        let equity = self.history(&self.equity_symbol).await?;
        summarize(as_of, &dollar, &equity)
    }
}
