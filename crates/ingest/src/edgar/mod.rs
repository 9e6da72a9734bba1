//! SEC EDGAR adapters.
//!
//! EDGAR requires a descriptive `User-Agent` and allows at most ten
//! requests per second, so every provider here builds the same configured
//! client and pauses between requests.

mod company_tickers;
mod daily_index;
mod submissions;

pub use company_tickers::EdgarCompanyTickersProvider;
pub use daily_index::EdgarDailyIndexProvider;
pub use submissions::EdgarSubmissionsProvider;

use std::time::Duration;

use sentinel_core::config::EdgarConfig;

use crate::error::ProviderError;

const NO_TRACKED_COMPANIES: &str = "no tracked companies; run the company-universe job";

fn build_client(config: &EdgarConfig) -> Result<reqwest::Client, ProviderError> {
    if config.user_agent.trim().is_empty() {
        return Err(ProviderError::NotConfigured(
            "EDGAR_USER_AGENT must be set".to_string(),
        ));
    }
    Ok(reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(30))
        .build()?)
}

fn wanted_form(form_types: &[String], form: &str) -> bool {
    form_types.is_empty() || form_types.iter().any(|f| f.eq_ignore_ascii_case(form))
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
