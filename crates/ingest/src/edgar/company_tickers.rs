use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use sentinel_core::config::{EdgarConfig, UniverseConfig};
use sentinel_core::pad_cik;

use super::build_client;
use crate::error::ProviderError;
use crate::provider::{ListedCompany, UniverseProvider};

/// One entry of `company_tickers.json`. The file is an object keyed by
/// rank ("0", "1", ...), largest issuers first.
#[derive(Debug, Deserialize)]
struct TickerEntry {
    cik_str: u64,
    ticker: String,
    title: String,
}

/// Tracked-company source backed by SEC's ticker listing.
///
/// With an explicit ticker list configured, exactly those tickers are
/// returned; otherwise the `size` highest-ranked issuers.
pub struct EdgarCompanyTickersProvider {
    client: reqwest::Client,
    url: String,
    size: usize,
    tickers: Vec<String>,
}

impl EdgarCompanyTickersProvider {
    pub fn new(edgar: &EdgarConfig, universe: &UniverseConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(edgar)?,
            url: universe.tickers_url.clone(),
            size: universe.size,
            tickers: universe.tickers.clone(),
        })
    }
}

fn select(entries: BTreeMap<String, TickerEntry>, size: usize, wanted: &[String]) -> Vec<ListedCompany> {
    let mut ranked: Vec<(u64, TickerEntry)> = entries
        .into_iter()
        .filter_map(|(rank, entry)| rank.parse().ok().map(|rank| (rank, entry)))
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);

    let wanted: HashSet<String> = wanted.iter().map(|t| t.to_ascii_uppercase()).collect();
    let mut seen = HashSet::new();

    let listed: Vec<ListedCompany> = ranked
        .into_iter()
        .map(|(_, entry)| entry)
        .filter(|entry| wanted.is_empty() || wanted.contains(&entry.ticker.to_ascii_uppercase()))
        .filter(|entry| seen.insert(entry.ticker.to_ascii_uppercase()))
        .map(|entry| ListedCompany {
            ticker: entry.ticker.to_ascii_uppercase(),
            cik: pad_cik(&entry.cik_str.to_string()),
            name: Some(entry.title).filter(|t| !t.trim().is_empty()),
        })
        .take(if wanted.is_empty() { size } else { usize::MAX })
        .collect();

    if !wanted.is_empty() && listed.len() < wanted.len() {
        let found: HashSet<&str> = listed.iter().map(|c| c.ticker.as_str()).collect();
        let mut missing: Vec<&str> = wanted
            .iter()
            .map(String::as_str)
            .filter(|t| !found.contains(t))
            .collect();
        missing.sort_unstable();
        warn!(?missing, "configured tickers not in the SEC listing");
    }
    listed
}

#[async_trait]
impl UniverseProvider for EdgarCompanyTickersProvider {
    async fn fetch(&self) -> Result<Vec<ListedCompany>, ProviderError> {
        debug!(url = %self.url, "fetching SEC company tickers");
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let entries: BTreeMap<String, TickerEntry> = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("company tickers: {e}")))?;
        Ok(select(entries, self.size, &self.tickers))
    }

    fn name(&self) -> &str {
        "edgar-company-tickers"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
        "1": {"cik_str": 789019, "ticker": "MSFT", "title": "MICROSOFT CORP"},
        "2": {"cik_str": 1045810, "ticker": "NVDA", "title": "NVIDIA CORP"},
        "10": {"cik_str": 1652044, "ticker": "GOOG", "title": "Alphabet Inc."},
        "3": {"cik_str": 1652044, "ticker": "GOOGL", "title": "Alphabet Inc."}
    }"#;

    fn listing() -> BTreeMap<String, TickerEntry> {
        serde_json::from_str(LISTING).unwrap()
    }

    fn tickers(listed: &[ListedCompany]) -> Vec<&str> {
        listed.iter().map(|c| c.ticker.as_str()).collect()
    }

    #[test]
    fn top_n_follows_numeric_rank() {
        let listed = select(listing(), 4, &[]);
        // "10" sorts after "3" numerically, not lexically.
        assert_eq!(tickers(&listed), vec!["AAPL", "MSFT", "NVDA", "GOOGL"]);
        assert_eq!(listed[0].cik, "0000320193");
        assert_eq!(listed[0].name.as_deref(), Some("Apple Inc."));
    }

    #[test]
    fn explicit_tickers_override_size() {
        let wanted = vec!["goog".to_string(), "MSFT".to_string(), "ZZZZ".to_string()];
        let listed = select(listing(), 1, &wanted);
        assert_eq!(tickers(&listed), vec!["MSFT", "GOOG"]);
    }
}
