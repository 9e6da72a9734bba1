use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

use sentinel_core::config::EdgarConfig;
use sentinel_core::{is_weekday, pad_cik, Company, FilingRecord};

use super::{build_client, pause, wanted_form, NO_TRACKED_COMPANIES};
use crate::error::ProviderError;
use crate::provider::{FilingProvider, FilingQuery};
use crate::repository::SharedRepository;

/// Secondary filings feed: the per-day `form.YYYYMMDD.idx` index.
///
/// Covers every filer in one request, which catches filings the
/// submissions API has not surfaced yet.
pub struct EdgarDailyIndexProvider {
    client: reqwest::Client,
    archive_url: String,
    form_types: Vec<String>,
    request_delay: Duration,
    repository: SharedRepository,
}

impl EdgarDailyIndexProvider {
    pub fn new(config: &EdgarConfig, repository: SharedRepository) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config)?,
            archive_url: config.archive_url.trim_end_matches('/').to_string(),
            form_types: config.form_types.clone(),
            request_delay: Duration::from_millis(config.request_delay_ms),
            repository,
        })
    }

    fn index_url(&self, date: NaiveDate) -> String {
        let quarter = (date.month() - 1) / 3 + 1;
        format!(
            "{}/edgar/daily-index/{}/QTR{}/form.{}.idx",
            self.archive_url,
            date.year(),
            quarter,
            date.format("%Y%m%d")
        )
    }

    /// Download one day's index. An unpublished day (404) is empty.
    async fn fetch_index(&self, date: NaiveDate) -> Result<Option<String>, ProviderError> {
        let url = self.index_url(date);
        debug!(%url, "fetching EDGAR daily index");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(%date, "daily index not published");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Some(response.text().await?))
    }
}

/// Parse a `form.idx` body, keeping rows for tracked CIKs and wanted forms.
///
/// Rows follow a dashed separator line. Company names contain spaces, so
/// the fixed trailing columns (CIK, date, file name) are read from the
/// right and the form type is the first token.
fn parse_form_index(
    body: &str,
    tracked: &HashMap<String, Company>,
    form_types: &[String],
) -> Vec<FilingRecord> {
    body.lines()
        .skip_while(|line| !line.starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let mut tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 5 {
                return None;
            }
            let file_name = tokens.pop()?;
            let date = tokens.pop()?;
            let cik = tokens.pop()?;
            let form = tokens.first()?.to_string();
            let company_name = tokens[1..].join(" ");

            if !wanted_form(form_types, &form) {
                return None;
            }
            let company = tracked.get(&pad_cik(cik))?;
            let filing_date = NaiveDate::parse_from_str(date, "%Y%m%d")
                .or_else(|_| NaiveDate::parse_from_str(date, "%Y-%m-%d"))
                .ok()?;
            let accession_number = file_name
                .rsplit('/')
                .next()?
                .trim_end_matches(".txt")
                .to_string();

            Some(FilingRecord {
                accession_number,
                ticker: company.ticker.clone(),
                cik: pad_cik(cik),
                company_name: Some(company_name).filter(|n| !n.is_empty()),
                filing_type: form,
                filing_date,
                report_date: None,
            })
        })
        .collect()
}

#[async_trait]
impl FilingProvider for EdgarDailyIndexProvider {
    async fn fetch(&self, query: &FilingQuery) -> Result<Vec<FilingRecord>, ProviderError> {
        let days: Vec<NaiveDate> = match *query {
            FilingQuery::DailyIndex { date } => vec![date],
            FilingQuery::Range { since, until } => since
                .iter_days()
                .take_while(|d| *d <= until)
                .filter(|d| is_weekday(*d))
                .collect(),
            FilingQuery::Recent { .. } => {
                return Err(ProviderError::UnsupportedQuery {
                    provider: "edgar-daily-index",
                    query: query.kind(),
                })
            }
        };

        let tracked: HashMap<String, Company> = self
            .repository
            .list_companies()
            .await
            .map_err(|e| ProviderError::NotConfigured(format!("cannot list tracked companies: {e}")))?
            .into_iter()
            .map(|c| (pad_cik(&c.cik), c))
            .collect();
        if tracked.is_empty() {
            return Err(ProviderError::NotConfigured(NO_TRACKED_COMPANIES.into()));
        }
        if days.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut failures = 0usize;
        let mut last_error = None;

        for (i, day) in days.iter().enumerate() {
            if i > 0 {
                pause(self.request_delay).await;
            }
            match self.fetch_index(*day).await {
                Ok(Some(body)) => {
                    records.extend(parse_form_index(&body, &tracked, &self.form_types));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(date = %day, error = %e, "EDGAR daily index fetch failed");
                    failures += 1;
                    last_error = Some(e.to_string());
                }
            }
        }

        if failures == days.len() {
            return Err(ProviderError::AllRequestsFailed {
                attempted: failures,
                last: last_error.unwrap_or_default(),
            });
        }
        Ok(records)
    }

    fn name(&self) -> &str {
        "edgar-daily-index"
    }
}
