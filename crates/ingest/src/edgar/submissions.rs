use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use sentinel_core::config::EdgarConfig;
use sentinel_core::{pad_cik, Company, FilingRecord};

use super::{build_client, pause, wanted_form, NO_TRACKED_COMPANIES};
use crate::error::ProviderError;
use crate::provider::{FilingProvider, FilingQuery};
use crate::repository::SharedRepository;

/// `GET {data_url}/submissions/CIK##########.json` response, trimmed to
/// what ingestion reads. `filings.recent` is columnar: index `i` of each
/// array describes the same filing.
#[derive(Debug, Deserialize)]
struct Submissions {
    name: Option<String>,
    filings: SubmissionFilings,
}

#[derive(Debug, Deserialize)]
struct SubmissionFilings {
    recent: RecentFilings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecentFilings {
    accession_number: Vec<String>,
    form: Vec<String>,
    filing_date: Vec<String>,
    #[serde(default)]
    report_date: Vec<String>,
}

/// Primary filings feed: the per-company submissions API.
pub struct EdgarSubmissionsProvider {
    client: reqwest::Client,
    data_url: String,
    form_types: Vec<String>,
    request_delay: Duration,
    repository: SharedRepository,
}

impl EdgarSubmissionsProvider {
    /// Companies to poll come from `repository` at fetch time.
    pub fn new(config: &EdgarConfig, repository: SharedRepository) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(config)?,
            data_url: config.data_url.trim_end_matches('/').to_string(),
            form_types: config.form_types.clone(),
            request_delay: Duration::from_millis(config.request_delay_ms),
            repository,
        })
    }

    fn submissions_url(&self, cik: &str) -> String {
        format!("{}/submissions/CIK{}.json", self.data_url, pad_cik(cik))
    }

    async fn fetch_company(
        &self,
        company: &Company,
        query: &FilingQuery,
    ) -> Result<Vec<FilingRecord>, ProviderError> {
        let url = self.submissions_url(&company.cik);
        debug!(ticker = %company.ticker, %url, "fetching EDGAR submissions");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let submissions: Submissions = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("{}: {e}", company.ticker)))?;
        Ok(recent_filings(company, submissions, query, &self.form_types))
    }
}

/// Flatten the columnar `recent` block into records inside the query window.
fn recent_filings(
    company: &Company,
    submissions: Submissions,
    query: &FilingQuery,
    form_types: &[String],
) -> Vec<FilingRecord> {
    let recent = submissions.filings.recent;
    let company_name = submissions.name.or_else(|| company.name.clone());

    recent
        .accession_number
        .into_iter()
        .zip(recent.form)
        .zip(recent.filing_date)
        .enumerate()
        .filter_map(|(i, ((accession_number, form), filing_date))| {
            if !wanted_form(form_types, &form) {
                return None;
            }
            let filing_date = NaiveDate::parse_from_str(&filing_date, "%Y-%m-%d").ok()?;
            if !query.covers(filing_date) {
                return None;
            }
            let report_date = recent
                .report_date
                .get(i)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            Some(FilingRecord {
                accession_number,
                ticker: company.ticker.clone(),
                cik: pad_cik(&company.cik),
                company_name: company_name.clone(),
                filing_type: form,
                filing_date,
                report_date,
            })
        })
        .collect()
}

#[async_trait]
impl FilingProvider for EdgarSubmissionsProvider {
    async fn fetch(&self, query: &FilingQuery) -> Result<Vec<FilingRecord>, ProviderError> {
        let companies = self
            .repository
            .list_companies()
            .await
            .map_err(|e| ProviderError::NotConfigured(format!("cannot list tracked companies: {e}")))?;
        if companies.is_empty() {
            return Err(ProviderError::NotConfigured(NO_TRACKED_COMPANIES.into()));
        }

        let mut records = Vec::new();
        let mut failures = 0usize;
        let mut last_error = None;

        for (i, company) in companies.iter().enumerate() {
            if i > 0 {
                pause(self.request_delay).await;
            }
            match self.fetch_company(company, query).await {
                Ok(mut found) => records.append(&mut found),
                Err(e) => {
                    warn!(ticker = %company.ticker, error = %e, "EDGAR submissions fetch failed");
                    failures += 1;
                    last_error = Some(e.to_string());
                }
            }
        }

        if failures == companies.len() {
            return Err(ProviderError::AllRequestsFailed {
                attempted: failures,
                last: last_error.unwrap_or_default(),
            });
        }

        debug!(
            query = query.kind(),
            companies = companies.len(),
            failures,
            records = records.len(),
            "EDGAR submissions fetched"
        );
        Ok(records)
    }

    fn name(&self) -> &str {
        "edgar-submissions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const FIXTURE: &str = r#"{
        "cik": "320193",
        "name": "Apple Inc.",
        "filings": {
            "recent": {
                "accessionNumber": ["0000320193-24-000010", "0000320193-24-000009", "0000320193-24-000006", "0000320193-23-000106"],
                "form": ["8-K", "4", "10-Q", "10-K"],
                "filingDate": ["2024-03-04", "2024-03-01", "2024-02-02", "2023-11-03"],
                "reportDate": ["2024-03-01", "", "2023-12-30", "2023-09-30"]
            }
        }
    }"#;

    fn apple() -> Company {
        Company {
            id: Uuid::new_v4(),
            ticker: "AAPL".into(),
            cik: "320193".into(),
            name: None,
        }
    }

    fn forms() -> Vec<String> {
        vec!["10-K".into(), "10-Q".into(), "8-K".into()]
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn recent_window_keeps_wanted_forms() {
        let submissions: Submissions = serde_json::from_str(FIXTURE).unwrap();
        let records = recent_filings(
            &apple(),
            submissions,
            &FilingQuery::Recent { since: d(2024, 3, 1) },
            &forms(),
        );
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.accession_number, "0000320193-24-000010");
        assert_eq!(r.filing_type, "8-K");
        assert_eq!(r.cik, "0000320193");
        assert_eq!(r.company_name.as_deref(), Some("Apple Inc."));
        assert_eq!(r.report_date, Some(d(2024, 3, 1)));
    }

    #[test]
    fn range_window_spans_backfill() {
        let submissions: Submissions = serde_json::from_str(FIXTURE).unwrap();
        let records = recent_filings(
            &apple(),
            submissions,
            &FilingQuery::Range { since: d(2023, 11, 1), until: d(2024, 2, 29) },
            &forms(),
        );
        let accessions: Vec<_> = records.iter().map(|r| r.accession_number.as_str()).collect();
        assert_eq!(accessions, vec!["0000320193-24-000006", "0000320193-23-000106"]);
    }

    fn config() -> EdgarConfig {
        EdgarConfig {
            user_agent: "sentinel test@example.com".into(),
            data_url: "https://data.sec.gov/".into(),
            archive_url: "https://www.sec.gov/Archives".into(),
            request_delay_ms: 0,
            form_types: forms(),
            recent_days: 2,
        }
    }

    #[test]
    fn url_uses_ten_digit_cik() {
        let repo = std::sync::Arc::new(crate::memory::InMemoryFilingRepository::new());
        let provider = EdgarSubmissionsProvider::new(&config(), repo).unwrap();
        assert_eq!(
            provider.submissions_url("320193"),
            "https://data.sec.gov/submissions/CIK0000320193.json"
        );
    }

    #[tokio::test]
    async fn empty_universe_is_an_error_not_an_empty_result() {
        let repo = std::sync::Arc::new(crate::memory::InMemoryFilingRepository::new());
        let provider = EdgarSubmissionsProvider::new(&config(), repo).unwrap();
        let err = provider
            .fetch(&FilingQuery::Recent { since: d(2024, 3, 4) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(msg) if msg.contains("company-universe")));
    }
}
