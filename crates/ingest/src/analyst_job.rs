//! The `analyst-data` job: refresh consensus figures for every tracked
//! company and invalidate predictions where they moved.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use sentinel_core::{CompanyId, JobMetrics, ANALYST_DATA_JOB};
use sentinel_jobs::{Job, JobError};

use crate::invalidate::SharedInvalidator;
use crate::provider::SharedAnalystProvider;
use crate::repository::SharedRepository;

pub struct AnalystDataJob {
    provider: SharedAnalystProvider,
    repository: SharedRepository,
    invalidator: SharedInvalidator,
}

impl AnalystDataJob {
    pub fn new(
        provider: SharedAnalystProvider,
        repository: SharedRepository,
        invalidator: SharedInvalidator,
    ) -> Self {
        Self {
            provider,
            repository,
            invalidator,
        }
    }
}

#[async_trait]
impl Job for AnalystDataJob {
    fn name(&self) -> &str {
        ANALYST_DATA_JOB
    }

    async fn execute(&self) -> Result<JobMetrics, JobError> {
        let companies = self
            .repository
            .list_companies()
            .await
            .map_err(JobError::execution)?;

        let mut fetched = 0usize;
        let mut unchanged = 0usize;
        let mut errors = 0usize;
        let mut provider_errors = 0usize;
        let mut changed: BTreeSet<CompanyId> = BTreeSet::new();

        for company in &companies {
            let snapshot = match self.provider.fetch(&company.ticker).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(ticker = %company.ticker, error = %e, "analyst fetch failed");
                    provider_errors += 1;
                    continue;
                }
            };
            fetched += 1;

            match self
                .repository
                .upsert_analyst_snapshot(company.id, &snapshot)
                .await
            {
                Ok(true) => {
                    changed.insert(company.id);
                }
                Ok(false) => unchanged += 1,
                Err(e) => {
                    warn!(ticker = %company.ticker, error = %e, "failed to store analyst snapshot");
                    errors += 1;
                }
            }
        }

        if !changed.is_empty() {
            self.invalidator.invalidate(&changed).await;
        }

        info!(
            companies = companies.len(),
            fetched,
            updated = changed.len(),
            unchanged,
            errors,
            provider_errors,
            "analyst data refresh finished"
        );

        let mut metrics = JobMetrics::new();
        metrics.insert("companies".into(), json!(companies.len()));
        metrics.insert("fetched".into(), json!(fetched));
        metrics.insert("updated".into(), json!(changed.len()));
        metrics.insert("unchanged".into(), json!(unchanged));
        metrics.insert("errors".into(), json!(errors));
        metrics.insert("provider_errors".into(), json!(provider_errors));
        metrics.insert("companies_invalidated".into(), json!(changed.len()));
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use sentinel_core::AnalystSnapshot;

    use crate::error::ProviderError;
    use crate::invalidate::RecordingInvalidator;
    use crate::memory::InMemoryFilingRepository;
    use crate::provider::AnalystProvider;

    struct TableProvider {
        eps: HashMap<String, f64>,
    }

    #[async_trait]
    impl AnalystProvider for TableProvider {
        async fn fetch(&self, ticker: &str) -> Result<AnalystSnapshot, ProviderError> {
            let eps = self.eps.get(ticker).copied().ok_or_else(|| ProviderError::Api {
                status: 404,
                body: format!("unknown ticker {ticker}"),
            })?;
            Ok(AnalystSnapshot {
                ticker: ticker.to_string(),
                as_of: Utc.with_ymd_and_hms(2024, 3, 4, 21, 0, 0).unwrap(),
                consensus_eps: Some(eps),
                consensus_revenue: None,
                target_price: None,
                rating: Some("hold".into()),
                analyst_count: Some(12),
            })
        }
    }

    #[tokio::test]
    async fn invalidates_only_changed_companies() {
        let repo = Arc::new(InMemoryFilingRepository::new());
        let aapl = repo.add_company("AAPL", "320193");
        let msft = repo.add_company("MSFT", "789019");
        repo.add_company("GONE", "1");
        let invalidator = Arc::new(RecordingInvalidator::new());

        let provider = Arc::new(TableProvider {
            eps: HashMap::from([("AAPL".to_string(), 1.5), ("MSFT".to_string(), 2.9)]),
        });
        let job = AnalystDataJob::new(provider, repo.clone(), invalidator.clone());

        let first = job.execute().await.unwrap();
        assert_eq!(first["fetched"], 2);
        assert_eq!(first["updated"], 2);
        assert_eq!(first["provider_errors"], 1);
        assert_eq!(invalidator.calls(), vec![BTreeSet::from([aapl.id, msft.id])]);
        assert_eq!(repo.snapshot(aapl.id).unwrap().consensus_eps, Some(1.5));

        let second = job.execute().await.unwrap();
        assert_eq!(second["updated"], 0);
        assert_eq!(second["unchanged"], 2);
        assert_eq!(invalidator.calls().len(), 1);
    }

    #[tokio::test]
    async fn name_matches_ledger_key() {
        let job = AnalystDataJob::new(
            Arc::new(TableProvider { eps: HashMap::new() }),
            Arc::new(InMemoryFilingRepository::new()),
            Arc::new(RecordingInvalidator::new()),
        );
        assert_eq!(job.name(), "analyst-data");
        let metrics = job.execute().await.unwrap();
        assert_eq!(metrics["companies"], 0);
    }
}
