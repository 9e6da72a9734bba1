//! The set of tracked companies.
//!
//! Filing providers only poll companies already in the repository, so a
//! fresh database tracks nothing until the universe is synced once. The
//! `company-universe` job refreshes it, and [`DailyFilingsJob`] seeds it
//! inline when it finds the repository empty.
//!
//! [`DailyFilingsJob`]: crate::DailyFilingsJob

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use sentinel_core::{JobMetrics, COMPANY_UNIVERSE_JOB};
use sentinel_jobs::{Job, JobError};

use crate::error::{IngestError, ProviderError};
use crate::provider::SharedUniverseProvider;
use crate::repository::SharedRepository;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UniverseSync {
    pub listed: usize,
    /// Companies that were not tracked before this sync.
    pub registered: usize,
    pub errors: usize,
}

/// Register every listed company. Existing companies keep their id and
/// pick up a newer name.
///
/// Fails when the provider fails or lists nothing; an empty listing would
/// otherwise look like a successful sync of zero companies.
pub async fn sync_universe(
    provider: &SharedUniverseProvider,
    repository: &SharedRepository,
) -> Result<UniverseSync, IngestError> {
    let listed = provider.fetch().await?;
    if listed.is_empty() {
        return Err(ProviderError::InsufficientData(format!(
            "{} listed no companies",
            provider.name()
        ))
        .into());
    }

    let mut sync = UniverseSync {
        listed: listed.len(),
        ..Default::default()
    };
    for company in &listed {
        let known = match repository.find_company_by_ticker(&company.ticker).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(ticker = %company.ticker, error = %e, "company lookup failed");
                sync.errors += 1;
                continue;
            }
        };
        match repository
            .find_or_create_company(&company.ticker, &company.cik, company.name.as_deref())
            .await
        {
            Ok(_) if !known => sync.registered += 1,
            Ok(_) => {}
            Err(e) => {
                warn!(ticker = %company.ticker, error = %e, "failed to register company");
                sync.errors += 1;
            }
        }
    }

    info!(
        provider = provider.name(),
        listed = sync.listed,
        registered = sync.registered,
        errors = sync.errors,
        "company universe synced"
    );
    Ok(sync)
}

/// Ledger-tracked refresh of the tracked-company set.
pub struct CompanyUniverseJob {
    provider: SharedUniverseProvider,
    repository: SharedRepository,
}

impl CompanyUniverseJob {
    pub fn new(provider: SharedUniverseProvider, repository: SharedRepository) -> Self {
        Self {
            provider,
            repository,
        }
    }
}

#[async_trait]
impl Job for CompanyUniverseJob {
    fn name(&self) -> &str {
        COMPANY_UNIVERSE_JOB
    }

    async fn execute(&self) -> Result<JobMetrics, JobError> {
        let sync = sync_universe(&self.provider, &self.repository).await?;
        let tracked = self
            .repository
            .list_companies()
            .await
            .map_err(JobError::execution)?
            .len();

        let mut metrics = JobMetrics::new();
        metrics.insert("listed".into(), json!(sync.listed));
        metrics.insert("registered".into(), json!(sync.registered));
        metrics.insert("errors".into(), json!(sync.errors));
        metrics.insert("tracked_companies".into(), json!(tracked));
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::memory::InMemoryFilingRepository;
    use crate::provider::{ListedCompany, UniverseProvider};

    struct StaticUniverse(Vec<(&'static str, &'static str)>);

    #[async_trait]
    impl UniverseProvider for StaticUniverse {
        async fn fetch(&self) -> Result<Vec<ListedCompany>, ProviderError> {
            Ok(self
                .0
                .iter()
                .map(|(ticker, cik)| ListedCompany {
                    ticker: ticker.to_string(),
                    cik: cik.to_string(),
                    name: Some(format!("{ticker} Corp")),
                })
                .collect())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    struct DownUniverse;

    #[async_trait]
    impl UniverseProvider for DownUniverse {
        async fn fetch(&self) -> Result<Vec<ListedCompany>, ProviderError> {
            Err(ProviderError::Api {
                status: 403,
                body: "Undeclared Automated Tool".into(),
            })
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    #[tokio::test]
    async fn sync_registers_new_companies_once() {
        let repo = Arc::new(InMemoryFilingRepository::new());
        let existing = repo.add_company("AAPL", "0000320193");
        let job = CompanyUniverseJob::new(
            Arc::new(StaticUniverse(vec![("AAPL", "0000320193"), ("MSFT", "0000789019")])),
            repo.clone(),
        );

        let first = job.execute().await.unwrap();
        assert_eq!(first["listed"], 2);
        assert_eq!(first["registered"], 1);
        assert_eq!(first["tracked_companies"], 2);
        assert_eq!(repo.company("AAPL").unwrap().id, existing.id);
        assert_eq!(repo.company("AAPL").unwrap().name.as_deref(), Some("AAPL Corp"));

        let second = job.execute().await.unwrap();
        assert_eq!(second["registered"], 0);
        assert_eq!(repo.company_count(), 2);
    }

    #[tokio::test]
    async fn provider_failure_and_empty_listing_fail_the_run() {
        let repo: SharedRepository = Arc::new(InMemoryFilingRepository::new());

        let err = CompanyUniverseJob::new(Arc::new(DownUniverse), repo.clone())
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Undeclared Automated Tool"));

        let empty: SharedUniverseProvider = Arc::new(StaticUniverse(vec![]));
        match sync_universe(&empty, &repo).await {
            Err(IngestError::Provider(ProviderError::InsufficientData(msg))) => {
                assert!(msg.contains("static"))
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }
}
