//! The `daily-filings` job.
//!
//! One invocation:
//! 1. seeds the tracked companies from the universe source if none exist
//! 2. picks daily or catch-up mode from the newest stored filing
//! 3. in catch-up mode, backfills from the primary feed
//! 4. always runs the daily fetch: primary "recent" records, plus the
//!    secondary daily index for the previous business day on weekdays
//! 5. merges everything by accession number (daily over backfill,
//!    primary over secondary)
//! 6. upserts each record, isolating per-record failures
//! 7. invalidates derived state for issuers that received new filings

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde_json::json;
use tracing::{debug, info, warn};

use sentinel_core::config::{EdgarConfig, IngestConfig};
use sentinel_core::{
    is_weekday, previous_business_day, CompanyId, FilingRecord, JobMetrics, SharedClock,
    DAILY_FILINGS_JOB,
};
use sentinel_jobs::{Job, JobError};

use crate::error::{IngestError, RepositoryError};
use crate::invalidate::SharedInvalidator;
use crate::merge::merge;
use crate::mode::{select_mode, IngestionMode};
use crate::provider::{FilingQuery, SharedFilingProvider, SharedUniverseProvider};
use crate::repository::{SharedRepository, UpsertOutcome};
use crate::universe::sync_universe;

/// Counters written to the run's ledger row.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FilingsRunStats {
    pub tracked_companies: usize,
    pub companies_registered: usize,
    pub fetched: usize,
    pub stored: usize,
    pub updated: usize,
    pub errors: usize,
    pub provider_errors: usize,
    pub companies_invalidated: usize,
}

pub struct DailyFilingsJob {
    primary: SharedFilingProvider,
    secondary: Option<SharedFilingProvider>,
    universe: Option<SharedUniverseProvider>,
    repository: SharedRepository,
    invalidator: SharedInvalidator,
    clock: SharedClock,
    ingest: IngestConfig,
    recent_days: u32,
}

impl DailyFilingsJob {
    pub fn new(
        primary: SharedFilingProvider,
        repository: SharedRepository,
        invalidator: SharedInvalidator,
        clock: SharedClock,
    ) -> Self {
        Self {
            primary,
            secondary: None,
            universe: None,
            repository,
            invalidator,
            clock,
            ingest: IngestConfig::default(),
            recent_days: 2,
        }
    }

    /// Consult `secondary` for the previous business day on weekdays.
    pub fn with_secondary(mut self, secondary: SharedFilingProvider) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Seed tracked companies from `universe` when the repository has none.
    pub fn with_universe(mut self, universe: SharedUniverseProvider) -> Self {
        self.universe = Some(universe);
        self
    }

    pub fn with_config(mut self, ingest: &IngestConfig, edgar: &EdgarConfig) -> Self {
        self.ingest = ingest.clone();
        self.recent_days = edgar.recent_days;
        self
    }

    /// Fetch from one provider, counting rather than raising failures.
    async fn fetch_counted(
        &self,
        provider: &SharedFilingProvider,
        query: FilingQuery,
        stats: &mut FilingsRunStats,
    ) -> Vec<FilingRecord> {
        match provider.fetch(&query).await {
            Ok(records) => {
                debug!(
                    provider = provider.name(),
                    query = query.kind(),
                    records = records.len(),
                    "provider fetch complete"
                );
                records
            }
            Err(e) => {
                warn!(
                    provider = provider.name(),
                    query = query.kind(),
                    error = %e,
                    "provider fetch failed; continuing without it"
                );
                stats.provider_errors += 1;
                Vec::new()
            }
        }
    }

    async fn store(&self, record: &FilingRecord) -> Result<(CompanyId, UpsertOutcome), RepositoryError> {
        let company = self
            .repository
            .find_or_create_company(&record.ticker, &record.cik, record.company_name.as_deref())
            .await?;
        let outcome = self.repository.upsert_filing(company.id, record).await?;
        Ok((company.id, outcome))
    }

    /// Count tracked companies, seeding them first on an empty repository.
    ///
    /// A failed or missing seed is a provider error for the run: without
    /// companies the filing providers have nothing to poll.
    async fn ensure_tracked(&self, stats: &mut FilingsRunStats) -> Result<(), IngestError> {
        stats.tracked_companies = self.repository.list_companies().await?.len();
        if stats.tracked_companies > 0 {
            return Ok(());
        }

        match &self.universe {
            Some(universe) => match sync_universe(universe, &self.repository).await {
                Ok(sync) => {
                    stats.companies_registered = sync.registered;
                    stats.tracked_companies = self.repository.list_companies().await?.len();
                }
                Err(e) => {
                    warn!(provider = universe.name(), error = %e, "company universe seed failed");
                    stats.provider_errors += 1;
                }
            },
            None => warn!("no tracked companies and no universe source configured"),
        }
        Ok(())
    }

    /// Run the pipeline and return the mode and counters.
    pub async fn ingest(&self) -> Result<(IngestionMode, FilingsRunStats), IngestError> {
        let today = self.clock.today();
        let mut stats = FilingsRunStats::default();
        self.ensure_tracked(&mut stats).await?;

        let latest = self.repository.find_latest_filing().await?;
        let mode = select_mode(latest.map(|f| f.filing_date), today, &self.ingest);
        info!(mode = mode.as_str(), backfill_since = ?mode.backfill_since(), "filings ingestion starting");

        let backfill = match mode {
            IngestionMode::CatchUp { since } => {
                let until = today - Duration::days(1);
                if since <= until {
                    self.fetch_counted(&self.primary, FilingQuery::Range { since, until }, &mut stats)
                        .await
                } else {
                    Vec::new()
                }
            }
            IngestionMode::Daily => Vec::new(),
        };

        let daily = self.fetch_daily(today, &mut stats).await;
        let records = merge(daily, backfill);
        stats.fetched = records.len();

        let mut affected: BTreeSet<CompanyId> = BTreeSet::new();
        for record in &records {
            match self.store(record).await {
                Ok((company_id, outcome)) if outcome.is_new => {
                    stats.stored += 1;
                    affected.insert(company_id);
                }
                Ok(_) => stats.updated += 1,
                Err(e) => {
                    warn!(
                        accession = %record.accession_number,
                        ticker = %record.ticker,
                        error = %e,
                        "failed to store filing"
                    );
                    stats.errors += 1;
                }
            }
        }

        if !affected.is_empty() {
            self.invalidator.invalidate(&affected).await;
            stats.companies_invalidated = affected.len();
        }

        info!(
            mode = mode.as_str(),
            tracked_companies = stats.tracked_companies,
            fetched = stats.fetched,
            stored = stats.stored,
            updated = stats.updated,
            errors = stats.errors,
            provider_errors = stats.provider_errors,
            "filings ingestion finished"
        );
        Ok((mode, stats))
    }

    async fn fetch_daily(&self, today: NaiveDate, stats: &mut FilingsRunStats) -> Vec<FilingRecord> {
        let since = today - Duration::days(i64::from(self.recent_days));
        let primary = self
            .fetch_counted(&self.primary, FilingQuery::Recent { since }, stats)
            .await;

        let secondary = match &self.secondary {
            Some(provider) if is_weekday(today) => {
                let date = previous_business_day(today);
                self.fetch_counted(provider, FilingQuery::DailyIndex { date }, stats)
                    .await
            }
            _ => Vec::new(),
        };

        merge(primary, secondary)
    }
}

#[async_trait]
impl Job for DailyFilingsJob {
    fn name(&self) -> &str {
        DAILY_FILINGS_JOB
    }

    async fn execute(&self) -> Result<JobMetrics, JobError> {
        let (mode, stats) = self.ingest().await?;

        let mut metrics = JobMetrics::new();
        metrics.insert("mode".into(), json!(mode.as_str()));
        metrics.insert("tracked_companies".into(), json!(stats.tracked_companies));
        metrics.insert("companies_registered".into(), json!(stats.companies_registered));
        metrics.insert("fetched".into(), json!(stats.fetched));
        metrics.insert("stored".into(), json!(stats.stored));
        metrics.insert("updated".into(), json!(stats.updated));
        metrics.insert("errors".into(), json!(stats.errors));
        metrics.insert("provider_errors".into(), json!(stats.provider_errors));
        metrics.insert("companies_invalidated".into(), json!(stats.companies_invalidated));
        if let Some(since) = mode.backfill_since() {
            metrics.insert("backfill_since".into(), json!(since.to_string()));
        }
        Ok(metrics)
    }
}
