use std::sync::Arc;

use async_trait::async_trait;

use sentinel_core::{AnalystSnapshot, Company, CompanyId, FilingRecord, MacroSnapshot};

use crate::error::RepositoryError;

/// Result of upserting one filing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// The accession number was not stored before this call.
    pub is_new: bool,
}

/// Issuer and filing store.
#[async_trait]
pub trait FilingRepository: Send + Sync {
    /// The stored filing with the most recent filing date.
    async fn find_latest_filing(&self) -> Result<Option<FilingRecord>, RepositoryError>;

    async fn list_companies(&self) -> Result<Vec<Company>, RepositoryError>;

    async fn find_company_by_ticker(&self, ticker: &str) -> Result<Option<Company>, RepositoryError>;

    /// Look up by ticker, creating the company on first sight.
    async fn find_or_create_company(
        &self,
        ticker: &str,
        cik: &str,
        name: Option<&str>,
    ) -> Result<Company, RepositoryError>;

    /// Insert or update by accession number.
    async fn upsert_filing(
        &self,
        company_id: CompanyId,
        record: &FilingRecord,
    ) -> Result<UpsertOutcome, RepositoryError>;

    /// Store the latest consensus. Returns whether the figures changed.
    async fn upsert_analyst_snapshot(
        &self,
        company_id: CompanyId,
        snapshot: &AnalystSnapshot,
    ) -> Result<bool, RepositoryError>;

    /// The stored macro snapshot with the newest `as_of`.
    async fn latest_macro_snapshot(&self) -> Result<Option<MacroSnapshot>, RepositoryError>;

    /// Store the day's macro snapshot. Returns whether it is new or changed.
    async fn upsert_macro_snapshot(&self, snapshot: &MacroSnapshot) -> Result<bool, RepositoryError>;
}

pub type SharedRepository = Arc<dyn FilingRepository>;
