//! Filing, analyst and macro-indicator ingestion.
//!
//! Provider adapters fetch records, [`merge`] dedupes filings by accession
//! number, a [`FilingRepository`] persists them, and a [`CacheInvalidator`]
//! clears derived state for issuers that received new data. The
//! ledger-tracked jobs built from these pieces are [`DailyFilingsJob`],
//! [`AnalystDataJob`], [`MacroIndicatorsJob`] and [`CompanyUniverseJob`].

pub mod analyst;
pub mod analyst_job;
pub mod edgar;
pub mod error;
pub mod filings_job;
pub mod invalidate;
pub mod macro_indicators;
pub mod macro_job;
pub mod memory;
pub mod merge;
pub mod mode;
pub mod postgres;
pub mod provider;
pub mod repository;
pub mod universe;

pub use analyst::HttpAnalystProvider;
pub use analyst_job::AnalystDataJob;
pub use edgar::{EdgarCompanyTickersProvider, EdgarDailyIndexProvider, EdgarSubmissionsProvider};
pub use error::{IngestError, ProviderError, RepositoryError};
pub use filings_job::{DailyFilingsJob, FilingsRunStats};
pub use invalidate::{
    CacheInvalidator, PgPredictionInvalidator, RecordingInvalidator, SharedInvalidator,
};
pub use macro_indicators::HttpMacroProvider;
pub use macro_job::{MacroIndicatorsJob, MacroRefresh};
pub use memory::InMemoryFilingRepository;
pub use merge::merge;
pub use mode::{select_mode, IngestionMode};
pub use postgres::PgFilingRepository;
pub use provider::{
    AnalystProvider, FilingProvider, FilingQuery, ListedCompany, MacroProvider,
    SharedAnalystProvider, SharedFilingProvider, SharedMacroProvider, SharedUniverseProvider,
    UniverseProvider,
};
pub use repository::{FilingRepository, SharedRepository, UpsertOutcome};
pub use universe::{sync_universe, CompanyUniverseJob, UniverseSync};
