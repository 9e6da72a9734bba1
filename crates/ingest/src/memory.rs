//! In-memory filing repository for tests and dry runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use indexmap::IndexMap;
use uuid::Uuid;

use sentinel_core::{AnalystSnapshot, Company, CompanyId, FilingRecord, MacroSnapshot};

use crate::error::RepositoryError;
use crate::repository::{FilingRepository, UpsertOutcome};

#[derive(Default)]
struct Store {
    /// Keyed by ticker.
    companies: IndexMap<String, Company>,
    /// Keyed by accession number.
    filings: IndexMap<String, (CompanyId, FilingRecord)>,
    snapshots: HashMap<CompanyId, AnalystSnapshot>,
    macro_snapshots: BTreeMap<NaiveDate, MacroSnapshot>,
    /// Accession numbers whose upsert is rejected.
    rejected: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryFilingRepository {
    store: RwLock<Store>,
}

impl InMemoryFilingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tracked company.
    pub fn add_company(&self, ticker: &str, cik: &str) -> Company {
        let company = Company {
            id: Uuid::new_v4(),
            ticker: ticker.to_string(),
            cik: cik.to_string(),
            name: None,
        };
        self.write()
            .companies
            .insert(ticker.to_string(), company.clone());
        company
    }

    /// Make every upsert of `accession_number` fail with a constraint error.
    pub fn reject(&self, accession_number: &str) {
        self.write().rejected.insert(accession_number.to_string());
    }

    pub fn filing(&self, accession_number: &str) -> Option<FilingRecord> {
        self.read()
            .filings
            .get(accession_number)
            .map(|(_, record)| record.clone())
    }

    pub fn filing_count(&self) -> usize {
        self.read().filings.len()
    }

    pub fn company(&self, ticker: &str) -> Option<Company> {
        self.read().companies.get(ticker).cloned()
    }

    pub fn snapshot(&self, company_id: CompanyId) -> Option<AnalystSnapshot> {
        self.read().snapshots.get(&company_id).cloned()
    }

    pub fn company_count(&self) -> usize {
        self.read().companies.len()
    }

    pub fn macro_snapshot(&self, as_of: NaiveDate) -> Option<MacroSnapshot> {
        self.read().macro_snapshots.get(&as_of).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl FilingRepository for InMemoryFilingRepository {
    async fn find_latest_filing(&self) -> Result<Option<FilingRecord>, RepositoryError> {
        Ok(self
            .read()
            .filings
            .values()
            .map(|(_, record)| record)
            .max_by_key(|record| record.filing_date)
            .cloned())
    }

    async fn list_companies(&self) -> Result<Vec<Company>, RepositoryError> {
        Ok(self.read().companies.values().cloned().collect())
    }

    async fn find_company_by_ticker(&self, ticker: &str) -> Result<Option<Company>, RepositoryError> {
        Ok(self.read().companies.get(ticker).cloned())
    }

    async fn find_or_create_company(
        &self,
        ticker: &str,
        cik: &str,
        name: Option<&str>,
    ) -> Result<Company, RepositoryError> {
        let mut store = self.write();
        let company = store
            .companies
            .entry(ticker.to_string())
            .or_insert_with(|| Company {
                id: Uuid::new_v4(),
                ticker: ticker.to_string(),
                cik: cik.to_string(),
                name: None,
            });
        if let Some(name) = name {
            company.name = Some(name.to_string());
        }
        Ok(company.clone())
    }

    async fn upsert_filing(
        &self,
        company_id: CompanyId,
        record: &FilingRecord,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let mut store = self.write();
        if store.rejected.contains(&record.accession_number) {
            return Err(RepositoryError::Constraint(format!(
                "filing {} rejected",
                record.accession_number
            )));
        }
        let previous = store
            .filings
            .insert(record.accession_number.clone(), (company_id, record.clone()));
        Ok(UpsertOutcome {
            is_new: previous.is_none(),
        })
    }

    async fn upsert_analyst_snapshot(
        &self,
        company_id: CompanyId,
        snapshot: &AnalystSnapshot,
    ) -> Result<bool, RepositoryError> {
        let previous = self
            .write()
            .snapshots
            .insert(company_id, snapshot.clone());
        Ok(previous.map_or(true, |prev| snapshot.differs_from(&prev)))
    }

    async fn latest_macro_snapshot(&self) -> Result<Option<MacroSnapshot>, RepositoryError> {
        Ok(self.read().macro_snapshots.values().next_back().cloned())
    }

    async fn upsert_macro_snapshot(&self, snapshot: &MacroSnapshot) -> Result<bool, RepositoryError> {
        let previous = self
            .write()
            .macro_snapshots
            .insert(snapshot.as_of, snapshot.clone());
        Ok(previous.as_ref() != Some(snapshot))
    }
}
