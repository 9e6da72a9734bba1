use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use sentinel_core::{AnalystSnapshot, FilingRecord, MacroSnapshot};

use crate::error::ProviderError;

/// What a filing provider is asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilingQuery {
    /// Everything filed on or after `since`.
    Recent { since: NaiveDate },
    /// Backfill window, both ends inclusive.
    Range { since: NaiveDate, until: NaiveDate },
    /// One day's published index.
    DailyIndex { date: NaiveDate },
}

impl FilingQuery {
    /// Whether a filing dated `date` falls inside this query's window.
    pub fn covers(&self, date: NaiveDate) -> bool {
        match *self {
            FilingQuery::Recent { since } => date >= since,
            FilingQuery::Range { since, until } => date >= since && date <= until,
            FilingQuery::DailyIndex { date: day } => date == day,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FilingQuery::Recent { .. } => "recent",
            FilingQuery::Range { .. } => "range",
            FilingQuery::DailyIndex { .. } => "daily_index",
        }
    }
}

/// A source of filing records. Must have no side effects on failure.
#[async_trait]
pub trait FilingProvider: Send + Sync {
    async fn fetch(&self, query: &FilingQuery) -> Result<Vec<FilingRecord>, ProviderError>;

    fn name(&self) -> &str;
}

pub type SharedFilingProvider = Arc<dyn FilingProvider>;

/// A source of analyst consensus figures.
#[async_trait]
pub trait AnalystProvider: Send + Sync {
    async fn fetch(&self, ticker: &str) -> Result<AnalystSnapshot, ProviderError>;
}

pub type SharedAnalystProvider = Arc<dyn AnalystProvider>;

/// An issuer a universe source says should be tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedCompany {
    pub ticker: String,
    pub cik: String,
    pub name: Option<String>,
}

/// A source of the set of companies to track.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    async fn fetch(&self) -> Result<Vec<ListedCompany>, ProviderError>;

    fn name(&self) -> &str;
}

pub type SharedUniverseProvider = Arc<dyn UniverseProvider>;

/// A source of market-wide indicators.
#[async_trait]
pub trait MacroProvider: Send + Sync {
    async fn fetch(&self, as_of: NaiveDate) -> Result<MacroSnapshot, ProviderError>;
}

pub type SharedMacroProvider = Arc<dyn MacroProvider>;

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn query_windows() {
        let recent = FilingQuery::Recent { since: d(2024, 3, 2) };
        assert!(recent.covers(d(2024, 3, 2)));
        assert!(recent.covers(d(2024, 3, 4)));
        assert!(!recent.covers(d(2024, 3, 1)));

        let range = FilingQuery::Range { since: d(2024, 2, 1), until: d(2024, 2, 29) };
        assert!(range.covers(d(2024, 2, 29)));
        assert!(!range.covers(d(2024, 3, 1)));

        let index = FilingQuery::DailyIndex { date: d(2024, 3, 1) };
        assert!(index.covers(d(2024, 3, 1)));
        assert!(!index.covers(d(2024, 3, 4)));
        assert_eq!(index.kind(), "daily_index");
    }
}
