use chrono::{Duration, NaiveDate};
use serde::Serialize;

use sentinel_core::config::IngestConfig;

/// How a filings run fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IngestionMode {
    Daily,
    /// Backfill from `since` through yesterday, on top of the daily fetch.
    CatchUp { since: NaiveDate },
}

impl IngestionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionMode::Daily => "daily",
            IngestionMode::CatchUp { .. } => "catch_up",
        }
    }

    pub fn backfill_since(&self) -> Option<NaiveDate> {
        match self {
            IngestionMode::Daily => None,
            IngestionMode::CatchUp { since } => Some(*since),
        }
    }
}

/// Pick the mode from the newest stored filing date.
///
/// Day granularity: a store whose newest filing is more than
/// `catchup_gap_days` days before `today` (or an empty store) needs a
/// backfill. The backfill never reaches further than `catchup_max_days`.
pub fn select_mode(latest: Option<NaiveDate>, today: NaiveDate, config: &IngestConfig) -> IngestionMode {
    let floor = today - Duration::days(i64::from(config.catchup_max_days));
    match latest {
        None => IngestionMode::CatchUp { since: floor },
        Some(date) if (today - date).num_days() > i64::from(config.catchup_gap_days) => {
            IngestionMode::CatchUp {
                since: date.max(floor),
            }
        }
        Some(_) => IngestionMode::Daily,
    }
}
