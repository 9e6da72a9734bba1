use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CompanyId = Uuid;

/// A regulatory filing as reported by a data source.
///
/// `accession_number` is globally unique and is the only key used to
/// deduplicate records across sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRecord {
    pub accession_number: String,
    pub ticker: String,
    pub cik: String,
    pub company_name: Option<String>,
    pub filing_type: String,
    pub filing_date: NaiveDate,
    pub report_date: Option<NaiveDate>,
}

impl FilingRecord {
    /// CIK left-padded to the 10 digits EDGAR uses in URLs.
    pub fn padded_cik(&self) -> String {
        pad_cik(&self.cik)
    }
}

/// Left-pad a CIK with zeros to 10 digits.
pub fn pad_cik(cik: &str) -> String {
    let trimmed = cik.trim().trim_start_matches('0');
    format!("{:0>10}", trimmed)
}

/// An issuer, keyed naturally by ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub ticker: String,
    pub cik: String,
    pub name: Option<String>,
}

/// Analyst consensus for one ticker at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystSnapshot {
    pub ticker: String,
    pub as_of: DateTime<Utc>,
    pub consensus_eps: Option<f64>,
    pub consensus_revenue: Option<f64>,
    pub target_price: Option<f64>,
    pub rating: Option<String>,
    pub analyst_count: Option<i32>,
}

impl AnalystSnapshot {
    /// Whether the consensus figures differ, ignoring `as_of`.
    pub fn differs_from(&self, other: &AnalystSnapshot) -> bool {
        self.consensus_eps != other.consensus_eps
            || self.consensus_revenue != other.consensus_revenue
            || self.target_price != other.target_price
            || self.rating != other.rating
            || self.analyst_count != other.analyst_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_cik_normalizes_width() {
        assert_eq!(pad_cik("320193"), "0000320193");
        assert_eq!(pad_cik("0000320193"), "0000320193");
        assert_eq!(pad_cik(" 2488 "), "0000002488");
    }
}
