//! PostgreSQL filing repository over the `companies`, `filings`,
//! `analyst_snapshots` and `macro_snapshots` tables.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use sentinel_core::{AnalystSnapshot, Company, CompanyId, FilingRecord, MacroSnapshot};

use crate::error::RepositoryError;
use crate::repository::{FilingRepository, UpsertOutcome};

#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    ticker: String,
    cik: String,
    name: Option<String>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: row.id,
            ticker: row.ticker,
            cik: row.cik,
            name: row.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FilingRow {
    accession_number: String,
    ticker: String,
    cik: String,
    company_name: Option<String>,
    filing_type: String,
    filing_date: NaiveDate,
    report_date: Option<NaiveDate>,
}

impl From<FilingRow> for FilingRecord {
    fn from(row: FilingRow) -> Self {
        FilingRecord {
            accession_number: row.accession_number,
            ticker: row.ticker,
            cik: row.cik,
            company_name: row.company_name,
            filing_type: row.filing_type,
            filing_date: row.filing_date,
            report_date: row.report_date,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    as_of: DateTime<Utc>,
    consensus_eps: Option<f64>,
    consensus_revenue: Option<f64>,
    target_price: Option<f64>,
    rating: Option<String>,
    analyst_count: Option<i32>,
}

impl SnapshotRow {
    fn into_snapshot(self, ticker: &str) -> AnalystSnapshot {
        AnalystSnapshot {
            ticker: ticker.to_string(),
            as_of: self.as_of,
            consensus_eps: self.consensus_eps,
            consensus_revenue: self.consensus_revenue,
            target_price: self.target_price,
            rating: self.rating,
            analyst_count: self.analyst_count,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MacroRow {
    as_of: NaiveDate,
    dollar_index: f64,
    dollar_30d_change: f64,
    dollar_vs_year_avg: f64,
    dollar_strength: String,
    gdp_proxy_trend: String,
    equity_flow_bias: String,
}

impl TryFrom<MacroRow> for MacroSnapshot {
    type Error = RepositoryError;

    fn try_from(row: MacroRow) -> Result<Self, Self::Error> {
        let decode = |e: sentinel_core::SentinelError| RepositoryError::Decode(e.to_string());
        Ok(MacroSnapshot {
            as_of: row.as_of,
            dollar_index: row.dollar_index,
            dollar_30d_change: row.dollar_30d_change,
            dollar_vs_year_avg: row.dollar_vs_year_avg,
            dollar_strength: row.dollar_strength.parse().map_err(decode)?,
            gdp_proxy_trend: row.gdp_proxy_trend.parse().map_err(decode)?,
            equity_flow_bias: row.equity_flow_bias.parse().map_err(decode)?,
        })
    }
}

const MACRO_COLUMNS: &str = "as_of, dollar_index, dollar_30d_change, dollar_vs_year_avg, \
                             dollar_strength, gdp_proxy_trend, equity_flow_bias";

/// Map unique/foreign-key violations to [`RepositoryError::Constraint`].
fn classify(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() {
            return RepositoryError::Constraint(db.message().to_string());
        }
    }
    RepositoryError::Database(err)
}

#[derive(Clone)]
pub struct PgFilingRepository {
    pool: PgPool,
}

impl PgFilingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FilingRepository for PgFilingRepository {
    async fn find_latest_filing(&self) -> Result<Option<FilingRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, FilingRow>(
            "SELECT f.accession_number, c.ticker, c.cik, c.name AS company_name, \
                    f.filing_type, f.filing_date, f.report_date \
             FROM filings f JOIN companies c ON c.id = f.company_id \
             ORDER BY f.filing_date DESC, f.created_at DESC \
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FilingRecord::from))
    }

    async fn list_companies(&self) -> Result<Vec<Company>, RepositoryError> {
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, ticker, cik, name FROM companies ORDER BY ticker",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Company::from).collect())
    }

    async fn find_company_by_ticker(&self, ticker: &str) -> Result<Option<Company>, RepositoryError> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, ticker, cik, name FROM companies WHERE ticker = $1",
        )
        .bind(ticker)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Company::from))
    }

    async fn find_or_create_company(
        &self,
        ticker: &str,
        cik: &str,
        name: Option<&str>,
    ) -> Result<Company, RepositoryError> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "INSERT INTO companies (ticker, cik, name) VALUES ($1, $2, $3) \
             ON CONFLICT (ticker) DO UPDATE SET name = COALESCE(EXCLUDED.name, companies.name) \
             RETURNING id, ticker, cik, name",
        )
        .bind(ticker)
        .bind(cik)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.into())
    }

    async fn upsert_filing(
        &self,
        company_id: CompanyId,
        record: &FilingRecord,
    ) -> Result<UpsertOutcome, RepositoryError> {
        // xmax is zero only for a freshly inserted tuple.
        let is_new: bool = sqlx::query_scalar(
            "INSERT INTO filings (accession_number, company_id, filing_type, filing_date, report_date) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (accession_number) DO UPDATE SET \
                filing_type = EXCLUDED.filing_type, \
                filing_date = EXCLUDED.filing_date, \
                report_date = COALESCE(EXCLUDED.report_date, filings.report_date), \
                updated_at = NOW() \
             RETURNING (xmax = 0)",
        )
        .bind(&record.accession_number)
        .bind(company_id)
        .bind(&record.filing_type)
        .bind(record.filing_date)
        .bind(record.report_date)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;
        Ok(UpsertOutcome { is_new })
    }

    async fn upsert_analyst_snapshot(
        &self,
        company_id: CompanyId,
        snapshot: &AnalystSnapshot,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_as::<_, SnapshotRow>(
            "SELECT as_of, consensus_eps, consensus_revenue, target_price, rating, analyst_count \
             FROM analyst_snapshots WHERE company_id = $1 FOR UPDATE",
        )
        .bind(company_id)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO analyst_snapshots \
                (company_id, as_of, consensus_eps, consensus_revenue, target_price, rating, analyst_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (company_id) DO UPDATE SET \
                as_of = EXCLUDED.as_of, \
                consensus_eps = EXCLUDED.consensus_eps, \
                consensus_revenue = EXCLUDED.consensus_revenue, \
                target_price = EXCLUDED.target_price, \
                rating = EXCLUDED.rating, \
                analyst_count = EXCLUDED.analyst_count",
        )
        .bind(company_id)
        .bind(snapshot.as_of)
        .bind(snapshot.consensus_eps)
        .bind(snapshot.consensus_revenue)
        .bind(snapshot.target_price)
        .bind(&snapshot.rating)
        .bind(snapshot.analyst_count)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await?;

        Ok(previous.map_or(true, |row| {
            snapshot.differs_from(&row.into_snapshot(&snapshot.ticker))
        }))
    }

    async fn latest_macro_snapshot(&self) -> Result<Option<MacroSnapshot>, RepositoryError> {
        let row = sqlx::query_as::<_, MacroRow>(&format!(
            "SELECT {MACRO_COLUMNS} FROM macro_snapshots ORDER BY as_of DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        row.map(MacroSnapshot::try_from).transpose()
    }

    async fn upsert_macro_snapshot(&self, snapshot: &MacroSnapshot) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_as::<_, MacroRow>(&format!(
            "SELECT {MACRO_COLUMNS} FROM macro_snapshots WHERE as_of = $1 FOR UPDATE"
        ))
        .bind(snapshot.as_of)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "INSERT INTO macro_snapshots ({MACRO_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (as_of) DO UPDATE SET \
                dollar_index = EXCLUDED.dollar_index, \
                dollar_30d_change = EXCLUDED.dollar_30d_change, \
                dollar_vs_year_avg = EXCLUDED.dollar_vs_year_avg, \
                dollar_strength = EXCLUDED.dollar_strength, \
                gdp_proxy_trend = EXCLUDED.gdp_proxy_trend, \
                equity_flow_bias = EXCLUDED.equity_flow_bias, \
                updated_at = NOW()"
        ))
        .bind(snapshot.as_of)
        .bind(snapshot.dollar_index)
        .bind(snapshot.dollar_30d_change)
        .bind(snapshot.dollar_vs_year_avg)
        .bind(snapshot.dollar_strength.as_str())
        .bind(snapshot.gdp_proxy_trend.as_str())
        .bind(snapshot.equity_flow_bias.as_str())
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await?;

        match previous {
            None => Ok(true),
            Some(row) => Ok(MacroSnapshot::try_from(row)? != *snapshot),
        }
    }
}
