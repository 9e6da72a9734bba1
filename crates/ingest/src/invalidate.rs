//! Downstream invalidation of derived per-company state.
//!
//! Invalidation is best-effort: implementations log their own failures
//! and never report them to the caller.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};

use sentinel_core::CompanyId;

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, companies: &BTreeSet<CompanyId>);
}

pub type SharedInvalidator = Arc<dyn CacheInvalidator>;

/// Clears cached return predictions for the affected companies.
#[derive(Clone)]
pub struct PgPredictionInvalidator {
    pool: PgPool,
}

impl PgPredictionInvalidator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheInvalidator for PgPredictionInvalidator {
    async fn invalidate(&self, companies: &BTreeSet<CompanyId>) {
        if companies.is_empty() {
            return;
        }
        let ids: Vec<CompanyId> = companies.iter().copied().collect();
        match sqlx::query("DELETE FROM prediction_cache WHERE company_id = ANY($1)")
            .bind(&ids)
            .execute(&self.pool)
            .await
        {
            Ok(result) => info!(
                companies = ids.len(),
                rows = result.rows_affected(),
                "prediction cache invalidated"
            ),
            Err(e) => warn!(companies = ids.len(), error = %e, "prediction cache invalidation failed"),
        }
    }
}

/// Records every invalidation call. Used in tests.
#[derive(Debug, Default)]
pub struct RecordingInvalidator {
    calls: Mutex<Vec<BTreeSet<CompanyId>>>,
}

impl RecordingInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<BTreeSet<CompanyId>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CacheInvalidator for RecordingInvalidator {
    async fn invalidate(&self, companies: &BTreeSet<CompanyId>) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(companies.clone());
    }
}

