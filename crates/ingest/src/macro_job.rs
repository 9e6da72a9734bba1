//! The `macro-indicators` job: store the day's macro snapshot and
//! invalidate every tracked company's predictions when the regime moves.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use sentinel_core::{CompanyId, JobMetrics, MacroSnapshot, SharedClock, MACRO_INDICATORS_JOB};
use sentinel_jobs::{Job, JobError};

use crate::error::IngestError;
use crate::invalidate::SharedInvalidator;
use crate::provider::SharedMacroProvider;
use crate::repository::SharedRepository;

pub struct MacroIndicatorsJob {
    provider: SharedMacroProvider,
    repository: SharedRepository,
    invalidator: SharedInvalidator,
    clock: SharedClock,
}

/// What one refresh did.
#[derive(Debug, Clone)]
pub struct MacroRefresh {
    pub snapshot: MacroSnapshot,
    /// New for its date, or different from what was stored for it.
    pub stored: bool,
    /// The classified readings differ from the previous snapshot.
    pub regime_changed: bool,
    pub companies_invalidated: usize,
}

impl MacroIndicatorsJob {
    pub fn new(
        provider: SharedMacroProvider,
        repository: SharedRepository,
        invalidator: SharedInvalidator,
        clock: SharedClock,
    ) -> Self {
        Self {
            provider,
            repository,
            invalidator,
            clock,
        }
    }

    /// Fetch and store one snapshot. The feed is a single source, so a
    /// provider failure fails the run.
    pub async fn refresh(&self) -> Result<MacroRefresh, IngestError> {
        let snapshot = self.provider.fetch(self.clock.today()).await?;
        let previous = self.repository.latest_macro_snapshot().await?;
        let stored = self.repository.upsert_macro_snapshot(&snapshot).await?;

        // The first snapshot has nothing to differ from.
        let regime_changed = previous.is_some_and(|prev| prev.regime() != snapshot.regime());

        let mut companies_invalidated = 0;
        if regime_changed {
            let companies: BTreeSet<CompanyId> = self
                .repository
                .list_companies()
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect();
            if !companies.is_empty() {
                self.invalidator.invalidate(&companies).await;
                companies_invalidated = companies.len();
            }
        }

        info!(
            as_of = %snapshot.as_of,
            dollar_index = snapshot.dollar_index,
            dollar_strength = %snapshot.dollar_strength,
            gdp_proxy_trend = %snapshot.gdp_proxy_trend,
            stored,
            regime_changed,
            "macro indicators refreshed"
        );
        Ok(MacroRefresh {
            snapshot,
            stored,
            regime_changed,
            companies_invalidated,
        })
    }
}

#[async_trait]
impl Job for MacroIndicatorsJob {
    fn name(&self) -> &str {
        MACRO_INDICATORS_JOB
    }

    async fn execute(&self) -> Result<JobMetrics, JobError> {
        let refresh = self.refresh().await?;
        let snap = &refresh.snapshot;

        let mut metrics = JobMetrics::new();
        metrics.insert("as_of".into(), json!(snap.as_of.to_string()));
        metrics.insert("dollar_index".into(), json!(snap.dollar_index));
        metrics.insert("dollar_30d_change".into(), json!(snap.dollar_30d_change));
        metrics.insert("dollar_strength".into(), json!(snap.dollar_strength.as_str()));
        metrics.insert("gdp_proxy_trend".into(), json!(snap.gdp_proxy_trend.as_str()));
        metrics.insert("equity_flow_bias".into(), json!(snap.equity_flow_bias.as_str()));
        metrics.insert("stored".into(), json!(refresh.stored));
        metrics.insert("regime_changed".into(), json!(refresh.regime_changed));
        metrics.insert("companies_invalidated".into(), json!(refresh.companies_invalidated));
        Ok(metrics)
    }
}
