//! Component wiring for one CLI invocation.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use sentinel_core::{
    Config, SharedClock, SystemClock, ANALYST_DATA_JOB, DAILY_FILINGS_JOB, MACRO_INDICATORS_JOB,
};
use sentinel_ingest::{
    AnalystDataJob, CompanyUniverseJob, DailyFilingsJob, EdgarCompanyTickersProvider,
    EdgarDailyIndexProvider, EdgarSubmissionsProvider, HttpAnalystProvider, HttpMacroProvider,
    MacroIndicatorsJob, PgFilingRepository, PgPredictionInvalidator, SharedInvalidator,
    SharedRepository, SharedUniverseProvider,
};
use sentinel_jobs::{Job, JobRunner, PgJobRunLedger, SharedLedger};
use sentinel_notify::{Dispatcher, EmailNotifier, SharedNotifier, SmtpSettings, WebhookNotifier};
use sentinel_supervisor::{
    from_fn, RemediationAction, RemediationError, RemediationTable, Supervisor, SupervisorPolicy,
};

pub struct App {
    pub config: Config,
    pub pool: PgPool,
    clock: SharedClock,
    ledger: SharedLedger,
    repository: SharedRepository,
    invalidator: SharedInvalidator,
}

impl App {
    pub async fn connect(config: Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.postgres.max_connections)
            .connect(&config.postgres.connection_string())
            .await
            .with_context(|| {
                format!(
                    "failed to connect to PostgreSQL at {}:{}",
                    config.postgres.host, config.postgres.port
                )
            })?;
        info!(host = %config.postgres.host, db = %config.postgres.database, "connected to PostgreSQL");

        let clock: SharedClock = Arc::new(SystemClock);
        Ok(Self {
            ledger: Arc::new(PgJobRunLedger::new(pool.clone(), clock.clone())),
            repository: Arc::new(PgFilingRepository::new(pool.clone())),
            invalidator: Arc::new(PgPredictionInvalidator::new(pool.clone())),
            clock,
            config,
            pool,
        })
    }

    fn policy(&self) -> SupervisorPolicy {
        SupervisorPolicy::from_config(&self.config)
    }

    fn universe_provider(&self) -> Result<SharedUniverseProvider> {
        let provider = EdgarCompanyTickersProvider::new(&self.config.edgar, &self.config.universe)
            .context("failed to build SEC company tickers provider")?;
        Ok(Arc::new(provider))
    }

    pub fn filings_job(&self) -> Result<DailyFilingsJob> {
        let edgar = &self.config.edgar;
        let primary = EdgarSubmissionsProvider::new(edgar, self.repository.clone())
            .context("failed to build EDGAR submissions provider")?;
        let secondary = EdgarDailyIndexProvider::new(edgar, self.repository.clone())
            .context("failed to build EDGAR daily index provider")?;

        Ok(DailyFilingsJob::new(
            Arc::new(primary),
            self.repository.clone(),
            self.invalidator.clone(),
            self.clock.clone(),
        )
        .with_secondary(Arc::new(secondary))
        .with_universe(self.universe_provider()?)
        .with_config(&self.config.ingest, edgar))
    }

    pub fn universe_job(&self) -> Result<CompanyUniverseJob> {
        Ok(CompanyUniverseJob::new(
            self.universe_provider()?,
            self.repository.clone(),
        ))
    }

    pub fn macro_job(&self) -> Result<MacroIndicatorsJob> {
        let provider = HttpMacroProvider::new(&self.config.macro_indicators)
            .context("failed to build macro indicators provider")?;
        Ok(MacroIndicatorsJob::new(
            Arc::new(provider),
            self.repository.clone(),
            self.invalidator.clone(),
            self.clock.clone(),
        ))
    }

    pub fn analyst_job(&self) -> Result<AnalystDataJob> {
        let provider = HttpAnalystProvider::new(&self.config.analyst, self.clock.clone())
            .context("failed to build analyst provider")?;
        Ok(AnalystDataJob::new(
            Arc::new(provider),
            self.repository.clone(),
            self.invalidator.clone(),
        ))
    }

    /// Alert channels from config. An empty dispatcher still audits; its
    /// sends fail and are logged.
    pub fn notifier(&self) -> Result<SharedNotifier> {
        let notify = &self.config.notify;
        let mut dispatcher = Dispatcher::default();

        if let Some(url) = &notify.webhook_url {
            dispatcher.push(Box::new(
                WebhookNotifier::new(url).context("invalid ALERT_WEBHOOK_URL")?,
            ));
        }
        if let (Some(host), Some(from)) = (&notify.smtp_host, &notify.email_from) {
            if notify.email_configured() {
                let settings = SmtpSettings {
                    host: host.clone(),
                    port: notify.smtp_port,
                    tls: notify.smtp_tls,
                    username: notify.smtp_username.clone(),
                    password: notify.smtp_password.clone(),
                    from: from.clone(),
                    to: notify.email_to.clone(),
                };
                dispatcher.push(Box::new(
                    EmailNotifier::new(&settings).context("invalid SMTP alert settings")?,
                ));
            }
        }

        if dispatcher.is_empty() {
            warn!("no alert channels configured; health alerts will only be logged");
        } else {
            info!(channels = ?dispatcher.channel_names(), "alert channels configured");
        }
        Ok(Arc::new(dispatcher))
    }

    /// Runner for scheduled invocations, audited after every run.
    pub fn runner(&self) -> Result<JobRunner> {
        let audit = Supervisor::new(
            self.ledger.clone(),
            self.notifier()?,
            self.clock.clone(),
            self.policy(),
        );
        Ok(self.bare_runner().with_audit(Arc::new(audit)))
    }

    /// Runner without the audit hook, used by remediation.
    fn bare_runner(&self) -> JobRunner {
        JobRunner::new(self.ledger.clone(), self.policy().stuck_threshold)
    }

    /// Job name → "run it once more" for every job this deployment has.
    fn remediation_table(&self) -> Result<RemediationTable> {
        let mut table = RemediationTable::new()
            .with(DAILY_FILINGS_JOB, rerun(self.bare_runner(), Arc::new(self.filings_job()?)));

        if self.config.analyst.is_configured() {
            table = table.with(
                ANALYST_DATA_JOB,
                rerun(self.bare_runner(), Arc::new(self.analyst_job()?)),
            );
        } else {
            info!("ANALYST_API_URL not set; analyst-data is neither audited nor remediated");
        }
        if self.config.macro_indicators.is_configured() {
            table = table.with(
                MACRO_INDICATORS_JOB,
                rerun(self.bare_runner(), Arc::new(self.macro_job()?)),
            );
        } else {
            info!("MACRO_PRICE_URL not set; macro-indicators is neither audited nor remediated");
        }
        Ok(table)
    }

    /// Supervisor for one `supervise` cycle. Only a remediating cycle
    /// builds the job clients behind the remediation table.
    pub fn supervisor(&self, auto_remediate: bool) -> Result<Supervisor> {
        let supervisor = Supervisor::new(
            self.ledger.clone(),
            self.notifier()?,
            self.clock.clone(),
            self.policy(),
        );
        if !auto_remediate {
            return Ok(supervisor);
        }
        Ok(supervisor.with_remediations(self.remediation_table()?))
    }

    /// Stuck threshold as configured, for startup logging.
    pub fn stuck_threshold(&self) -> Duration {
        self.policy().stuck_threshold
    }
}

fn rerun<J: Job + 'static>(runner: JobRunner, job: Arc<J>) -> Arc<dyn RemediationAction> {
    from_fn(move || {
        let runner = runner.clone();
        let job = job.clone();
        async move {
            runner
                .run(job.as_ref())
                .await
                .map(|_| ())
                .map_err(RemediationError::failed)
        }
    })
}
