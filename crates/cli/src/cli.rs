use clap::{Parser, Subcommand, ValueEnum};

use sentinel_core::{ANALYST_DATA_JOB, COMPANY_UNIVERSE_JOB, DAILY_FILINGS_JOB, MACRO_INDICATORS_JOB};

/// Filing ingestion jobs and the job-fleet health supervisor.
///
/// Each invocation does one unit of work and exits; an external timer
/// (cron, systemd, Kubernetes CronJob) decides when.
#[derive(Parser, Debug)]
#[command(name = "sentinel", version, about)]
pub struct Cli {
    /// Config profile; keys are read as `{PROFILE}_{KEY}` before `{KEY}`.
    #[arg(long, env = "SENTINEL_PROFILE", global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one job invocation and print its metrics as JSON.
    Run {
        #[arg(value_enum)]
        job: JobName,
    },

    /// Run one health-check cycle and print the report as JSON.
    Supervise {
        /// Retry stuck jobs and trigger missing runs.
        #[arg(long, env = "SUPERVISOR_AUTO_REMEDIATE")]
        auto_remediate: bool,
    },

    /// Apply pending database migrations.
    Migrate,

    /// Print the resolved configuration with secrets redacted.
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobName {
    DailyFilings,
    AnalystData,
    MacroIndicators,
    CompanyUniverse,
}

impl JobName {
    pub fn ledger_key(&self) -> &'static str {
        match self {
            JobName::DailyFilings => DAILY_FILINGS_JOB,
            JobName::AnalystData => ANALYST_DATA_JOB,
            JobName::MacroIndicators => MACRO_INDICATORS_JOB,
            JobName::CompanyUniverse => COMPANY_UNIVERSE_JOB,
        }
    }
}
