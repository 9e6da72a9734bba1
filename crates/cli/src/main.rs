mod app;
mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

use sentinel_core::config::load_dotenv;
use sentinel_core::Config;
use sentinel_jobs::{Job, JobRunner};

use crate::app::App;
use crate::cli::{Cli, Command, JobName};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();

    let config = match cli.profile.as_deref() {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };

    if let Command::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
        return Ok(());
    }

    config.log_summary();
    let app = App::connect(config).await?;

    match cli.command {
        Command::Migrate => {
            sqlx::migrate!("../../migrations")
                .run(&app.pool)
                .await
                .context("failed to apply migrations")?;
            info!("migrations applied");
        }

        Command::Run { job } => {
            let runner = app.runner()?;
            info!(job = job.ledger_key(), stuck_threshold_mins = app.stuck_threshold().num_minutes(), "running job");

            let outcome = match job {
                JobName::DailyFilings => run(&runner, &app.filings_job()?).await?,
                JobName::AnalystData => run(&runner, &app.analyst_job()?).await?,
                JobName::MacroIndicators => run(&runner, &app.macro_job()?).await?,
                JobName::CompanyUniverse => run(&runner, &app.universe_job()?).await?,
            };
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }

        Command::Supervise { auto_remediate } => {
            let report = app
                .supervisor(auto_remediate)?
                .audit(auto_remediate)
                .await
                .context("health check cycle failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Config => {}
    }

    Ok(())
}

async fn run(runner: &JobRunner, job: &dyn Job) -> Result<serde_json::Value> {
    let outcome = runner
        .run(job)
        .await
        .with_context(|| format!("job {} failed", job.name()))?;
    Ok(json!({
        "run_id": outcome.run_id,
        "stuck_runs_reaped": outcome.stuck_runs_reaped,
        "metrics": outcome.metrics,
    }))
}
