//! # Sweep Subcommand
//!
//! Runs the grace-period completion sweep once against Postgres. Meant to
//! be scheduled externally (cron, a Kubernetes CronJob). Reads
//! `EngineConfig` from the same environment variables as the API.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;

use blindate_engine::memory::BroadcastHub;
use blindate_engine::{Blindate, Clock, EngineConfig, SweepReport, SystemClock};

use crate::DatabaseArgs;

/// Arguments for the sweep subcommand.
#[derive(Args, Debug)]
pub struct SweepArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Run one sweep. Returns the report; individual failures are counted,
/// not raised.
pub async fn run_sweep(args: &SweepArgs) -> anyhow::Result<SweepReport> {
    let config = EngineConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}: {}", e.field, e.reason))?;
    let pool = blindate_api::db::connect(&args.db.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ports = blindate_api::db::ports(pool.clone(), Arc::new(BroadcastHub::default()), clock);
    let engine = Blindate::new(ports, config);

    let report = engine
        .lifecycle()
        .sweep_grace_completions()
        .await
        .context("grace sweep failed")?;
    pool.close().await;

    if args.json {
        println!(
            "{}",
            serde_json::json!({
                "examined": report.examined,
                "completed": report.completed,
                "failed": report.failed,
            })
        );
    } else {
        println!(
            "examined {} engagement(s): {} completed, {} failed",
            report.examined, report.completed, report.failed
        );
    }
    Ok(report)
}
