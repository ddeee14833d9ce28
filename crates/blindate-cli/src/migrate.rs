//! # Migrate Subcommand
//!
//! Applies the migrations embedded in `blindate-api`. Safe to repeat;
//! already-applied migrations are skipped.

use anyhow::Context;
use clap::Args;

use crate::DatabaseArgs;

/// Arguments for the migrate subcommand.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,
}

pub async fn run_migrate(args: &MigrateArgs) -> anyhow::Result<()> {
    let pool = blindate_api::db::connect(&args.db.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;
    blindate_api::db::run_migrations(&pool)
        .await
        .context("failed to apply migrations")?;
    pool.close().await;
    Ok(())
}
