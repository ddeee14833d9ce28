//! # blindate-cli: Operator Command-Line Interface
//!
//! Deployment-time and scheduled jobs that sit outside the request path.
//!
//! ## Subcommands
//!
//! - `migrate`: apply the embedded SQL migrations once per deployment
//! - `sweep`: complete accepted engagements whose grace period has run out
//!
//! ## Crate Policy
//!
//! - CLI construction (argument parsing) is separated from the handlers.
//! - Handlers delegate to `blindate-api::db` and `blindate-engine`.

pub mod migrate;
pub mod sweep;

use clap::Args;

/// Database connection options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,
}
