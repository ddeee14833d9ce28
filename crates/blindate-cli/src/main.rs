//! # blindate CLI Entry Point
//!
//! Assembles subcommands and dispatches to handler modules.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use blindate_cli::migrate::{run_migrate, MigrateArgs};
use blindate_cli::sweep::{run_sweep, SweepArgs};

/// Blind-date stack operator CLI.
///
/// Applies database migrations and runs scheduled maintenance jobs.
#[derive(Parser, Debug)]
#[command(name = "blindate", version, about)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Apply the embedded database migrations.
    Migrate(MigrateArgs),
    /// Complete accepted engagements whose grace period has run out.
    Sweep(SweepArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Migrate(args) => run_migrate(&args).await,
        Commands::Sweep(args) => run_sweep(&args).await.and_then(|report| {
            if report.failed > 0 {
                anyhow::bail!("{} engagement(s) failed to complete", report.failed);
            }
            Ok(())
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_migrate() {
        let cli =
            Cli::try_parse_from(["blindate", "migrate", "--database-url", "postgres://db/x"])
                .unwrap();
        match cli.command {
            Commands::Migrate(args) => assert_eq!(args.db.database_url, "postgres://db/x"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parse_sweep_json() {
        let cli = Cli::try_parse_from([
            "blindate",
            "sweep",
            "--database-url",
            "postgres://db/x",
            "--json",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(matches!(cli.command, Commands::Sweep(SweepArgs { json: true, .. })));
    }

    #[test]
    fn cli_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["blindate", "serve"]).is_err());
    }
}
