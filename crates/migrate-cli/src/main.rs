mod commands;
mod logging;
mod migrations;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{migrate, Settings};
use logging::LoggingConfig;

#[derive(Parser)]
#[command(name = "ledger-migrate", version, about = "Apply, roll back and inspect schema migrations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding SQL migration files [env: MIGRATIONS_DIR] [default: migrations]
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Ledger table name [env: MIGRATIONS_TABLE] [default: migrations]
    #[arg(long, global = true)]
    table: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Environment file to load instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations
    Up {
        /// List pending migrations without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Roll back applied migrations, newest first
    Rollback {
        /// Number of applied migrations to roll back
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },

    /// Show applied and pending migrations
    Status {
        /// Print status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new SQL migration file
    Create {
        /// Migration name
        name: String,
    },
}

fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load environment file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    load_env_file(cli.env_file.as_deref())?;
    logging::init_logging(&LoggingConfig::new(cli.log_level.clone(), cli.log_json))?;

    let settings = Settings::resolve(cli.migrations_dir, cli.table, |key| std::env::var(key).ok());
    tracing::debug!(
        "Using migrations directory {} and ledger table '{}'",
        settings.migrations_dir.display(),
        settings.table
    );

    match cli.command {
        Commands::Up { dry_run } => {
            migrate::up(&settings, dry_run).await?;
        }
        Commands::Rollback { steps } => {
            migrate::rollback(&settings, steps).await?;
        }
        Commands::Status { json } => {
            migrate::status(&settings, json).await?;
        }
        Commands::Create { name } => {
            migrate::create(&settings, &name).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_rollback_defaults_to_one_step() {
        let cli = Cli::parse_from(["ledger-migrate", "rollback"]);
        assert!(matches!(cli.command, Commands::Rollback { steps: 1 }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["ledger-migrate", "status", "--json", "--table", "schema_migrations"]);
        assert!(matches!(cli.command, Commands::Status { json: true }));
        assert_eq!(cli.table.as_deref(), Some("schema_migrations"));
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_missing_env_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(load_env_file(Some(&dir.path().join("missing.env"))).is_err());
    }
}
