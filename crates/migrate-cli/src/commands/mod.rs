pub mod migrate;

use std::path::PathBuf;

use ledger_migrate::MigrationConfig;

/// Runner settings after applying flags over environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub migrations_dir: PathBuf,
    pub table: String,
}

impl Settings {
    /// Flags win over `MIGRATIONS_DIR` / `MIGRATIONS_TABLE`, which win over defaults
    pub fn resolve<F>(migrations_dir: Option<PathBuf>, table: Option<String>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = MigrationConfig::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            migrations_dir: migrations_dir
                .or_else(|| var("MIGRATIONS_DIR").map(PathBuf::from))
                .unwrap_or(defaults.migrations_dir),
            table: table
                .or_else(|| var("MIGRATIONS_TABLE"))
                .unwrap_or(defaults.ledger_table),
        }
    }

    pub fn migration_config(&self) -> MigrationConfig {
        MigrationConfig::default()
            .with_migrations_dir(self.migrations_dir.clone())
            .with_ledger_table(self.table.clone())
    }
}
