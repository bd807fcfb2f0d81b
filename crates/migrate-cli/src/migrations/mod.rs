//! Migrations known to the runner
//!
//! Built-in code migrations come first, followed by the SQL files found in
//! the migrations directory in file-name order.

mod m001_create_users_table;

use ledger_migrate::{Migration, MigrationLoader, MigrationResult, Registry};

/// Migrations compiled into the binary, in order
pub fn builtin() -> Vec<Migration> {
    vec![m001_create_users_table::migration()]
}

/// Build the registry from the built-in migrations and the loader's files
pub async fn registry(loader: &MigrationLoader) -> MigrationResult<Registry> {
    let files = loader.load().await?;
    tracing::debug!("{} built-in and {} file migration(s)", builtin().len(), files.len());

    Registry::builder().extend(builtin()).extend(files).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_migrate::MigrationError;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_builtin_migrations_come_first() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("20240101_120000_create_posts.sql"),
            "-- Up migration\nCREATE TABLE posts (id INT);\n-- Down migration\nDROP TABLE posts;\n",
        )
        .unwrap();

        let registry = registry(&MigrationLoader::new(temp_dir.path())).await.unwrap();
        assert_eq!(
            registry.names(),
            vec![m001_create_users_table::NAME, "20240101_120000_create_posts"]
        );
    }

    #[tokio::test]
    async fn test_file_shadowing_builtin_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("001_create_users_table.sql"),
            "-- Up migration\nSELECT 1;\n",
        )
        .unwrap();

        let err = registry(&MigrationLoader::new(temp_dir.path())).await.unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateMigrationName { .. }));
    }
}
