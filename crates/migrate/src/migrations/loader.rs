//! Migration Loader - SQL migration files on disk
//!
//! Creates and loads `<timestamp>_<name>.sql` files. Each file holds an
//! `-- Up migration` section and an optional `-- Down migration` section.
//! Files load in file-name order, which the timestamp prefix keeps
//! chronological.

use chrono::Utc;
use std::path::{Path, PathBuf};

use super::definitions::{Migration, MigrationConfig};
use crate::error::{MigrationError, MigrationResult};

/// Loader for SQL migration files
#[derive(Debug, Clone)]
pub struct MigrationLoader {
    dir: PathBuf,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Up,
    Down,
}

impl MigrationLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.migrations_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new migration file and return its file name
    pub async fn create_migration(&self, name: &str) -> MigrationResult<String> {
        let slug = name.trim().replace(&[' ', '-'][..], "_").to_lowercase();
        if slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(MigrationError::configuration(format!(
                "invalid migration name '{}': use letters, digits, spaces, '-' or '_'",
                name
            )));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| self.io_error(&self.dir, source))?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let migration_id = format!("{}_{}", timestamp, slug);
        let filename = format!("{}.sql", migration_id);
        let filepath = self.dir.join(&filename);

        if tokio::fs::metadata(&filepath).await.is_ok() {
            return Err(MigrationError::configuration(format!(
                "migration file {} already exists",
                filepath.display()
            )));
        }

        tokio::fs::write(&filepath, create_migration_template(name, &migration_id))
            .await
            .map_err(|source| self.io_error(&filepath, source))?;

        tracing::info!("Created migration file {}", filepath.display());
        Ok(filename)
    }

    /// Load all migration files from the directory, ordered by file name.
    ///
    /// A missing directory yields no migrations.
    pub async fn load(&self) -> MigrationResult<Vec<Migration>> {
        if tokio::fs::metadata(&self.dir).await.is_err() {
            tracing::debug!("Migrations directory {} not found", self.dir.display());
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|source| self.io_error(&self.dir, source))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| self.io_error(&self.dir, source))?
        {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "sql") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut migrations = Vec::with_capacity(paths.len());
        for path in paths {
            migrations.push(self.parse_migration_file(&path).await?);
        }

        tracing::debug!("Loaded {} migration file(s) from {}", migrations.len(), self.dir.display());
        Ok(migrations)
    }

    async fn parse_migration_file(&self, path: &Path) -> MigrationResult<Migration> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| self.io_error(path, source))?;

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MigrationError::InvalidMigrationFile {
                path: path.to_path_buf(),
                message: "file name is not valid UTF-8".to_string(),
            })?;

        let (up_sql, down_sql) =
            parse_migration_content(&content).map_err(|message| MigrationError::InvalidMigrationFile {
                path: path.to_path_buf(),
                message,
            })?;

        if up_sql.is_empty() {
            tracing::warn!("Migration {} has an empty up section", name);
        }

        Ok(Migration::sql(name, &up_sql, &down_sql))
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> MigrationError {
        MigrationError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Split file content into its up and down SQL
fn parse_migration_content(content: &str) -> Result<(String, String), String> {
    let mut up_sql = Vec::new();
    let mut down_sql = Vec::new();
    let mut current_section = Section::Preamble;
    let mut saw_up = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(comment) = trimmed.strip_prefix("--") {
            match comment.trim().to_lowercase().as_str() {
                "up" | "up migration" => {
                    if saw_up {
                        return Err("more than one up section".to_string());
                    }
                    saw_up = true;
                    current_section = Section::Up;
                }
                "down" | "down migration" => {
                    if !saw_up {
                        return Err("down section appears before the up section".to_string());
                    }
                    current_section = Section::Down;
                }
                _ => {}
            }
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match current_section {
            Section::Up => up_sql.push(line),
            Section::Down => down_sql.push(line),
            Section::Preamble => {
                return Err("SQL found before the '-- Up migration' marker".to_string());
            }
        }
    }

    if !saw_up {
        return Err("missing '-- Up migration' section".to_string());
    }

    Ok((up_sql.join("\n"), down_sql.join("\n")))
}

/// Create migration template content
fn create_migration_template(name: &str, migration_id: &str) -> String {
    format!(
        "-- Migration: {}\n\
         -- ID: {}\n\
         -- Created: {}\n\n\
         -- Up migration\n\
         -- Add your schema changes here\n\n\n\
         -- Down migration\n\
         -- Add rollback statements here\n\n",
        name,
        migration_id,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}
