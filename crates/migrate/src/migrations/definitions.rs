//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the fundamental types used throughout the migration system:
//! the [`Migration`] unit with its forward/backward actions, the ledger
//! entry, configuration and run reports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::sql::SqlAction;
use crate::backends::DatabaseConnection;
use crate::error::{ActionResult, MigrationError, MigrationResult};

/// One direction of a migration, run against a borrowed connection
#[async_trait]
pub trait MigrationAction: Send + Sync {
    async fn run(&self, conn: &mut dyn DatabaseConnection) -> ActionResult;
}

/// Represents a database migration.
///
/// Identity is the name; position in the registry is its place in the
/// schema history. Once released, neither may change.
#[derive(Clone)]
pub struct Migration {
    name: String,
    up: Arc<dyn MigrationAction>,
    down: Arc<dyn MigrationAction>,
}

impl Migration {
    /// Create a migration from arbitrary forward and backward actions
    pub fn new<U, D>(name: impl Into<String>, up: U, down: D) -> Self
    where
        U: MigrationAction + 'static,
        D: MigrationAction + 'static,
    {
        Self {
            name: name.into(),
            up: Arc::new(up),
            down: Arc::new(down),
        }
    }

    /// Create a migration whose actions are plain SQL blocks
    pub fn sql(name: impl Into<String>, up_sql: &str, down_sql: &str) -> Self {
        Self::new(name, SqlAction::new(up_sql), SqlAction::new(down_sql))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the forward action
    pub async fn apply(&self, conn: &mut dyn DatabaseConnection) -> ActionResult {
        self.up.run(conn).await
    }

    /// Run the backward action
    pub async fn revert(&self, conn: &mut dyn DatabaseConnection) -> ActionResult {
        self.down.run(conn).await
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A row of the migration ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Migration name
    pub name: String,
    /// When the migration was applied
    pub applied_at: DateTime<Utc>,
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where SQL migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for tracking applied migrations
    pub ledger_table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            ledger_table: "migrations".to_string(),
        }
    }
}

impl MigrationConfig {
    pub fn with_ledger_table(mut self, table: impl Into<String>) -> Self {
        self.ledger_table = table.into();
        self
    }

    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Check that the ledger table name can be interpolated into SQL.
    ///
    /// Accepts `table` or `schema.table`, each part an unquoted identifier.
    pub fn validate(&self) -> MigrationResult<()> {
        let parts: Vec<&str> = self.ledger_table.split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|part| is_identifier(part)) {
            return Err(MigrationError::configuration(format!(
                "invalid ledger table name '{}'",
                self.ledger_table
            )));
        }
        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Result of running migrations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationRunResult {
    /// Names of migrations applied by this run, in order
    pub applied: Vec<String>,
    /// Names of migrations that were already applied
    pub skipped: Vec<String>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackResult {
    /// Names of migrations rolled back, in the order they were reverted
    pub rolled_back: Vec<String>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl RollbackResult {
    pub fn rolled_back_count(&self) -> usize {
        self.rolled_back.len()
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Apply the migration (run the forward action)
    Up,
    /// Rollback the migration (run the backward action)
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        /// When it was applied
        applied_at: DateTime<Utc>,
    },
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationStatus::Applied { .. })
    }
}

/// Status of one registered migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatusEntry {
    pub name: String,
    #[serde(flatten)]
    pub status: MigrationStatus,
}
