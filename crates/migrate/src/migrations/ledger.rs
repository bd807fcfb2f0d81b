//! Migration Ledger - durable record of applied migrations
//!
//! The ledger table is the only state the engine owns. Membership is the
//! state: a name present in the table is applied, a name absent is not.

use chrono::Utc;

use super::definitions::{LedgerEntry, MigrationConfig};
use crate::backends::{DatabaseConnection, DatabaseRowExt, DatabaseValue};
use crate::error::{DatabaseError, DatabaseResult, MigrationError, MigrationResult};

/// Ledger store bound to one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    /// Create a ledger for the configured table, validating its name
    pub fn new(config: &MigrationConfig) -> MigrationResult<Self> {
        config.validate()?;
        Ok(Self {
            table: config.ledger_table.clone(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if absent
    pub async fn ensure(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<()> {
        conn.execute(&self.create_table_sql(), &[])
            .await
            .map_err(|source| MigrationError::LedgerInit {
                table: self.table.clone(),
                source,
            })?;

        tracing::debug!("Migration ledger '{}' is ready", self.table);
        Ok(())
    }

    /// Check if a specific migration has been applied
    pub async fn is_applied(
        &self,
        conn: &mut dyn DatabaseConnection,
        name: &str,
    ) -> MigrationResult<bool> {
        let row = conn
            .fetch_optional(&self.check_sql(), &[DatabaseValue::from(name)])
            .await
            .map_err(|source| self.query_error(source))?;

        Ok(row.is_some())
    }

    /// Record a migration as applied now
    pub async fn record(&self, conn: &mut dyn DatabaseConnection, name: &str) -> MigrationResult<()> {
        let params = [DatabaseValue::from(name), DatabaseValue::from(Utc::now())];

        conn.execute(&self.record_sql(), &params)
            .await
            .map_err(|source| {
                if source.is_unique_violation() {
                    MigrationError::DuplicateMigration {
                        name: name.to_string(),
                    }
                } else {
                    MigrationError::LedgerWrite {
                        table: self.table.clone(),
                        source,
                    }
                }
            })?;

        Ok(())
    }

    /// Remove a migration's entry; removing an absent entry is not an error
    pub async fn erase(&self, conn: &mut dyn DatabaseConnection, name: &str) -> MigrationResult<()> {
        let removed = conn
            .execute(&self.erase_sql(), &[DatabaseValue::from(name)])
            .await
            .map_err(|source| MigrationError::LedgerWrite {
                table: self.table.clone(),
                source,
            })?;

        if removed == 0 {
            tracing::debug!("No ledger entry for '{}' to remove", name);
        }
        Ok(())
    }

    /// All ledger entries, oldest first
    pub async fn entries(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<Vec<LedgerEntry>> {
        let rows = conn
            .fetch_all(&self.entries_sql(), &[])
            .await
            .map_err(|source| self.query_error(source))?;

        rows.iter()
            .map(|row| -> DatabaseResult<LedgerEntry> {
                Ok(LedgerEntry {
                    name: row.get_string("name")?,
                    applied_at: row.get_datetime("applied_at")?,
                })
            })
            .collect::<DatabaseResult<Vec<_>>>()
            .map_err(|source| self.query_error(source))
    }

    fn query_error(&self, source: DatabaseError) -> MigrationError {
        MigrationError::LedgerQuery {
            table: self.table.clone(),
            source,
        }
    }

    /// SQL to create the ledger table
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id BIGSERIAL PRIMARY KEY,\n    \
                name VARCHAR(255) NOT NULL UNIQUE,\n    \
                applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
            )",
            self.table
        )
    }

    /// SQL to check if a migration has been applied
    pub fn check_sql(&self) -> String {
        format!("SELECT 1 FROM {} WHERE name = $1", self.table)
    }

    /// SQL to record a migration as applied
    pub fn record_sql(&self) -> String {
        format!("INSERT INTO {} (name, applied_at) VALUES ($1, $2)", self.table)
    }

    /// SQL to remove a migration record
    pub fn erase_sql(&self) -> String {
        format!("DELETE FROM {} WHERE name = $1", self.table)
    }

    /// SQL to list applied migrations
    pub fn entries_sql(&self) -> String {
        format!("SELECT name, applied_at FROM {} ORDER BY applied_at, id", self.table)
    }
}
