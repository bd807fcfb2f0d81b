//! Migration Engine - Applies registered migrations against the database
//!
//! Walks the registry in registration order, consulting the ledger before
//! each migration and recording it after. Runs are strictly sequential and
//! stop at the first failure, so the applied set is always a prefix of the
//! registry.

use std::collections::HashMap;
use std::time::Instant;

use super::definitions::{
    MigrationConfig, MigrationRunResult, MigrationStatus, MigrationStatusEntry,
};
use super::ledger::Ledger;
use super::registry::Registry;
use crate::backends::DatabaseConnection;
use crate::error::{MigrationError, MigrationResult};

/// Migration engine bound to one registry and one ledger table.
///
/// The engine assumes it is the only writer for the target database while a
/// call is in progress; it does no locking of its own.
#[derive(Debug, Clone)]
pub struct MigrationEngine {
    registry: Registry,
    ledger: Ledger,
}

impl MigrationEngine {
    /// Create an engine using the default ledger table
    pub fn new(registry: Registry) -> MigrationResult<Self> {
        Self::with_config(registry, &MigrationConfig::default())
    }

    /// Create an engine with custom configuration
    pub fn with_config(registry: Registry, config: &MigrationConfig) -> MigrationResult<Self> {
        Ok(Self {
            registry,
            ledger: Ledger::new(config)?,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Ensure the ledger table exists
    pub async fn ensure_ledger(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<()> {
        self.ledger.ensure(conn).await
    }

    /// Apply every pending migration in registration order
    pub async fn up(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();

        self.ensure_ledger(conn).await?;

        let mut result = MigrationRunResult::default();

        for migration in &self.registry {
            let name = migration.name();

            if self.ledger.is_applied(conn, name).await? {
                tracing::debug!("Migration already applied: {}", name);
                result.skipped.push(name.to_string());
                continue;
            }

            tracing::info!("Applying migration: {}", name);

            migration.apply(conn).await.map_err(|source| {
                tracing::error!("Migration {} failed: {}", name, source);
                MigrationError::MigrationApply {
                    name: name.to_string(),
                    source,
                }
            })?;

            self.ledger.record(conn, name).await.map_err(|source| {
                tracing::error!(
                    "Migration {} was applied but could not be recorded: {}",
                    name,
                    source
                );
                MigrationError::LedgerRecord {
                    name: name.to_string(),
                    source: Box::new(source),
                }
            })?;

            tracing::info!("Migration applied: {}", name);
            result.applied.push(name.to_string());
        }

        result.execution_time_ms = start_time.elapsed().as_millis();

        tracing::info!(
            applied = result.applied_count(),
            skipped = result.skipped_count(),
            "Migrations up to date"
        );

        Ok(result)
    }

    /// Names of registered migrations not yet in the ledger, in order
    pub async fn pending(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<Vec<String>> {
        let status = self.status(conn).await?;
        Ok(status
            .into_iter()
            .filter(|entry| !entry.status.is_applied())
            .map(|entry| entry.name)
            .collect())
    }

    /// Get migration status for all registered migrations (applied and pending)
    pub async fn status(
        &self,
        conn: &mut dyn DatabaseConnection,
    ) -> MigrationResult<Vec<MigrationStatusEntry>> {
        self.ensure_ledger(conn).await?;

        let mut applied: HashMap<String, _> = self
            .ledger
            .entries(conn)
            .await?
            .into_iter()
            .map(|entry| (entry.name, entry.applied_at))
            .collect();

        let status_list = self
            .registry
            .iter()
            .map(|migration| {
                let status = match applied.remove(migration.name()) {
                    Some(applied_at) => MigrationStatus::Applied { applied_at },
                    None => MigrationStatus::Pending,
                };
                MigrationStatusEntry {
                    name: migration.name().to_string(),
                    status,
                }
            })
            .collect();

        let mut unknown: Vec<_> = applied.into_keys().collect();
        unknown.sort();
        for name in unknown {
            tracing::warn!(
                "Ledger entry '{}' has no registered migration; reconcile the ledger manually",
                name
            );
        }

        Ok(status_list)
    }
}
