//! Migration Rollback - Reverts applied migrations in reverse order
//!
//! Rollback walks the registry backwards and only spends a step on
//! migrations the ledger actually holds, so a partially applied history
//! still loses exactly the requested number of applied migrations.

use std::time::Instant;

use super::definitions::RollbackResult;
use super::runner::MigrationEngine;
use crate::backends::DatabaseConnection;
use crate::error::{MigrationError, MigrationResult};

impl MigrationEngine {
    /// Roll back up to `steps` applied migrations, newest first.
    ///
    /// `steps == 0` changes nothing. Asking for more steps than there are
    /// applied migrations reverts everything applied and stops.
    pub async fn rollback(
        &self,
        conn: &mut dyn DatabaseConnection,
        steps: usize,
    ) -> MigrationResult<RollbackResult> {
        let start_time = Instant::now();

        self.ensure_ledger(conn).await?;

        let mut remaining = steps.min(self.registry().len());
        let mut rolled_back = Vec::new();

        for migration in self.registry().iter().rev() {
            if remaining == 0 {
                break;
            }

            let name = migration.name();

            if !self.ledger().is_applied(conn, name).await? {
                tracing::debug!("Migration not applied, skipping: {}", name);
                continue;
            }

            tracing::info!("Rolling back migration: {}", name);

            migration.revert(conn).await.map_err(|source| {
                tracing::error!("Rollback of {} failed: {}", name, source);
                MigrationError::MigrationRollback {
                    name: name.to_string(),
                    source,
                }
            })?;

            self.ledger().erase(conn, name).await.map_err(|source| {
                tracing::error!(
                    "Migration {} was rolled back but its ledger entry remains: {}",
                    name,
                    source
                );
                MigrationError::LedgerErase {
                    name: name.to_string(),
                    source: Box::new(source),
                }
            })?;

            tracing::info!("Migration rolled back: {}", name);
            rolled_back.push(name.to_string());
            remaining -= 1;
        }

        tracing::info!(rolled_back = rolled_back.len(), requested = steps, "Rollback finished");

        Ok(RollbackResult {
            rolled_back,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Roll back every applied migration
    pub async fn rollback_all(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<RollbackResult> {
        self.rollback(conn, self.registry().len()).await
    }
}
