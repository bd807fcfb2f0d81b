//! # ledger-migrate: versioned schema migrations
//!
//! A [`Registry`] holds an ordered, duplicate-free list of named
//! migrations, each with a forward and a backward action. The
//! [`MigrationEngine`] applies pending migrations in registration order and
//! rolls applied ones back in strict reverse order, using a ledger table in
//! the target database as the only record of what has been applied.
//!
//! ```no_run
//! use ledger_migrate::{connect, DatabaseConfig, Migration, MigrationEngine, PostgresConnection, Registry};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::builder()
//!     .add(Migration::sql(
//!         "001_create_posts",
//!         "CREATE TABLE posts (id SERIAL PRIMARY KEY, title TEXT NOT NULL);",
//!         "DROP TABLE posts;",
//!     ))
//!     .build()?;
//!
//! let pool = connect(&DatabaseConfig::from_env()?).await?;
//! let mut conn = PostgresConnection::acquire(&pool).await?;
//!
//! let engine = MigrationEngine::new(registry)?;
//! engine.up(&mut conn).await?;
//! engine.rollback(&mut conn, 1).await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod database;
pub mod error;
pub mod migrations;

#[cfg(test)]
mod testing;


pub use backends::{DatabaseConnection, DatabaseRow, DatabaseRowExt, DatabaseValue, PostgresConnection};
pub use database::{connect, ConnectionTarget, DatabaseConfig, PoolConfig};
pub use error::*;
pub use migrations::{
    LedgerEntry, Migration, MigrationAction, MigrationConfig, MigrationDirection, MigrationEngine,
    MigrationLoader, MigrationRunResult, MigrationStatus, MigrationStatusEntry, Registry,
    RegistryBuilder, RollbackResult, SqlAction,
};
