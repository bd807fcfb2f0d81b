//! Migration System
//!
//! Registry, ledger and the engine that applies and rolls back migrations,
//! plus the SQL-file loader.

pub mod definitions;
pub mod ledger;
pub mod loader;
pub mod registry;
pub mod rollback;
pub mod runner;
pub mod sql;

pub use definitions::*;
pub use ledger::Ledger;
pub use loader::MigrationLoader;
pub use registry::{Registry, RegistryBuilder};
pub use runner::MigrationEngine;
pub use sql::{split_sql_statements, SqlAction};
