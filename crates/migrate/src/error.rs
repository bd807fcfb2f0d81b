//! Error types for the migration engine
//!
//! Every failure carries the migration name (and, where it matters, the
//! direction) together with the underlying cause. Nothing is retried: the
//! caller decides what to do with a failed run.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::migrations::definitions::MigrationDirection;

/// Result type alias for engine operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Result type alias for database handle operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Error produced by a migration action.
///
/// Actions may fail for reasons other than the database (a data transform
/// that finds unexpected rows, for instance), so the type is left open.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Result of running a single migration action
pub type ActionResult = Result<(), ActionError>;

/// Broad classification of a database failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    /// A unique constraint rejected the write
    UniqueViolation,
    /// The connection could not be established or was lost
    Connection,
    /// The statement was rejected or failed while executing
    Query,
    /// A row value could not be read back
    Decode,
}

impl fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseErrorKind::UniqueViolation => write!(f, "unique violation"),
            DatabaseErrorKind::Connection => write!(f, "connection error"),
            DatabaseErrorKind::Query => write!(f, "query error"),
            DatabaseErrorKind::Decode => write!(f, "decode error"),
        }
    }
}

/// Failure reported by a [`DatabaseConnection`](crate::backends::DatabaseConnection)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub message: String,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::Query, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::Connection, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::Decode, message)
    }

    pub fn unique_violation(message: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::UniqueViolation, message)
    }

    pub fn is_unique_violation(&self) -> bool {
        self.kind == DatabaseErrorKind::UniqueViolation
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseErrorKind::UniqueViolation
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DatabaseErrorKind::Connection,
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::TypeNotFound { .. } => DatabaseErrorKind::Decode,
            _ => DatabaseErrorKind::Query,
        };

        Self::new(kind, err.to_string())
    }
}

/// Errors raised by the ledger, the registry and the engine
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to create or verify migration ledger '{table}': {source}")]
    LedgerInit {
        table: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Failed to query migration ledger '{table}': {source}")]
    LedgerQuery {
        table: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Failed to write to migration ledger '{table}': {source}")]
    LedgerWrite {
        table: String,
        #[source]
        source: DatabaseError,
    },

    #[error("Migration '{name}' is already recorded in the ledger")]
    DuplicateMigration { name: String },

    #[error("Migration name '{name}' is registered more than once")]
    DuplicateMigrationName { name: String },

    #[error("Failed to apply migration '{name}': {source}")]
    MigrationApply {
        name: String,
        #[source]
        source: ActionError,
    },

    #[error("Failed to roll back migration '{name}': {source}")]
    MigrationRollback {
        name: String,
        #[source]
        source: ActionError,
    },

    #[error("Migration '{name}' was applied but could not be recorded in the ledger, reconcile manually: {source}")]
    LedgerRecord {
        name: String,
        #[source]
        source: Box<MigrationError>,
    },

    #[error("Migration '{name}' was rolled back but its ledger entry could not be removed, reconcile manually: {source}")]
    LedgerErase {
        name: String,
        #[source]
        source: Box<MigrationError>,
    },

    #[error("Invalid migration file {}: {message}", .path.display())]
    InvalidMigrationFile { path: PathBuf, message: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to connect to the database: {source}")]
    Connection {
        #[source]
        source: DatabaseError,
    },
}

impl MigrationError {
    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Name of the migration the error belongs to, if any
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            MigrationError::DuplicateMigration { name }
            | MigrationError::DuplicateMigrationName { name }
            | MigrationError::MigrationApply { name, .. }
            | MigrationError::MigrationRollback { name, .. }
            | MigrationError::LedgerRecord { name, .. }
            | MigrationError::LedgerErase { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Direction of the run that failed, if the failure happened mid-run
    pub fn direction(&self) -> Option<MigrationDirection> {
        match self {
            MigrationError::MigrationApply { .. } | MigrationError::LedgerRecord { .. } => {
                Some(MigrationDirection::Up)
            }
            MigrationError::MigrationRollback { .. } | MigrationError::LedgerErase { .. } => {
                Some(MigrationDirection::Down)
            }
            _ => None,
        }
    }

    /// Whether the schema and the ledger may now disagree.
    ///
    /// True when an action succeeded but the matching ledger write did not.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(
            self,
            MigrationError::LedgerRecord { .. } | MigrationError::LedgerErase { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_display() {
        let err = DatabaseError::unique_violation("duplicate key value");
        assert!(err.is_unique_violation());
        assert_eq!(err.to_string(), "unique violation: duplicate key value");

        let err = DatabaseError::query("syntax error at or near \"TABLE\"");
        assert!(!err.is_unique_violation());
        assert!(err.to_string().starts_with("query error:"));
    }

    #[test]
    fn test_migration_error_context() {
        let err = MigrationError::MigrationApply {
            name: "002_add_posts".to_string(),
            source: Box::new(DatabaseError::query("relation \"users\" does not exist")),
        };
        assert_eq!(err.migration_name(), Some("002_add_posts"));
        assert_eq!(err.direction(), Some(MigrationDirection::Up));
        assert!(!err.needs_reconciliation());
        assert!(err.to_string().contains("002_add_posts"));
        assert!(err.to_string().contains("does not exist"));

        let err = MigrationError::LedgerErase {
            name: "002_add_posts".to_string(),
            source: Box::new(MigrationError::LedgerWrite {
                table: "migrations".to_string(),
                source: DatabaseError::connection("connection reset"),
            }),
        };
        assert_eq!(err.direction(), Some(MigrationDirection::Down));
        assert!(err.needs_reconciliation());
    }

    #[test]
    fn test_configuration_error_has_no_migration() {
        let err = MigrationError::configuration("DB_NAME is not set");
        assert_eq!(err.migration_name(), None);
        assert_eq!(err.direction(), None);
        assert_eq!(err.to_string(), "Configuration error: DB_NAME is not set");
    }
}
