//! Core Database Handle Traits
//!
//! The engine never talks to a driver directly. Everything it needs from the
//! database (and everything a migration action may use) goes through the
//! [`DatabaseConnection`] capability defined here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::error::{DatabaseError, DatabaseResult};

/// Abstract database connection.
///
/// A connection is borrowed by the engine for the length of one call and is
/// used strictly sequentially.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Execute a statement and return the affected rows count
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Execute a query and return the result rows
    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query and return the first result row
    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Option<Box<dyn DatabaseRow>>>;

    /// Open a transaction on this connection
    async fn begin(&mut self) -> DatabaseResult<()> {
        self.execute("BEGIN", &[]).await.map(|_| ())
    }

    /// Commit the open transaction
    async fn commit(&mut self) -> DatabaseResult<()> {
        self.execute("COMMIT", &[]).await.map(|_| ())
    }

    /// Roll back the open transaction
    async fn rollback(&mut self) -> DatabaseResult<()> {
        self.execute("ROLLBACK", &[]).await.map(|_| ())
    }
}

/// Abstract database row
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by name
    fn get_by_name(&self, name: &str) -> DatabaseResult<DatabaseValue>;
}

/// Database value enumeration for parameter binding and row access
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Json(JsonValue),
}

impl DatabaseValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            DatabaseValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(DatabaseValue::Null)
    }
}

/// Typed column access shared by every row implementation
pub trait DatabaseRowExt {
    /// Read a non-null string column
    fn get_string(&self, column: &str) -> DatabaseResult<String>;

    /// Read a non-null timestamp column
    fn get_datetime(&self, column: &str) -> DatabaseResult<DateTime<Utc>>;
}

impl<R: DatabaseRow + ?Sized> DatabaseRowExt for R {
    fn get_string(&self, column: &str) -> DatabaseResult<String> {
        match self.get_by_name(column)? {
            DatabaseValue::String(s) => Ok(s),
            other => Err(DatabaseError::decode(format!(
                "column '{}' is not a string: {:?}",
                column, other
            ))),
        }
    }

    fn get_datetime(&self, column: &str) -> DatabaseResult<DateTime<Utc>> {
        match self.get_by_name(column)? {
            DatabaseValue::DateTime(dt) => Ok(dt),
            other => Err(DatabaseError::decode(format!(
                "column '{}' is not a timestamp: {:?}",
                column, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PairRow(Vec<(&'static str, DatabaseValue)>);

    impl DatabaseRow for PairRow {
        fn get_by_name(&self, name: &str) -> DatabaseResult<DatabaseValue> {
            self.0
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| DatabaseError::decode(format!("no column '{}'", name)))
        }
    }

    #[test]
    fn test_typed_column_access() {
        let now = Utc::now();
        let row = PairRow(vec![
            ("name", DatabaseValue::from("001_create_users_table")),
            ("applied_at", DatabaseValue::from(now)),
        ]);

        assert_eq!(row.get_string("name").unwrap(), "001_create_users_table");
        assert_eq!(row.get_datetime("applied_at").unwrap(), now);
        assert!(row.get_datetime("name").is_err());
        assert!(row.get_string("missing").is_err());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(DatabaseValue::from(None::<String>), DatabaseValue::Null);
        assert_eq!(DatabaseValue::from(Some("x")).as_str(), Some("x"));
        assert_eq!(DatabaseValue::from(3i32).as_str(), None);
        assert_eq!(DatabaseValue::from(7i64), DatabaseValue::Int64(7));
        assert!(DatabaseValue::from(true).as_datetime().is_none());
    }
}
