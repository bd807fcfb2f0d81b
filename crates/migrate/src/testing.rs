//! In-memory database handle for tests
//!
//! [`MemoryConnection`] emulates the ledger table (recognising the exact
//! statements a [`Ledger`] issues), journals every other statement it is
//! given, and can be told to fail specific statements or ledger writes.
//! `BEGIN`/`COMMIT`/`ROLLBACK` are not journaled; a rollback discards the
//! statements journaled since the matching `BEGIN`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::backends::{DatabaseConnection, DatabaseRow, DatabaseValue};
use crate::error::{ActionResult, DatabaseError, DatabaseResult};
use crate::migrations::{Ledger, MigrationAction};

pub struct MemoryConnection {
    ledger: Ledger,
    table_exists: bool,
    entries: Vec<(u64, String, DateTime<Utc>)>,
    next_id: u64,
    journal: Vec<String>,
    fail_on: Vec<String>,
    fail_ledger_init: bool,
    fail_record_for: Option<String>,
    fail_erase_for: Option<String>,
    calls: usize,
    tx_start: Option<usize>,
    committed: usize,
    rolled_back: usize,
}

impl MemoryConnection {
    pub fn new(ledger: &Ledger) -> Self {
        Self {
            ledger: ledger.clone(),
            table_exists: false,
            entries: Vec::new(),
            next_id: 1,
            journal: Vec::new(),
            fail_on: Vec::new(),
            fail_ledger_init: false,
            fail_record_for: None,
            fail_erase_for: None,
            calls: 0,
            tx_start: None,
            committed: 0,
            rolled_back: 0,
        }
    }

    /// Fail any journaled statement containing `fragment`
    pub fn fail_on(mut self, fragment: &str) -> Self {
        self.fail_on.push(fragment.to_string());
        self
    }

    pub fn fail_ledger_init(mut self) -> Self {
        self.fail_ledger_init = true;
        self
    }

    pub fn fail_record_for(mut self, name: &str) -> Self {
        self.fail_record_for = Some(name.to_string());
        self
    }

    pub fn fail_erase_for(mut self, name: &str) -> Self {
        self.fail_erase_for = Some(name.to_string());
        self
    }

    /// Pretend `name` was applied by an earlier run
    pub fn with_applied(mut self, name: &str) -> Self {
        self.table_exists = true;
        self.insert(name, Utc::now());
        self
    }

    pub fn stop_failing(&mut self) {
        self.fail_on.clear();
        self.fail_record_for = None;
        self.fail_erase_for = None;
    }

    /// Ledger names in insertion order
    pub fn applied_names(&self) -> Vec<String> {
        self.entries.iter().map(|(_, name, _)| name.clone()).collect()
    }

    /// Non-ledger statements executed so far, in order
    pub fn journal(&self) -> &[String] {
        &self.journal
    }

    /// Number of journaled statements containing `fragment`
    pub fn executed_count(&self, fragment: &str) -> usize {
        self.journal.iter().filter(|s| s.contains(fragment)).count()
    }

    /// Total calls made on this handle
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn committed(&self) -> usize {
        self.committed
    }

    pub fn rolled_back(&self) -> usize {
        self.rolled_back
    }

    fn transaction_control(&mut self, sql: &str) -> Option<DatabaseResult<u64>> {
        let command = sql.trim().trim_end_matches(';').to_ascii_uppercase();
        let result = match command.as_str() {
            "BEGIN" => {
                if self.tx_start.is_some() {
                    return Some(Err(DatabaseError::query("there is already a transaction in progress")));
                }
                self.tx_start = Some(self.journal.len());
                Ok(0)
            }
            "COMMIT" => {
                self.tx_start = None;
                self.committed += 1;
                Ok(0)
            }
            "ROLLBACK" => {
                if let Some(start) = self.tx_start.take() {
                    self.journal.truncate(start);
                }
                self.rolled_back += 1;
                Ok(0)
            }
            _ => return None,
        };
        Some(result)
    }

    fn insert(&mut self, name: &str, applied_at: DateTime<Utc>) {
        self.entries.push((self.next_id, name.to_string(), applied_at));
        self.next_id += 1;
    }

    fn require_table(&self) -> DatabaseResult<()> {
        if self.table_exists {
            Ok(())
        } else {
            Err(DatabaseError::query(format!(
                "relation \"{}\" does not exist",
                self.ledger.table()
            )))
        }
    }

    fn journal_statement(&mut self, sql: &str) -> DatabaseResult<()> {
        if let Some(fragment) = self.fail_on.iter().find(|f| sql.contains(f.as_str())) {
            return Err(DatabaseError::query(format!(
                "statement rejected (matched '{}'): {}",
                fragment, sql
            )));
        }
        self.journal.push(sql.to_string());
        Ok(())
    }
}

fn name_param(params: &[DatabaseValue]) -> DatabaseResult<String> {
    params
        .first()
        .and_then(|p| p.as_str())
        .map(str::to_string)
        .ok_or_else(|| DatabaseError::query("expected a name parameter"))
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        self.calls += 1;

        if sql == self.ledger.create_table_sql() {
            if self.fail_ledger_init {
                return Err(DatabaseError::connection("permission denied for schema public"));
            }
            self.table_exists = true;
            return Ok(0);
        }

        if sql == self.ledger.record_sql() {
            self.require_table()?;
            let name = name_param(params)?;
            if self.fail_record_for.as_deref() == Some(name.as_str()) {
                return Err(DatabaseError::connection("connection reset by peer"));
            }
            if self.entries.iter().any(|(_, n, _)| *n == name) {
                return Err(DatabaseError::unique_violation(format!(
                    "duplicate key value violates unique constraint \"{}_name_key\"",
                    self.ledger.table()
                )));
            }
            let applied_at = params
                .get(1)
                .and_then(|p| p.as_datetime())
                .unwrap_or_else(Utc::now);
            self.insert(&name, applied_at);
            return Ok(1);
        }

        if sql == self.ledger.erase_sql() {
            self.require_table()?;
            let name = name_param(params)?;
            if self.fail_erase_for.as_deref() == Some(name.as_str()) {
                return Err(DatabaseError::connection("connection reset by peer"));
            }
            let before = self.entries.len();
            self.entries.retain(|(_, n, _)| *n != name);
            return Ok((before - self.entries.len()) as u64);
        }

        if let Some(result) = self.transaction_control(sql) {
            return result;
        }

        self.journal_statement(sql)?;
        Ok(0)
    }

    async fn fetch_all(
        &mut self,
        sql: &str,
        _params: &[DatabaseValue],
    ) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>> {
        self.calls += 1;

        if sql == self.ledger.entries_sql() {
            self.require_table()?;
            let mut entries = self.entries.clone();
            entries.sort_by(|a, b| a.2.cmp(&b.2).then(a.0.cmp(&b.0)));
            return Ok(entries
                .into_iter()
                .map(|(_, name, applied_at)| {
                    Box::new(MemoryRow::new(vec![
                        ("name", DatabaseValue::String(name)),
                        ("applied_at", DatabaseValue::DateTime(applied_at)),
                    ])) as Box<dyn DatabaseRow>
                })
                .collect());
        }

        self.journal_statement(sql)?;
        Ok(Vec::new())
    }

    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> DatabaseResult<Option<Box<dyn DatabaseRow>>> {
        self.calls += 1;

        if sql == self.ledger.check_sql() {
            self.require_table()?;
            let name = name_param(params)?;
            let found = self.entries.iter().any(|(_, n, _)| *n == name);
            return Ok(found.then(|| {
                Box::new(MemoryRow::new(vec![("?column?", DatabaseValue::Int32(1))])) as Box<dyn DatabaseRow>
            }));
        }

        self.journal_statement(sql)?;
        Ok(None)
    }
}

/// Row returned by [`MemoryConnection`]
pub struct MemoryRow {
    columns: Vec<(String, DatabaseValue)>,
}

impl MemoryRow {
    pub fn new(columns: Vec<(&str, DatabaseValue)>) -> Self {
        Self {
            columns: columns.into_iter().map(|(n, v)| (n.to_string(), v)).collect(),
        }
    }
}

impl DatabaseRow for MemoryRow {
    fn get_by_name(&self, name: &str) -> DatabaseResult<DatabaseValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| DatabaseError::decode(format!("Column '{}' not found", name)))
    }
}

/// Action that executes one statement verbatim
pub struct Exec(String);

impl Exec {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }
}

#[async_trait]
impl MigrationAction for Exec {
    async fn run(&self, conn: &mut dyn DatabaseConnection) -> ActionResult {
        conn.execute(&self.0, &[]).await?;
        Ok(())
    }
}
