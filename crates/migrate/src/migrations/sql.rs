//! SQL actions
//!
//! A [`SqlAction`] holds a block of SQL, split into individual statements
//! once at construction, and executes them in order inside one transaction.
//! Statements are executed exactly as written; splitting only locates the
//! top-level `;` separators.

use async_trait::async_trait;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Location, Token, Tokenizer};

use super::definitions::MigrationAction;
use crate::backends::DatabaseConnection;
use crate::error::ActionResult;

/// Migration action that executes a block of SQL statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlAction {
    statements: Vec<String>,
    transactional: bool,
}

impl SqlAction {
    pub fn new(sql: &str) -> Self {
        Self {
            statements: split_sql_statements(sql),
            transactional: true,
        }
    }

    /// Statements run one by one with no surrounding transaction, for SQL
    /// PostgreSQL refuses inside one (e.g. `CREATE INDEX CONCURRENTLY`).
    pub fn without_transaction(sql: &str) -> Self {
        Self {
            transactional: false,
            ..Self::new(sql)
        }
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    async fn execute_all(&self, conn: &mut dyn DatabaseConnection) -> ActionResult {
        for statement in &self.statements {
            tracing::debug!("Executing: {}", statement);
            conn.execute(statement, &[]).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MigrationAction for SqlAction {
    async fn run(&self, conn: &mut dyn DatabaseConnection) -> ActionResult {
        if self.statements.is_empty() {
            return Ok(());
        }
        if !self.transactional {
            return self.execute_all(conn).await;
        }

        conn.begin().await?;

        if let Err(e) = self.execute_all(conn).await {
            if let Err(rollback_err) = conn.rollback().await {
                tracing::error!("Failed to roll back transaction: {}", rollback_err);
            }
            return Err(e);
        }

        conn.commit().await?;
        Ok(())
    }
}

/// Split a SQL block into statements at top-level `;` separators.
///
/// The block is tokenized with the PostgreSQL dialect so separators inside
/// string literals, quoted identifiers, comments and dollar-quoted bodies
/// are ignored. Each statement is the original text, trimmed, including its
/// terminating `;`. Pieces holding only whitespace or comments are dropped.
/// If the block cannot be tokenized it is returned whole.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    if sql.trim().is_empty() {
        return Vec::new();
    }

    let dialect = PostgreSqlDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize_with_location() {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("SQL tokenizing failed, executing block as one statement: {}", e);
            return vec![sql.trim().to_string()];
        }
    };

    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_content = false;

    for token in tokens {
        match token.token {
            Token::SemiColon => {
                let end = byte_offset(sql, &line_starts, &token.location)
                    .filter(|&end| sql[end..].starts_with(';'));
                let Some(end) = end else {
                    tracing::warn!("Could not map token location, executing block as one statement");
                    return vec![sql.trim().to_string()];
                };
                if has_content {
                    statements.push(sql[start..=end].trim().to_string());
                }
                start = end + 1;
                has_content = false;
            }
            Token::Whitespace(_) | Token::EOF => {}
            _ => has_content = true,
        }
    }

    if has_content {
        statements.push(sql[start..].trim().to_string());
    }

    statements
}

/// Byte offset of a 1-based line/column (in chars) location
fn byte_offset(sql: &str, line_starts: &[usize], location: &Location) -> Option<usize> {
    let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
    let column = usize::try_from(location.column).ok()?.checked_sub(1)?;
    let line_start = *line_starts.get(line)?;

    sql[line_start..]
        .char_indices()
        .nth(column)
        .map(|(i, _)| line_start + i)
}
