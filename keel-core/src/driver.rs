use crate::{Result, SqlWriter, Value};
use std::sync::Arc;

/// A database backend: opens physical connections and knows its dialect.
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a new physical connection.
    fn connect(&self) -> Result<Box<dyn Connection>>;

    fn sql_writer(&self) -> &dyn SqlWriter;
}

/// A physical connection. Calls block until the database answers.
///
/// `params` bind positionally to the placeholders of `sql`.
pub trait Connection: Send {
    /// Run a statement that does not produce rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowsAffected>;

    /// Run a query and collect every row.
    fn fetch(&mut self, sql: &str, params: &[Value]) -> Result<Vec<RowLabeled>>;
}

/// Metadata about modify operations (INSERT/UPDATE/DELETE).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsAffected {
    /// Total number of rows impacted.
    pub rows_affected: u64,
    /// Backend-specific last inserted identifier when available.
    pub last_affected_id: Option<i64>,
}

/// Shared reference-counted column name list.
pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` length.
pub type Row = Box<[Value]>;

/// A result row with its corresponding column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLabeled {
    /// Column names.
    pub labels: RowNames,
    /// Data values (aligned by index with `labels`).
    pub values: Row,
}

impl RowLabeled {
    pub fn new(labels: RowNames, values: Row) -> Self {
        Self { labels, values }
    }
    pub fn names(&self) -> &[String] {
        &self.labels
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v == name)
            .map(|i| &self.values()[i])
    }
}
