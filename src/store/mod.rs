//! Backend seam: a shared connection that prepares statements, and statements that bind, run and fetch.

mod sqlite;
pub use sqlite::SqliteConnection;

use crate::error::StoreError;
use serde_json::{Map, Value};

/// One fetched row: column name to scalar.
pub type Row = Map<String, Value>;

/// A prepared statement. Created and discarded per terminal operation.
pub trait Statement {
    /// Bind `value` to the named parameter `name` (without the leading `:`).
    fn bind_value(&mut self, name: &str, value: Value);

    /// Run the statement; `false` when the backend rejected it (see [`Statement::error_info`]).
    fn execute(&mut self) -> bool;

    /// Rows produced by the last execute.
    fn fetch_all(&mut self) -> Vec<Row>;

    /// Rows changed (writes) or returned (reads) by the last execute.
    fn row_count(&self) -> u64;

    /// Key generated by this statement's insert, read before the connection is released.
    fn last_insert_id(&self) -> Value;

    /// Backend message for the last failed execute.
    fn error_info(&self) -> Option<String>;
}

/// Shared, read-mostly handle owned by the application context.
pub trait Connection: Send + Sync {
    fn prepare<'a>(&'a self, sql: &str) -> Result<Box<dyn Statement + 'a>, StoreError>;

    /// Run a batch of statements without parameters (schema setup, fixtures).
    fn execute_batch(&self, sql: &str) -> Result<(), StoreError>;
}
