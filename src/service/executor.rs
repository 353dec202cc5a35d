//! Runs rendered statements against the shared connection.

use crate::config::Settings;
use crate::error::AppError;
use crate::sql::QueryBuf;
use crate::store::{Connection, Row, Statement};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct Executor {
    conn: Arc<dyn Connection>,
    query_log: Option<PathBuf>,
}

impl Executor {
    pub fn new(conn: Arc<dyn Connection>, settings: &Settings) -> Self {
        Executor {
            conn,
            query_log: settings.query_log().map(PathBuf::from),
        }
    }

    /// Run a SELECT and return its rows.
    pub fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        let mut stmt = self.run(q)?;
        Ok(stmt.fetch_all())
    }

    /// Run a write and return the number of affected rows.
    pub fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        let stmt = self.run(q)?;
        Ok(stmt.row_count())
    }

    /// Run an INSERT and return the key it generated.
    pub fn insert(&self, q: &QueryBuf) -> Result<Value, AppError> {
        let stmt = self.run(q)?;
        Ok(stmt.last_insert_id())
    }

    fn run(&self, q: &QueryBuf) -> Result<Box<dyn Statement + '_>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        self.log(&q.sql);
        let mut stmt = self.conn.prepare(&q.sql).map_err(|e| AppError::QueryExecution {
            message: e.to_string(),
            sql: q.sql.clone(),
        })?;
        for (name, value) in &q.params {
            stmt.bind_value(name, value.clone());
        }
        if !stmt.execute() {
            let message = stmt
                .error_info()
                .unwrap_or_else(|| "statement failed".to_string());
            tracing::error!(sql = %q.sql, error = %message, "statement failed");
            return Err(AppError::QueryExecution {
                message,
                sql: q.sql.clone(),
            });
        }
        Ok(stmt)
    }

    fn log(&self, sql: &str) {
        let Some(path) = &self.query_log else { return };
        let line = format!("{} - {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"), sql);
        let written = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = written {
            tracing::warn!(path = %path.display(), error = %e, "could not write query log");
        }
    }
}
