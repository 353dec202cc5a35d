//! SQLite backend over rusqlite. Values convert from serde_json; REGEXP is provided by the regex crate.

use super::{Connection, Row, Statement};
use crate::error::StoreError;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub struct SqliteConnection {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteConnection {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::wrap(rusqlite::Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::wrap(rusqlite::Connection::open_in_memory()?)
    }

    /// Opens `:memory:` in memory, anything else as a file path.
    pub fn open_setting(file: &str) -> Result<Self, StoreError> {
        if file.trim().is_empty() || file == ":memory:" {
            Self::open_in_memory()
        } else {
            Self::open(file)
        }
    }

    fn wrap(conn: rusqlite::Connection) -> Result<Self, StoreError> {
        register_regexp(&conn)?;
        Ok(SqliteConnection {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Connection for SqliteConnection {
    fn prepare<'a>(&'a self, sql: &str) -> Result<Box<dyn Statement + 'a>, StoreError> {
        Ok(Box::new(SqliteStatement {
            conn: self,
            sql: sql.to_string(),
            binds: Vec::new(),
            rows: Vec::new(),
            changes: 0,
            insert_id: Value::Null,
            error: None,
        }))
    }

    fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }
}

/// Bindings are collected until execute, which holds the connection lock for the whole run.
struct SqliteStatement<'a> {
    conn: &'a SqliteConnection,
    sql: String,
    binds: Vec<(String, Value)>,
    rows: Vec<Row>,
    changes: u64,
    insert_id: Value,
    error: Option<String>,
}

impl SqliteStatement<'_> {
    fn run(&mut self) -> Result<(), StoreError> {
        let handle = self.conn;
        let conn = handle.lock()?;
        let mut stmt = conn.prepare(&self.sql)?;
        for (name, value) in &self.binds {
            let placeholder = format!(":{}", name);
            let idx = stmt
                .parameter_index(&placeholder)?
                .ok_or_else(|| StoreError::UnknownParameter(name.clone()))?;
            stmt.raw_bind_parameter(idx, to_sql_value(value))?;
        }
        if stmt.column_count() == 0 {
            self.changes = stmt.raw_execute()? as u64;
            self.insert_id = Value::from(conn.last_insert_rowid());
            return Ok(());
        }
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut out = Vec::new();
        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut map = Map::new();
            for (i, name) in names.iter().enumerate() {
                map.insert(name.clone(), from_sql_value(row.get_ref(i)?));
            }
            out.push(map);
        }
        self.changes = out.len() as u64;
        self.rows = out;
        Ok(())
    }
}

impl Statement for SqliteStatement<'_> {
    fn bind_value(&mut self, name: &str, value: Value) {
        self.binds.push((name.to_string(), value));
    }

    fn execute(&mut self) -> bool {
        self.rows.clear();
        self.changes = 0;
        self.insert_id = Value::Null;
        self.error = None;
        match self.run() {
            Ok(()) => true,
            Err(e) => {
                self.error = Some(e.to_string());
                false
            }
        }
    }

    fn fetch_all(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }

    fn row_count(&self) -> u64 {
        self.changes
    }

    fn last_insert_id(&self) -> Value {
        self.insert_id.clone()
    }

    fn error_info(&self) -> Option<String> {
        self.error.clone()
    }
}

fn to_sql_value(v: &Value) -> SqlValue {
    match v {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(v.to_string()),
    }
}

fn from_sql_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
    }
}

/// `X REGEXP Y` calls `regexp(Y, X)`; the compiled pattern is cached per statement.
fn register_regexp(conn: &rusqlite::Connection) -> Result<(), StoreError> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let re: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> Result<Regex, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let text = match ctx.get_raw(1) {
                ValueRef::Null => return Ok(false),
                ValueRef::Integer(i) => i.to_string(),
                ValueRef::Real(f) => f.to_string(),
                ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
            };
            Ok(re.is_match(&text))
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conn() -> SqliteConnection {
        let c = SqliteConnection::open_in_memory().unwrap();
        c.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, flag INTEGER);")
            .unwrap();
        c
    }

    #[test]
    fn binds_by_name_and_fetches_rows() {
        let c = conn();
        let mut ins = c.prepare("INSERT INTO t (name, flag) VALUES (:name, :flag)").unwrap();
        ins.bind_value("name", json!("alpha"));
        ins.bind_value("flag", json!(true));
        assert!(ins.execute());
        assert_eq!(ins.row_count(), 1);
        assert_eq!(ins.last_insert_id(), json!(1));
        drop(ins);

        let mut sel = c.prepare("SELECT id, name, flag FROM t WHERE name = :n").unwrap();
        sel.bind_value("n", json!("alpha"));
        assert!(sel.execute());
        let rows = sel.fetch_all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], json!("alpha"));
        assert_eq!(rows[0]["flag"], json!(1));
    }

    #[test]
    fn failed_execute_reports_error_info() {
        let c = conn();
        let mut stmt = c.prepare("SELECT nope FROM t").unwrap();
        assert!(!stmt.execute());
        assert!(stmt.error_info().is_some());
    }

    #[test]
    fn unknown_parameter_fails_execute() {
        let c = conn();
        let mut stmt = c.prepare("SELECT * FROM t WHERE id = :id").unwrap();
        stmt.bind_value("other", json!(1));
        assert!(!stmt.execute());
        assert!(stmt.error_info().unwrap().contains("other"));
    }

    #[test]
    fn regexp_function_is_available() {
        let c = conn();
        c.execute_batch("INSERT INTO t (name) VALUES ('Rust'), ('Go'), (NULL);").unwrap();
        let mut stmt = c.prepare("SELECT name FROM t WHERE name REGEXP :re").unwrap();
        stmt.bind_value("re", json!("^R"));
        assert!(stmt.execute());
        assert_eq!(stmt.fetch_all(), vec![json!({"name": "Rust"}).as_object().unwrap().clone()]);
    }
}
