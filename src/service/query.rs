//! Fluent query builder. Mutators only touch the pending state; terminal operations
//! render, execute, and always leave the state back at its defaults.

use crate::error::AppError;
use crate::service::Executor;
use crate::sql::{builder, Comparison, Join, JoinKind, Membership, Operator, Pattern, QueryState, Range};
use crate::store::Row;
use serde_json::{Map, Value};

pub struct QueryBuilder {
    executor: Executor,
    state: QueryState,
    last_query: String,
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

impl QueryBuilder {
    pub fn new(executor: Executor) -> Self {
        QueryBuilder {
            executor,
            state: QueryState::default(),
            last_query: String::new(),
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Text of the most recently executed statement.
    pub fn last_query(&self) -> &str {
        &self.last_query
    }

    pub fn select_columns<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_column(&mut self, column: impl Into<String>) -> &mut Self {
        let column = column.into();
        if !self.state.columns.contains(&column) {
            self.state.columns.push(column);
        }
        self
    }

    pub fn use_table(&mut self, table: &str) -> &mut Self {
        self.state.table = table.to_string();
        self
    }

    pub fn join(
        &mut self,
        table: &str,
        left_key: &str,
        operator: Operator,
        right_key: &str,
        kind: JoinKind,
    ) -> &mut Self {
        self.state.joins.push(Join {
            table: table.to_string(),
            left_key: left_key.to_string(),
            operator,
            right_key: right_key.to_string(),
            kind,
        });
        self
    }

    /// `table` defaults to the statement's table.
    pub fn where_compare(
        &mut self,
        column: &str,
        value: Value,
        operator: Operator,
        table: Option<&str>,
    ) -> &mut Self {
        self.state.wheres.push(Comparison {
            table: table.map(String::from),
            column: column.to_string(),
            operator,
            value,
        });
        self
    }

    pub fn where_in(&mut self, column: &str, values: Vec<Value>, table: Option<&str>) -> &mut Self {
        self.state.where_in.push(Membership {
            table: table.map(String::from),
            column: column.to_string(),
            values,
        });
        self
    }

    /// Inclusive range. A blank bound degrades to a one-sided comparison; two blanks add nothing.
    pub fn where_between(&mut self, column: &str, low: Value, high: Value, table: Option<&str>) -> &mut Self {
        match (is_blank(&low), is_blank(&high)) {
            (false, false) => self.state.betweens.push(Range {
                table: table.map(String::from),
                column: column.to_string(),
                low,
                high,
            }),
            (false, true) => {
                self.where_compare(column, low, Operator::Gt, table);
            }
            (true, false) => {
                self.where_compare(column, high, Operator::Lt, table);
            }
            (true, true) => {}
        }
        self
    }

    pub fn where_matches(&mut self, column: &str, regex: &str, table: Option<&str>) -> &mut Self {
        self.state.regexps.push(Pattern {
            table: table.map(String::from),
            column: column.to_string(),
            regex: regex.to_string(),
        });
        self
    }

    pub fn group_by(&mut self, column: &str) -> &mut Self {
        if !column.trim().is_empty() {
            self.state.group_by = Some(column.to_string());
        }
        self
    }

    pub fn order_by(&mut self, expr: &str) -> &mut Self {
        if !expr.trim().is_empty() {
            self.state.order_by.push(expr.to_string());
        }
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.state.offset = offset;
        self
    }

    /// `None` removes the limit.
    pub fn limit(&mut self, limit: Option<u64>) -> &mut Self {
        self.state.limit = limit;
        self
    }

    /// Stage column values for the next `insert` or `update`.
    pub fn set_fields(&mut self, fields: Map<String, Value>) -> &mut Self {
        self.state.fields.extend(fields);
        self
    }

    /// Discard pending state without running anything.
    pub fn reset(&mut self) {
        self.state = QueryState::default();
    }

    /// Take the pending state, leaving defaults behind.
    fn take(&mut self) -> QueryState {
        std::mem::take(&mut self.state)
    }

    pub fn fetch_all(&mut self) -> Result<Vec<Row>, AppError> {
        let state = self.take();
        let q = builder::select(&state);
        self.last_query = q.sql.clone();
        self.executor.fetch_all(&q)
    }

    pub fn fetch_one(&mut self) -> Result<Option<Row>, AppError> {
        Ok(self.fetch_all()?.into_iter().next())
    }

    /// Number of rows matching the pending state, paging ignored.
    pub fn count(&mut self, column: &str) -> Result<u64, AppError> {
        let state = self.take();
        let q = builder::count(&state, column);
        self.last_query = q.sql.clone();
        let rows = self.executor.fetch_all(&q)?;
        Ok(rows
            .first()
            .and_then(|r| r.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    /// Insert the staged fields plus `fields`; `fields` wins on overlap.
    pub fn insert(&mut self, fields: Map<String, Value>) -> Result<(), AppError> {
        self.insert_returning_id(fields)?;
        Ok(())
    }

    /// Insert and return the generated key, read on the same connection hold as the INSERT.
    pub fn insert_returning_id(&mut self, fields: Map<String, Value>) -> Result<Value, AppError> {
        let mut state = self.take();
        state.fields.extend(fields);
        let q = builder::insert(&state.table, &state.fields);
        self.last_query = q.sql.clone();
        self.executor.insert(&q)
    }

    /// UPDATE the staged fields plus `fields`, scoped by the pending conditions. Returns affected rows.
    pub fn update(&mut self, fields: Map<String, Value>) -> Result<u64, AppError> {
        let mut state = self.take();
        state.fields.extend(fields);
        if state.fields.is_empty() {
            return Err(AppError::InvalidArgument("no fields to update".into()));
        }
        let q = builder::update(&state);
        self.last_query = q.sql.clone();
        self.executor.execute(&q)
    }

    /// DELETE scoped by the pending conditions. Returns affected rows.
    pub fn delete(&mut self) -> Result<u64, AppError> {
        let state = self.take();
        let q = builder::delete(&state);
        self.last_query = q.sql.clone();
        self.executor.execute(&q)
    }
}
