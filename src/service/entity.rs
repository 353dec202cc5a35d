//! Entity: paged search, relationship-aware reads, and validated writes for one declared table.

use crate::config::{EntitySchema, FilterOperator};
use crate::error::{AppError, ValidationErrors};
use crate::service::hooks::EntityHooks;
use crate::service::relations::RelationshipResolver;
use crate::service::{QueryBuilder, RequestValidator};
use crate::sql::Operator;
use crate::state::AppState;
use crate::store::Row;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Paging in effect for the next read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub offset: u64,
    pub limit: Option<u64>,
}

pub struct Entity {
    schema: Arc<EntitySchema>,
    app: AppState,
    query: QueryBuilder,
    hooks: Arc<dyn EntityHooks>,
    columns: Vec<String>,
    offset: u64,
    limit: Option<u64>,
    order_by: Option<String>,
}

fn as_count(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Accepts `col`, `col ASC`, `t.col desc`, comma separated.
fn check_order(expr: &str) -> Result<(), AppError> {
    for part in expr.split(',') {
        let tokens: Vec<&str> = part.split_whitespace().collect();
        let ok = match tokens.as_slice() {
            [col] => is_identifier(col),
            [col, dir] => {
                is_identifier(col)
                    && (dir.eq_ignore_ascii_case("asc") || dir.eq_ignore_ascii_case("desc"))
            }
            _ => false,
        };
        if !ok {
            return Err(AppError::InvalidArgument(format!("invalid order: {}", expr)));
        }
    }
    Ok(())
}

fn require_id(id: &Value) -> Result<(), AppError> {
    if id.is_null() {
        return Err(AppError::InvalidArgument("undefined id".into()));
    }
    Ok(())
}

impl Entity {
    pub fn new(schema: Arc<EntitySchema>, app: AppState) -> Self {
        let limit = schema
            .limit
            .or_else(|| app.settings.get_parsed("pagination.limit"));
        Entity {
            query: QueryBuilder::new(app.executor()),
            hooks: app.hooks_for(&schema.name),
            columns: schema.columns.clone(),
            order_by: schema.order_by.clone(),
            offset: 0,
            limit,
            schema,
            app,
        }
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Text of the last statement this entity ran.
    pub fn last_query(&self) -> &str {
        self.query.last_query()
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            offset: self.offset,
            limit: self.limit,
        }
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = offset;
        self
    }

    pub fn limit(&mut self, limit: Option<u64>) -> &mut Self {
        self.limit = limit;
        self
    }

    pub fn order_by(&mut self, expr: &str) -> &mut Self {
        self.order_by = Some(expr.to_string()).filter(|o| !o.trim().is_empty());
        self
    }

    /// Select `column` too when the entity restricts its columns.
    pub fn ensure_column(&mut self, column: &str) -> &mut Self {
        if !self.columns.is_empty() && !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
        self
    }

    pub fn where_compare(
        &mut self,
        column: &str,
        value: Value,
        operator: Operator,
        table: Option<&str>,
    ) -> &mut Self {
        self.query.where_compare(column, value, operator, table);
        self
    }

    pub fn where_in(&mut self, column: &str, values: Vec<Value>, table: Option<&str>) -> &mut Self {
        self.query.where_in(column, values, table);
        self
    }

    /// Apply `limit`, `offset`, `order` and every declared filter present in `params`.
    pub fn search(&mut self, params: &Map<String, Value>) -> Result<&mut Self, AppError> {
        if let Some(limit) = params.get("limit").and_then(as_count) {
            self.limit = Some(limit);
        }
        if let Some(offset) = params.get("offset").and_then(as_count) {
            self.offset = offset;
        }
        if let Some(order) = params.get("order").filter(|v| !v.is_null()).map(as_text) {
            check_order(&order)?;
            self.order_by(&order);
        }
        let schema = self.schema.clone();
        for (key, value) in params {
            let Some(filter) = schema.filters.get(key) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if let Some(rel) = schema.belongs_to_many().find(|r| r.alias == filter.column) {
                let values = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                self.query.where_in(&rel.foreign_key, values, Some(&rel.pivot));
                continue;
            }
            let value = match filter.operator {
                FilterOperator::Contains => Value::String(format!("%{}%", as_text(value))),
                _ => value.clone(),
            };
            self.query.where_compare(
                &filter.column,
                value,
                Operator::from(filter.operator),
                filter.table.as_deref(),
            );
        }
        Ok(self)
    }

    /// Rows for the current page, with every relationship resolved.
    pub fn get(&mut self) -> Result<Vec<Row>, AppError> {
        self.fetch(self.offset, self.limit)
    }

    /// First row of the current page.
    pub fn first(&mut self) -> Result<Option<Row>, AppError> {
        Ok(self.get()?.into_iter().next())
    }

    /// Rows matching the pending conditions, ignoring paging.
    pub fn count(&mut self) -> Result<u64, AppError> {
        let schema = self.schema.clone();
        let resolver = RelationshipResolver::new(&schema);
        self.query.use_table(&schema.table);
        resolver.join_has_one(&mut self.query);
        resolver.join_belongs_to_many(&mut self.query);
        self.query.count(&schema.primary_key)
    }

    pub fn find(&mut self, id: &Value) -> Result<Row, AppError> {
        require_id(id)?;
        let schema = self.schema.clone();
        self.query
            .where_compare(&schema.primary_key, id.clone(), Operator::Eq, Some(&schema.table));
        self.fetch(0, Some(1))?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("{} {}", schema.name, as_text(id))))
    }

    fn fetch(&mut self, offset: u64, limit: Option<u64>) -> Result<Vec<Row>, AppError> {
        let schema = self.schema.clone();
        let resolver = RelationshipResolver::new(&schema);
        if let Err(e) = self.hooks.before_get(&schema, &mut self.query) {
            self.query.reset();
            return Err(e);
        }

        let columns = if self.columns.is_empty() {
            vec![format!("{}.*", schema.table)]
        } else {
            self.columns.clone()
        };
        self.query
            .use_table(&schema.table)
            .select_columns(columns)
            .offset(offset)
            .limit(limit);
        if let Some(order) = &self.order_by {
            self.query.order_by(order);
        }
        resolver.join_has_one(&mut self.query);
        resolver.join_belongs_to_many(&mut self.query);

        let mut rows = self.query.fetch_all()?;
        resolver.attach_has_many(&mut self.query, &self.app, &mut rows)?;
        resolver.format_belongs_to_many(&mut rows);
        resolver.format_has_one(&mut rows);
        self.hooks.after_get(&schema, &mut rows)?;
        Ok(rows)
    }

    /// Field name to failing rule for `attributes`, or `None`.
    pub fn validation_errors(&self, attributes: &Map<String, Value>) -> Option<ValidationErrors> {
        RequestValidator::for_schema(&self.schema).errors(attributes)
    }

    fn fillable(&self, attributes: &Map<String, Value>) -> Map<String, Value> {
        attributes
            .iter()
            .filter(|(k, _)| self.schema.fillable.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Insert the fillable attributes, sync nested relationships, and return the stored record.
    pub fn create(&mut self, attributes: Map<String, Value>) -> Result<Row, AppError> {
        let schema = self.schema.clone();
        let attributes = self.hooks.before_create(&schema, attributes)?;
        let fields = self.fillable(&attributes);
        if let Some(errors) = self.validation_errors(&fields) {
            return Err(AppError::Validation(errors));
        }

        let given_id = fields.get(&schema.primary_key).filter(|v| !v.is_null()).cloned();
        let generated = self
            .query
            .use_table(&schema.table)
            .set_fields(fields)
            .insert_returning_id(Map::new())?;
        let id = given_id.unwrap_or(generated);

        self.write_relationships(&id, &attributes)?;
        let model = self.find(&id)?;
        tracing::info!(entity = %schema.name, id = %as_text(&id), "created");
        self.hooks.after_create(&schema, &id, &attributes, model)
    }

    /// Update the fillable attributes of `id`, sync nested relationships, and return the stored record.
    pub fn update(&mut self, id: &Value, attributes: Map<String, Value>) -> Result<Row, AppError> {
        require_id(id)?;
        let schema = self.schema.clone();
        let attributes = self.hooks.before_update(&schema, id, attributes)?;
        let fields = self.fillable(&attributes);
        if let Some(errors) = self.validation_errors(&fields) {
            return Err(AppError::Validation(errors));
        }

        if fields.is_empty() {
            self.find(id)?;
        } else {
            let affected = self
                .query
                .use_table(&schema.table)
                .where_compare(&schema.primary_key, id.clone(), Operator::Eq, None)
                .set_fields(fields)
                .update(Map::new())?;
            if affected == 0 {
                return Err(AppError::NotFound(format!("{} {}", schema.name, as_text(id))));
            }
        }

        self.write_relationships(id, &attributes)?;
        let model = self.find(id)?;
        tracing::info!(entity = %schema.name, id = %as_text(id), "updated");
        self.hooks.after_update(&schema, id, &attributes, model)
    }

    /// Delete `id`. Fails when no row was removed.
    pub fn destroy(&mut self, id: &Value) -> Result<Value, AppError> {
        require_id(id)?;
        let schema = self.schema.clone();
        self.hooks.before_destroy(&schema, id)?;
        let affected = self
            .query
            .use_table(&schema.table)
            .where_compare(&schema.primary_key, id.clone(), Operator::Eq, None)
            .delete()?;
        if affected == 0 {
            return Err(AppError::Execution(format!(
                "could not destroy {} {}",
                schema.name,
                as_text(id)
            )));
        }
        self.hooks.after_destroy(&schema, id)?;
        tracing::info!(entity = %schema.name, id = %as_text(id), "destroyed");
        Ok(id.clone())
    }

    fn write_relationships(&mut self, id: &Value, attributes: &Map<String, Value>) -> Result<(), AppError> {
        let schema = self.schema.clone();
        let resolver = RelationshipResolver::new(&schema);
        resolver.sync_belongs_to_many(&mut self.query, id, attributes)?;
        resolver.upsert_has_many(&mut self.query, &self.app, id, attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_expressions_are_checked() {
        assert!(check_order("title").is_ok());
        assert!(check_order("posts.created_at DESC, id asc").is_ok());
        assert!(check_order("title; DROP TABLE posts").is_err());
        assert!(check_order("title sideways").is_err());
        assert!(check_order("1").is_err());
    }

    #[test]
    fn counts_parse_from_numbers_and_text() {
        assert_eq!(as_count(&Value::from(5)), Some(5));
        assert_eq!(as_count(&Value::from(" 7 ")), Some(7));
        assert_eq!(as_count(&Value::from("x")), None);
    }
}
