//! Relationship resolution for an entity: joins for has-one and belongs-to-many,
//! batched follow-up queries for has-many, and the matching nested writes.

use crate::config::{BelongsToMany, EntitySchema, HasMany, HasManyTarget, SyncMode};
use crate::error::AppError;
use crate::service::QueryBuilder;
use crate::sql::{JoinKind, Operator};
use crate::state::AppState;
use crate::store::Row;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Comparable text for a key value; numbers and numeric strings compare equal.
pub(crate) fn value_key(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        other => Some(other.to_string()),
    }
}

fn same_key(a: Option<&Value>, b: &Value) -> bool {
    match (a.and_then(value_key), value_key(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Integer when it parses as one, text otherwise.
fn parse_id(raw: &str) -> Value {
    let raw = raw.trim();
    raw.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Non-null values with duplicates dropped, first occurrence kept.
fn distinct(values: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| value_key(v).map(|k| seen.insert(k)).unwrap_or(false))
        .collect()
}

pub struct RelationshipResolver<'a> {
    schema: &'a EntitySchema,
}

impl<'a> RelationshipResolver<'a> {
    pub fn new(schema: &'a EntitySchema) -> Self {
        RelationshipResolver { schema }
    }

    /// LEFT JOIN each has-one table and select its columns as `_<alias>_<column>`.
    pub fn join_has_one(&self, query: &mut QueryBuilder) {
        for rel in self.schema.has_one() {
            query.join(&rel.table, &rel.local_key, Operator::Eq, &rel.foreign_key, JoinKind::Left);
            for col in &rel.columns {
                query.add_column(format!("{}.{} AS {}{}", rel.table, col, rel.prefix(), col));
            }
        }
    }

    /// LEFT JOIN each pivot, aggregate related ids, and group by the primary key.
    pub fn join_belongs_to_many(&self, query: &mut QueryBuilder) {
        let mut any = false;
        for rel in self.schema.belongs_to_many() {
            query.join(
                &rel.pivot,
                &self.schema.primary_key,
                Operator::Eq,
                &rel.local_key,
                JoinKind::Left,
            );
            query.add_column(format!(
                "GROUP_CONCAT(DISTINCT {}.{}) AS {}",
                rel.pivot,
                rel.foreign_key,
                rel.concat_column()
            ));
            any = true;
        }
        if any {
            query.group_by(&self.schema.qualified_key());
        }
    }

    /// Attach every has-many alias to `rows`: one IN query per relationship, grouped by foreign key.
    pub fn attach_has_many(
        &self,
        query: &mut QueryBuilder,
        app: &AppState,
        rows: &mut [Row],
    ) -> Result<(), AppError> {
        if rows.is_empty() {
            return Ok(());
        }
        for rel in self.schema.has_many() {
            let ids = distinct(rows.iter().filter_map(|r| r.get(&rel.local_key).cloned()));
            let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
            if !ids.is_empty() {
                for mut child in self.fetch_children(query, app, rel, ids)? {
                    let Some(key) = child.get(&rel.foreign_key).and_then(value_key) else {
                        continue;
                    };
                    if !rel.columns.contains(&rel.foreign_key) {
                        child.remove(&rel.foreign_key);
                    }
                    groups.entry(key).or_default().push(Value::Object(child));
                }
            }
            if let Some(limit) = rel.limit {
                for group in groups.values_mut() {
                    group.truncate(limit as usize);
                }
            }
            for row in rows.iter_mut() {
                let children = row
                    .get(&rel.local_key)
                    .and_then(value_key)
                    .and_then(|k| groups.get(&k).cloned())
                    .unwrap_or_default();
                row.insert(rel.alias.clone(), Value::Array(children));
            }
        }
        Ok(())
    }

    fn fetch_children(
        &self,
        query: &mut QueryBuilder,
        app: &AppState,
        rel: &HasMany,
        ids: Vec<Value>,
    ) -> Result<Vec<Row>, AppError> {
        match &rel.target {
            HasManyTarget::Model(name) => {
                let mut child = app.entity(name)?;
                child.ensure_column(&rel.foreign_key);
                child.where_in(&rel.foreign_key, ids, None).limit(None);
                if let Some(order) = &rel.order_by {
                    child.order_by(order);
                }
                child.get()
            }
            HasManyTarget::Table { name, .. } => {
                let mut columns = vec![rel.foreign_key.clone()];
                columns.extend(rel.columns.iter().filter(|c| **c != rel.foreign_key).cloned());
                query
                    .use_table(name)
                    .select_columns(columns)
                    .where_in(&rel.foreign_key, ids, None)
                    .limit(None);
                if let Some(order) = &rel.order_by {
                    query.order_by(order);
                }
                query.fetch_all()
            }
        }
    }

    /// Replace `concat_<alias>` with an id array under the alias.
    pub fn format_belongs_to_many(&self, rows: &mut [Row]) {
        for rel in self.schema.belongs_to_many() {
            let concat = rel.concat_column();
            for row in rows.iter_mut() {
                let Some(raw) = row.remove(&concat) else {
                    continue;
                };
                let ids = match raw {
                    Value::String(s) if !s.is_empty() => s.split(',').map(parse_id).collect(),
                    Value::Number(n) => vec![Value::Number(n)],
                    _ => Vec::new(),
                };
                row.insert(rel.alias.clone(), Value::Array(ids));
            }
        }
    }

    /// Fold `_<alias>_<column>` keys into a nested object, or null when the join matched nothing.
    pub fn format_has_one(&self, rows: &mut [Row]) {
        for rel in self.schema.has_one() {
            let prefix = rel.prefix();
            for row in rows.iter_mut() {
                let keys: Vec<String> = row
                    .keys()
                    .filter(|k| k.len() > prefix.len() && k.starts_with(&prefix))
                    .cloned()
                    .collect();
                if keys.is_empty() {
                    continue;
                }
                let mut nested = Map::new();
                for key in keys {
                    if let Some(v) = row.remove(&key) {
                        nested.insert(key[prefix.len()..].to_string(), v);
                    }
                }
                let value = if nested.values().all(Value::is_null) {
                    Value::Null
                } else {
                    Value::Object(nested)
                };
                row.insert(rel.alias.clone(), value);
            }
        }
    }

    /// For each syncing pivot present in `attributes`, make its rows exactly the given ids.
    pub fn sync_belongs_to_many(
        &self,
        query: &mut QueryBuilder,
        id: &Value,
        attributes: &Map<String, Value>,
    ) -> Result<(), AppError> {
        for rel in self.schema.belongs_to_many().filter(|r| r.sync) {
            let Some(Value::Array(values)) = attributes.get(&rel.alias) else {
                continue;
            };
            self.sync_pivot(query, rel, id, distinct(values.iter().cloned()))?;
        }
        Ok(())
    }

    fn sync_pivot(
        &self,
        query: &mut QueryBuilder,
        rel: &BelongsToMany,
        id: &Value,
        related: Vec<Value>,
    ) -> Result<(), AppError> {
        query
            .use_table(&rel.pivot)
            .where_compare(&rel.local_key, id.clone(), Operator::Eq, None)
            .delete()?;
        for related_id in related {
            let mut fields = Map::new();
            fields.insert(rel.local_key.clone(), id.clone());
            fields.insert(rel.foreign_key.clone(), related_id);
            query.use_table(&rel.pivot).insert(fields)?;
        }
        tracing::debug!(entity = %self.schema.name, pivot = %rel.pivot, "pivot synced");
        Ok(())
    }

    /// Write nested children for each syncing has-many present in `attributes`.
    /// Children naming a parent other than `id` are skipped.
    pub fn upsert_has_many(
        &self,
        query: &mut QueryBuilder,
        app: &AppState,
        id: &Value,
        attributes: &Map<String, Value>,
    ) -> Result<(), AppError> {
        for rel in self.schema.has_many().filter(|r| !r.sync.is_empty()) {
            let Some(Value::Array(items)) = attributes.get(&rel.alias) else {
                continue;
            };
            let items: Vec<Map<String, Value>> =
                items.iter().filter_map(|v| v.as_object().cloned()).collect();
            match &rel.target {
                HasManyTarget::Model(name) => self.upsert_through_model(app, rel, name, id, items)?,
                HasManyTarget::Table { name, primary_key } => {
                    self.upsert_through_table(query, rel, name, primary_key, id, items)?
                }
            }
        }
        Ok(())
    }

    fn upsert_through_model(
        &self,
        app: &AppState,
        rel: &HasMany,
        model: &str,
        id: &Value,
        items: Vec<Map<String, Value>>,
    ) -> Result<(), AppError> {
        let mut child = app.entity(model)?;
        let pk = child.schema().primary_key.clone();

        if rel.syncs(SyncMode::Overwrite) {
            let keep = incoming_keys(&items, &pk);
            child
                .where_compare(&rel.foreign_key, id.clone(), Operator::Eq, None)
                .limit(None);
            for existing in child.get()? {
                let Some(existing_id) = existing.get(&pk) else {
                    continue;
                };
                if !value_key(existing_id).map(|k| keep.contains(&k)).unwrap_or(false) {
                    child.destroy(existing_id)?;
                }
            }
        }

        for mut item in items {
            let child_id = item.get(&pk).filter(|v| !v.is_null()).cloned();
            item.insert(rel.foreign_key.clone(), id.clone());
            match child_id {
                None if rel.syncs(SyncMode::Insert) => {
                    child.create(item)?;
                }
                Some(child_id) if rel.syncs(SyncMode::Update) => match child.find(&child_id) {
                    Ok(current) if same_key(current.get(&rel.foreign_key), id) => {
                        child.update(&child_id, item)?;
                    }
                    Ok(_) | Err(AppError::NotFound(_)) => {
                        tracing::debug!(entity = %model, id = %child_id, "skipping child of another parent");
                    }
                    Err(e) => return Err(e),
                },
                _ => {}
            }
        }
        Ok(())
    }

    fn upsert_through_table(
        &self,
        query: &mut QueryBuilder,
        rel: &HasMany,
        table: &str,
        pk: &str,
        id: &Value,
        items: Vec<Map<String, Value>>,
    ) -> Result<(), AppError> {
        if rel.syncs(SyncMode::Overwrite) {
            let keep = incoming_keys(&items, pk);
            let existing = query
                .use_table(table)
                .select_columns([pk])
                .where_compare(&rel.foreign_key, id.clone(), Operator::Eq, None)
                .limit(None)
                .fetch_all()?;
            let stale: Vec<Value> = existing
                .into_iter()
                .filter_map(|mut r| r.remove(pk))
                .filter(|v| !value_key(v).map(|k| keep.contains(&k)).unwrap_or(true))
                .collect();
            if !stale.is_empty() {
                query.use_table(table).where_in(pk, stale, None).delete()?;
            }
        }

        for item in items {
            let mut fields: Map<String, Value> = item
                .iter()
                .filter(|(k, _)| rel.columns.contains(k) && k.as_str() != pk)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            fields.insert(rel.foreign_key.clone(), id.clone());
            match item.get(pk).filter(|v| !v.is_null()) {
                None if rel.syncs(SyncMode::Insert) => {
                    query.use_table(table).insert(fields)?;
                }
                Some(child_id) if rel.syncs(SyncMode::Update) => {
                    let current = query
                        .use_table(table)
                        .where_compare(pk, child_id.clone(), Operator::Eq, None)
                        .limit(Some(1))
                        .fetch_one()?;
                    if current.is_some_and(|c| same_key(c.get(&rel.foreign_key), id)) {
                        query
                            .use_table(table)
                            .where_compare(pk, child_id.clone(), Operator::Eq, None)
                            .update(fields)?;
                    } else {
                        tracing::debug!(table = %table, id = %child_id, "skipping child of another parent");
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn incoming_keys(items: &[Map<String, Value>], pk: &str) -> HashSet<String> {
    items
        .iter()
        .filter_map(|i| i.get(pk).and_then(value_key))
        .collect()
}
