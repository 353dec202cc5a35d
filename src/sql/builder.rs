//! Renders a QueryState into parameterized SELECT, COUNT, INSERT, UPDATE and DELETE text.
//! Identifiers come from declarations; every value is a named parameter.

use crate::sql::params::{condition_key, field_key};
use crate::sql::state::QueryState;
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    /// Named parameters, keys without the leading `:`.
    pub params: Vec<(String, Value)>,
    used: HashSet<String>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    /// Register a value under `base` (suffixed `_<n>` when taken) and return its placeholder.
    fn push_param(&mut self, base: &str, v: Value) -> String {
        let mut key = base.to_string();
        let mut n = 1;
        while self.used.contains(&key) {
            key = format!("{}_{}", base, n);
            n += 1;
        }
        self.used.insert(key.clone());
        self.params.push((key.clone(), v));
        format!(":{}", key)
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// `table.column`, unless the column is already qualified or an expression.
fn qualify(table: &str, column: &str) -> String {
    if column.contains('.') || table.is_empty() {
        column.to_string()
    } else {
        format!("{}.{}", table, column)
    }
}

fn select_column_list(state: &QueryState) -> String {
    if state.columns.is_empty() {
        return format!("{}.*", state.table);
    }
    state
        .columns
        .iter()
        .map(|c| qualify(&state.table, c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_clause(state: &QueryState) -> String {
    state
        .joins
        .iter()
        .map(|j| {
            format!(
                " {} JOIN {} ON {} {} {}",
                j.kind.as_sql(),
                j.table,
                qualify(&state.table, &j.left_key),
                j.operator.as_sql(),
                qualify(&j.table, &j.right_key)
            )
        })
        .collect()
}

/// WHERE over comparisons, memberships, ranges and patterns, joined with AND.
fn where_clause(state: &QueryState, q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    for c in &state.wheres {
        let table = c.table.as_deref().unwrap_or(&state.table);
        let ph = q.push_param(&condition_key(table, &c.column), c.value.clone());
        parts.push(format!("{} {} {}", qualify(table, &c.column), c.operator.as_sql(), ph));
    }
    for m in &state.where_in {
        let table = m.table.as_deref().unwrap_or(&state.table);
        if m.values.is_empty() {
            parts.push("1 = 0".to_string());
            continue;
        }
        let base = condition_key(table, &m.column);
        let placeholders: Vec<String> = m
            .values
            .iter()
            .map(|v| q.push_param(&base, v.clone()))
            .collect();
        parts.push(format!("{} IN ({})", qualify(table, &m.column), placeholders.join(", ")));
    }
    for r in &state.betweens {
        let table = r.table.as_deref().unwrap_or(&state.table);
        let base = condition_key(table, &r.column);
        let low = q.push_param(&base, r.low.clone());
        let high = q.push_param(&base, r.high.clone());
        parts.push(format!("{} BETWEEN {} AND {}", qualify(table, &r.column), low, high));
    }
    for p in &state.regexps {
        let table = p.table.as_deref().unwrap_or(&state.table);
        let ph = q.push_param(&condition_key(table, &p.column), Value::String(p.regex.clone()));
        parts.push(format!("{} REGEXP {}", qualify(table, &p.column), ph));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn paging_clause(state: &QueryState) -> String {
    match (state.limit, state.offset) {
        (Some(limit), offset) => format!(" LIMIT {} OFFSET {}", limit, offset),
        (None, 0) => String::new(),
        // SQLite needs a LIMIT before OFFSET; -1 is unbounded.
        (None, offset) => format!(" LIMIT -1 OFFSET {}", offset),
    }
}

/// SELECT, clauses in fixed order: columns/FROM, JOINs, WHERE, GROUP BY, ORDER BY, LIMIT/OFFSET.
pub fn select(state: &QueryState) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(state, &mut q);
    let group_sql = state
        .group_by
        .as_ref()
        .map(|g| format!(" GROUP BY {}", g))
        .unwrap_or_default();
    let order_sql = if state.order_by.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", state.order_by.join(", "))
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}{}",
        select_column_list(state),
        state.table,
        join_clause(state),
        where_sql,
        group_sql,
        order_sql,
        paging_clause(state)
    );
    q
}

/// COUNT over the same joins and conditions, ignoring paging and order. A grouped state counts groups.
pub fn count(state: &QueryState, column: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(state, &mut q);
    let target = qualify(&state.table, column);
    q.sql = match &state.group_by {
        None => format!(
            "SELECT COUNT({}) AS count FROM {}{}{}",
            target,
            state.table,
            join_clause(state),
            where_sql
        ),
        Some(g) => format!(
            "SELECT COUNT(*) AS count FROM (SELECT {} FROM {}{}{} GROUP BY {}) AS grouped",
            target,
            state.table,
            join_clause(state),
            where_sql,
            g
        ),
    };
    q
}

pub fn insert(table: &str, fields: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    if fields.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES", table);
        return q;
    }
    let mut cols = Vec::with_capacity(fields.len());
    let mut placeholders = Vec::with_capacity(fields.len());
    for (k, v) in fields {
        placeholders.push(q.push_param(&field_key(k), v.clone()));
        cols.push(k.as_str());
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols.join(", "),
        placeholders.join(", ")
    );
    q
}

/// UPDATE with the state's fields as SET and its conditions as WHERE, bound under separate keys.
pub fn update(state: &QueryState) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets: Vec<String> = state
        .fields
        .iter()
        .map(|(k, v)| format!("{} = {}", k, q.push_param(&field_key(k), v.clone())))
        .collect();
    let where_sql = where_clause(state, &mut q);
    q.sql = format!("UPDATE {} SET {}{}", state.table, sets.join(", "), where_sql);
    q
}

pub fn delete(state: &QueryState) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(state, &mut q);
    q.sql = format!("DELETE FROM {}{}", state.table, where_sql);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::state::{Comparison, Join, JoinKind, Membership, Operator, Pattern, Range};
    use serde_json::json;

    fn posts() -> QueryState {
        QueryState {
            table: "posts".into(),
            ..QueryState::default()
        }
    }

    fn eq(table: Option<&str>, column: &str, value: Value) -> Comparison {
        Comparison {
            table: table.map(String::from),
            column: column.into(),
            operator: Operator::Eq,
            value,
        }
    }

    #[test]
    fn select_defaults_to_all_columns_with_paging() {
        let q = select(&posts());
        assert_eq!(q.sql, "SELECT posts.* FROM posts LIMIT 10 OFFSET 0");
        assert!(q.params.is_empty());
    }

    #[test]
    fn select_orders_clauses() {
        let mut s = posts();
        s.columns = vec!["id".into(), "title".into(), "users.name AS _author_name".into()];
        s.joins.push(Join {
            table: "users".into(),
            left_key: "user_id".into(),
            operator: Operator::Eq,
            right_key: "id".into(),
            kind: JoinKind::Left,
        });
        s.wheres.push(eq(None, "status", json!("published")));
        s.where_in.push(Membership {
            table: None,
            column: "id".into(),
            values: vec![json!(1), json!(2)],
        });
        s.betweens.push(Range {
            table: None,
            column: "created_at".into(),
            low: json!("2024-01-01"),
            high: json!("2024-12-31"),
        });
        s.regexps.push(Pattern {
            table: None,
            column: "title".into(),
            regex: "^R".into(),
        });
        s.group_by = Some("posts.id".into());
        s.order_by = vec!["posts.id DESC".into()];
        s.limit = Some(5);
        s.offset = 10;

        let q = select(&s);
        assert_eq!(
            q.sql,
            "SELECT posts.id, posts.title, users.name AS _author_name FROM posts \
             LEFT JOIN users ON posts.user_id = users.id \
             WHERE posts.status = :posts_status AND posts.id IN (:posts_id, :posts_id_1) \
             AND posts.created_at BETWEEN :posts_created_at AND :posts_created_at_1 \
             AND posts.title REGEXP :posts_title \
             GROUP BY posts.id ORDER BY posts.id DESC LIMIT 5 OFFSET 10"
        );
        assert_eq!(q.params.len(), 6);
        assert_eq!(q.param("posts_id_1"), Some(&json!(2)));
        assert_eq!(q.param("posts_title"), Some(&json!("^R")));
    }

    #[test]
    fn same_column_in_joined_tables_gets_distinct_keys() {
        let mut s = posts();
        s.wheres.push(eq(None, "id", json!(1)));
        s.wheres.push(eq(Some("users"), "id", json!(2)));
        let q = select(&s);
        assert!(q.sql.contains("posts.id = :posts_id"));
        assert!(q.sql.contains("users.id = :users_id"));
        assert_eq!(q.param("posts_id"), Some(&json!(1)));
        assert_eq!(q.param("users_id"), Some(&json!(2)));
    }

    #[test]
    fn repeated_condition_keys_are_suffixed() {
        let mut s = posts();
        s.wheres.push(Comparison {
            operator: Operator::Gt,
            ..eq(None, "views", json!(10))
        });
        s.wheres.push(Comparison {
            operator: Operator::Lt,
            ..eq(None, "views", json!(20))
        });
        let q = select(&s);
        assert!(q.sql.contains("posts.views > :posts_views AND posts.views < :posts_views_1"));
    }

    #[test]
    fn empty_membership_matches_nothing() {
        let mut s = posts();
        s.where_in.push(Membership {
            table: None,
            column: "id".into(),
            values: vec![],
        });
        assert!(select(&s).sql.contains("WHERE 1 = 0"));
    }

    #[test]
    fn unbounded_select_with_offset() {
        let mut s = posts();
        s.limit = None;
        s.offset = 3;
        assert!(select(&s).sql.ends_with("LIMIT -1 OFFSET 3"));
        s.offset = 0;
        assert_eq!(select(&s).sql, "SELECT posts.* FROM posts");
    }

    #[test]
    fn count_ignores_paging_and_wraps_groups() {
        let mut s = posts();
        s.wheres.push(eq(None, "status", json!("draft")));
        s.order_by = vec!["id".into()];
        assert_eq!(
            count(&s, "id").sql,
            "SELECT COUNT(posts.id) AS count FROM posts WHERE posts.status = :posts_status"
        );
        s.group_by = Some("posts.id".into());
        assert_eq!(
            count(&s, "id").sql,
            "SELECT COUNT(*) AS count FROM (SELECT posts.id FROM posts \
             WHERE posts.status = :posts_status GROUP BY posts.id) AS grouped"
        );
    }

    #[test]
    fn insert_binds_fields() {
        let mut fields = Map::new();
        fields.insert("title".into(), json!("Hello"));
        fields.insert("user_id".into(), json!(3));
        let q = insert("posts", &fields);
        assert_eq!(
            q.sql,
            "INSERT INTO posts (title, user_id) VALUES (:field_title, :field_user_id)"
        );
        assert_eq!(q.param("field_user_id"), Some(&json!(3)));
        assert_eq!(insert("posts", &Map::new()).sql, "INSERT INTO posts DEFAULT VALUES");
    }

    #[test]
    fn update_binds_fields_and_conditions_independently() {
        let mut s = posts();
        s.fields.insert("id".into(), json!(99));
        s.wheres.push(eq(None, "id", json!(7)));
        let q = update(&s);
        assert_eq!(q.sql, "UPDATE posts SET id = :field_id WHERE posts.id = :posts_id");
        assert_eq!(q.param("field_id"), Some(&json!(99)));
        assert_eq!(q.param("posts_id"), Some(&json!(7)));
    }

    #[test]
    fn delete_uses_every_condition_kind() {
        let mut s = posts();
        s.wheres.push(eq(None, "id", json!(1)));
        s.where_in.push(Membership {
            table: None,
            column: "status".into(),
            values: vec![json!("a")],
        });
        s.limit = Some(1);
        assert_eq!(
            delete(&s).sql,
            "DELETE FROM posts WHERE posts.id = :posts_id AND posts.status IN (:posts_status)"
        );
    }
}
