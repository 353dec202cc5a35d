//! Raw entity declarations as they appear in JSON config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_primary_key() -> String {
    "id".to_string()
}

/// Comparison used by a search filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    /// Pattern match: the value is wrapped in wildcards before binding.
    #[serde(rename = "contains", alias = "LIKE", alias = "like")]
    Contains,
}

/// Maps an incoming search key onto a column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Column name, or the alias of a belongs-to-many relationship.
    pub column: String,
    #[serde(default)]
    pub operator: FilterOperator,
    /// Table the column lives in; defaults to the entity's table.
    #[serde(default)]
    pub table: Option<String>,
}

/// How a has-many child collection is reconciled on write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Insert,
    Update,
    Overwrite,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationshipConfig {
    HasOne {
        table: String,
        local_key: String,
        foreign_key: String,
        alias: String,
        #[serde(default)]
        columns: Vec<String>,
    },
    HasMany {
        /// Related table, written directly.
        #[serde(default)]
        table: Option<String>,
        /// Related entity name, resolved through the entity factory.
        #[serde(default)]
        model: Option<String>,
        local_key: String,
        foreign_key: String,
        alias: String,
        #[serde(default)]
        columns: Vec<String>,
        /// Primary key of the related table (table form only).
        #[serde(default = "default_primary_key")]
        primary_key: String,
        #[serde(default)]
        limit: Option<u64>,
        #[serde(default)]
        order_by: Option<String>,
        #[serde(default)]
        sync: Vec<SyncMode>,
    },
    BelongsToMany {
        pivot: String,
        local_key: String,
        foreign_key: String,
        alias: String,
        #[serde(default)]
        sync: bool,
    },
}

impl RelationshipConfig {
    pub fn alias(&self) -> &str {
        match self {
            RelationshipConfig::HasOne { alias, .. }
            | RelationshipConfig::HasMany { alias, .. }
            | RelationshipConfig::BelongsToMany { alias, .. } => alias,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Name the entity is registered (and routed) under.
    pub name: String,
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Columns to select; empty selects every column of the table.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Write allow-list for create and update.
    #[serde(default)]
    pub fillable: Vec<String>,
    /// Field to rule names. `required` is reserved.
    #[serde(default)]
    pub validate: BTreeMap<String, Vec<String>>,
    /// Extra rule patterns, merged over the built-in rules.
    #[serde(default)]
    pub rules: BTreeMap<String, String>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterConfig>,
    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub order_by: Option<String>,
}

/// All entity declarations in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    pub entities: Vec<EntityConfig>,
}
