//! Resolved entity model: declarations validated and flattened for runtime use.

use crate::config::{FilterConfig, SyncMode};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Where a has-many relationship reads and writes its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HasManyTarget {
    /// Plain table access; `primary_key` identifies children for update and overwrite.
    Table { name: String, primary_key: String },
    /// Another declared entity, resolved through the entity factory.
    Model(String),
}

/// One-to-one via join. Related columns come back as `_<alias>_<column>`.
#[derive(Clone, Debug)]
pub struct HasOne {
    pub table: String,
    pub local_key: String,
    pub foreign_key: String,
    pub alias: String,
    pub columns: Vec<String>,
}

impl HasOne {
    pub fn prefix(&self) -> String {
        format!("_{}_", self.alias)
    }
}

/// One-to-many, resolved by a second batched query keyed by parent ids.
#[derive(Clone, Debug)]
pub struct HasMany {
    pub target: HasManyTarget,
    pub local_key: String,
    pub foreign_key: String,
    pub alias: String,
    pub columns: Vec<String>,
    /// Children kept per parent.
    pub limit: Option<u64>,
    pub order_by: Option<String>,
    pub sync: Vec<SyncMode>,
}

impl HasMany {
    pub fn syncs(&self, mode: SyncMode) -> bool {
        self.sync.contains(&mode)
    }
}

/// Many-to-many via pivot join; related ids are aggregated into `concat_<alias>`.
#[derive(Clone, Debug)]
pub struct BelongsToMany {
    pub pivot: String,
    pub local_key: String,
    pub foreign_key: String,
    pub alias: String,
    pub sync: bool,
}

impl BelongsToMany {
    pub fn concat_column(&self) -> String {
        format!("concat_{}", self.alias)
    }
}

#[derive(Clone, Debug)]
pub enum Relationship {
    HasOne(HasOne),
    HasMany(HasMany),
    BelongsToMany(BelongsToMany),
}

#[derive(Clone, Debug)]
pub struct EntitySchema {
    pub name: String,
    pub table: String,
    pub primary_key: String,
    pub columns: Vec<String>,
    pub fillable: Vec<String>,
    pub validate: BTreeMap<String, Vec<String>>,
    /// Built-in and declared rule patterns, compiled.
    pub rules: HashMap<String, Regex>,
    pub filters: BTreeMap<String, FilterConfig>,
    pub relationships: Vec<Relationship>,
    pub limit: Option<u64>,
    pub order_by: Option<String>,
}

impl EntitySchema {
    pub fn has_one(&self) -> impl Iterator<Item = &HasOne> {
        self.relationships.iter().filter_map(|r| match r {
            Relationship::HasOne(h) => Some(h),
            _ => None,
        })
    }

    pub fn has_many(&self) -> impl Iterator<Item = &HasMany> {
        self.relationships.iter().filter_map(|r| match r {
            Relationship::HasMany(h) => Some(h),
            _ => None,
        })
    }

    pub fn belongs_to_many(&self) -> impl Iterator<Item = &BelongsToMany> {
        self.relationships.iter().filter_map(|r| match r {
            Relationship::BelongsToMany(b) => Some(b),
            _ => None,
        })
    }

    /// Qualified primary key column, e.g. `posts.id`.
    pub fn qualified_key(&self) -> String {
        format!("{}.{}", self.table, self.primary_key)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<Arc<EntitySchema>>,
    pub entity_by_name: HashMap<String, Arc<EntitySchema>>,
}

impl ResolvedModel {
    pub fn entity(&self, name: &str) -> Option<&Arc<EntitySchema>> {
        self.entity_by_name.get(name)
    }
}
