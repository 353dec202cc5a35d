//! Load entity declarations from JSON and resolve them for runtime use.

use crate::config::resolved::{
    BelongsToMany, EntitySchema, HasMany, HasManyTarget, HasOne, Relationship, ResolvedModel,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Built-in validation rules; declared rules with the same name replace them.
const DEFAULT_RULES: &[(&str, &str)] = &[
    ("alpha", r"^[a-zA-Z\s]+$"),
    ("numeric", r"^[0-9]+$"),
    ("alphanumeric", r"^[-\w\s]+$"),
    ("email", r"^[-\w]+(\.[-\w]+)*@[-\w]+(\.[-\w]+)*\.[a-zA-Z]{2,}$"),
];

/// Build resolved model from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut entities = Vec::with_capacity(config.entities.len());
    let mut entity_by_name = HashMap::new();
    for e in &config.entities {
        let schema = Arc::new(resolve_entity(e)?);
        entity_by_name.insert(e.name.clone(), schema.clone());
        entities.push(schema);
    }
    Ok(ResolvedModel {
        entities,
        entity_by_name,
    })
}

fn resolve_entity(e: &EntityConfig) -> Result<EntitySchema, ConfigError> {
    let mut rules = HashMap::new();
    let declared = e.rules.iter().map(|(k, v)| (k.as_str(), v.as_str()));
    for (name, pattern) in DEFAULT_RULES.iter().copied().chain(declared) {
        let re = Regex::new(pattern).map_err(|err| ConfigError::InvalidRule {
            rule: name.to_string(),
            reason: err.to_string(),
        })?;
        rules.insert(name.to_string(), re);
    }

    let relationships = e.relationships.iter().map(resolve_relationship).collect();

    Ok(EntitySchema {
        name: e.name.clone(),
        table: e.table.clone(),
        primary_key: e.primary_key.clone(),
        columns: e.columns.clone(),
        fillable: e.fillable.clone(),
        validate: e.validate.clone(),
        rules,
        filters: e.filters.clone(),
        relationships,
        limit: e.limit,
        order_by: e.order_by.clone(),
    })
}

fn resolve_relationship(rel: &RelationshipConfig) -> Relationship {
    match rel {
        RelationshipConfig::HasOne {
            table,
            local_key,
            foreign_key,
            alias,
            columns,
        } => Relationship::HasOne(HasOne {
            table: table.clone(),
            local_key: local_key.clone(),
            foreign_key: foreign_key.clone(),
            alias: alias.clone(),
            columns: columns.clone(),
        }),
        RelationshipConfig::HasMany {
            table,
            model,
            local_key,
            foreign_key,
            alias,
            columns,
            primary_key,
            limit,
            order_by,
            sync,
        } => {
            // validate() guarantees exactly one of table / model.
            let target = match (model, table) {
                (Some(m), _) => HasManyTarget::Model(m.clone()),
                (None, t) => HasManyTarget::Table {
                    name: t.clone().unwrap_or_default(),
                    primary_key: primary_key.clone(),
                },
            };
            Relationship::HasMany(HasMany {
                target,
                local_key: local_key.clone(),
                foreign_key: foreign_key.clone(),
                alias: alias.clone(),
                columns: columns.clone(),
                limit: *limit,
                order_by: order_by.clone(),
                sync: sync.clone(),
            })
        }
        RelationshipConfig::BelongsToMany {
            pivot,
            local_key,
            foreign_key,
            alias,
            sync,
        } => Relationship::BelongsToMany(BelongsToMany {
            pivot: pivot.clone(),
            local_key: local_key.clone(),
            foreign_key: foreign_key.clone(),
            alias: alias.clone(),
            sync: *sync,
        }),
    }
}

/// Load declarations from a JSON file holding either `{"entities": [...]}` or a bare array.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| ConfigError::Load(e.to_string()))?;
    let config = match value {
        serde_json::Value::Array(_) => FullConfig {
            entities: serde_json::from_value(value).map_err(|e| ConfigError::Load(e.to_string()))?,
        },
        other => serde_json::from_value(other).map_err(|e| ConfigError::Load(e.to_string()))?,
    };
    tracing::debug!(path = %path.display(), entities = config.entities.len(), "loaded entity config");
    Ok(config)
}
