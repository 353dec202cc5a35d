//! Config validation: referential integrity and relationship consistency.

use crate::config::{EntityConfig, FullConfig, RelationshipConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for e in &config.entities {
        if !names.insert(e.name.as_str()) {
            return Err(ConfigError::DuplicateEntity(e.name.clone()));
        }
        if e.table.trim().is_empty() {
            return Err(ConfigError::Validation(format!("entity {} has no table", e.name)));
        }
        if e.primary_key.trim().is_empty() {
            return Err(ConfigError::Validation(format!("entity {} has no primary key", e.name)));
        }
    }

    for e in &config.entities {
        validate_relationships(e, &names)?;
    }
    Ok(())
}

fn validate_relationships(entity: &EntityConfig, names: &HashSet<&str>) -> Result<(), ConfigError> {
    let mut aliases = HashSet::new();
    for rel in &entity.relationships {
        let alias = rel.alias();
        if alias.trim().is_empty() {
            return Err(invalid(entity, alias, "empty alias"));
        }
        if !aliases.insert(alias) {
            return Err(invalid(entity, alias, "duplicate alias"));
        }
        if let RelationshipConfig::HasMany { table, model, .. } = rel {
            match (table, model) {
                (Some(_), Some(_)) => return Err(invalid(entity, alias, "declares both table and model")),
                (None, None) => return Err(invalid(entity, alias, "declares neither table nor model")),
                (None, Some(m)) if !names.contains(m.as_str()) => {
                    return Err(ConfigError::MissingReference {
                        kind: "entity",
                        id: m.clone(),
                    })
                }
                _ => {}
            }
        }
    }

    // Joined columns are recovered by prefix, so no has-one prefix may start another.
    let prefixes: Vec<(&str, String)> = entity
        .relationships
        .iter()
        .filter(|r| matches!(r, RelationshipConfig::HasOne { .. }))
        .map(|r| (r.alias(), format!("_{}_", r.alias())))
        .collect();
    for (i, (a, pa)) in prefixes.iter().enumerate() {
        for (b, pb) in prefixes.iter().skip(i + 1) {
            if pa.starts_with(pb.as_str()) || pb.starts_with(pa.as_str()) {
                return Err(ConfigError::AliasCollision {
                    entity: entity.name.clone(),
                    first: a.to_string(),
                    second: b.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn invalid(entity: &EntityConfig, alias: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidRelationship {
        entity: entity.name.clone(),
        alias: alias.to_string(),
        reason: reason.to_string(),
    }
}
