//! Attribute validation from an entity's declared rules.

use crate::config::EntitySchema;
use crate::error::ValidationErrors;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

pub struct RequestValidator<'a> {
    validate: &'a BTreeMap<String, Vec<String>>,
    rules: &'a HashMap<String, Regex>,
}

impl<'a> RequestValidator<'a> {
    pub fn for_schema(schema: &'a EntitySchema) -> Self {
        RequestValidator {
            validate: &schema.validate,
            rules: &schema.rules,
        }
    }

    /// Field name to the first failing rule, or `None` when every field passes.
    /// A missing or blank `required` field reports `required` and skips its other rules.
    pub fn errors(&self, attributes: &Map<String, Value>) -> Option<ValidationErrors> {
        let mut errors = ValidationErrors::default();
        for (field, rules) in self.validate {
            let value = attributes.get(field);
            if rules.iter().any(|r| r == "required") && is_blank(value) {
                errors.insert(field, "required");
                continue;
            }
            let Some(v) = value.filter(|v| !v.is_null()) else {
                continue;
            };
            if let Some(failed) = rules
                .iter()
                .filter(|r| r.as_str() != "required")
                .find(|r| !self.passes(r, v))
            {
                errors.insert(field, failed);
            }
        }
        if errors.is_empty() {
            None
        } else {
            Some(errors)
        }
    }

    fn passes(&self, rule: &str, v: &Value) -> bool {
        let text = match v {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return false,
        };
        match self.rules.get(rule) {
            Some(re) => re.is_match(&text),
            None if rule == "uuid" => uuid::Uuid::parse_str(&text).is_ok(),
            None => false,
        }
    }
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}
