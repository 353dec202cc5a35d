//! Application settings: an opaque string-keyed map with defaults, overridable from the environment.

use std::collections::HashMap;
use std::str::FromStr;

const DEFAULTS: &[(&str, &str)] = &[
    ("debug.queries", ""),
    ("database.file", ":memory:"),
    ("database.init", ""),
    ("entities.file", "entities.json"),
    ("pagination.limit", "100"),
    ("server.addr", "127.0.0.1:3000"),
    ("request.body_limit", "1048576"),
];

/// Prefix for environment overrides, e.g. `APIFRAME_DEBUG_QUERIES`.
pub const ENV_PREFIX: &str = "APIFRAME_";

#[derive(Clone, Debug)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            values: DEFAULTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Settings {
    /// Defaults, then `.env`, then process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut settings = Settings::default();
        let keys: Vec<String> = settings.values.keys().cloned().collect();
        for key in keys {
            if let Ok(v) = std::env::var(env_key(&key)) {
                settings.values.insert(key, v);
            }
        }
        settings
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value parsed as `T`; `None` when missing or unparsable.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Path of the query log, when `debug.queries` is set.
    pub fn query_log(&self) -> Option<&str> {
        self.get("debug.queries").filter(|p| !p.trim().is_empty())
    }
}

fn env_key(key: &str) -> String {
    format!("{}{}", ENV_PREFIX, key.replace('.', "_").to_uppercase())
}
