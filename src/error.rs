//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate entity: {0}")]
    DuplicateEntity(String),
    #[error("invalid relationship '{alias}' on {entity}: {reason}")]
    InvalidRelationship {
        entity: String,
        alias: String,
        reason: String,
    },
    #[error("alias collision on {entity}: '{first}' and '{second}'")]
    AliasCollision {
        entity: String,
        first: String,
        second: String,
    },
    #[error("invalid pattern for rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Errors raised by a backend connection or statement.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection lock poisoned")]
    Poisoned,
    #[error("unknown bind parameter: {0}")]
    UnknownParameter(String),
}

/// Field name to failing rule name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    pub fn insert(&mut self, field: &str, rule: &str) {
        self.0.insert(field.to_string(), rule.to_string());
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid attributes: {0}")]
    Validation(ValidationErrors),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("query failed: {message}")]
    QueryExecution { message: String, sql: String },
    #[error("{0}")]
    Execution(String),
}

impl AppError {
    /// Statement text attached to a failed query, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            AppError::QueryExecution { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::QueryExecution { sql, .. } => {
                tracing::error!(sql = %sql, error = %self, "statement failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
            }
            AppError::Execution(_) => (StatusCode::INTERNAL_SERVER_ERROR, "execution_error"),
        };
        let details = match &self {
            AppError::Validation(errors) => Some(serde_json::json!({ "errors": errors })),
            _ => None,
        };
        let message = match &self {
            AppError::QueryExecution { .. } => "error accessing the database".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
