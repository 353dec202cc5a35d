//! Entity CRUD handlers: list, read, create, update, delete.
//! Entity operations are synchronous and run on the blocking pool.

use crate::error::AppError;
use crate::response::{success_one, success_one_ok, success_page};
use crate::service::Entity;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// State for one entity's nested router.
#[derive(Clone)]
pub struct EntityScope {
    pub app: AppState,
    pub entity: String,
}

async fn blocking<T, F>(scope: EntityScope, f: F) -> Result<T, AppError>
where
    F: FnOnce(&mut Entity) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut entity = scope.app.entity(&scope.entity)?;
        f(&mut entity)
    })
    .await
    .map_err(|e| AppError::Execution(format!("worker failed: {}", e)))?
}

/// Integer ids when the segment parses as one, text otherwise.
fn parse_id(id: &str) -> Value {
    id.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(id.to_string()))
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::InvalidArgument("body must be a JSON object".into())),
    }
}

pub async fn list(
    State(scope): State<EntityScope>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let params: Map<String, Value> = params.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    let (rows, records, paging) = blocking(scope, move |entity| {
        let rows = entity.search(&params)?.get()?;
        let records = entity.search(&params)?.count()?;
        Ok((rows, records, entity.pagination()))
    })
    .await?;
    Ok(success_page(rows, records, paging))
}

pub async fn read(
    State(scope): State<EntityScope>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id);
    let row = blocking(scope, move |entity| entity.find(&id)).await?;
    Ok(success_one_ok(row))
}

pub async fn create(
    State(scope): State<EntityScope>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let attributes = body_to_map(body)?;
    let row = blocking(scope, move |entity| entity.create(attributes)).await?;
    Ok(success_one(row))
}

pub async fn update(
    State(scope): State<EntityScope>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id);
    let attributes = body_to_map(body)?;
    let row = blocking(scope, move |entity| entity.update(&id, attributes)).await?;
    Ok(success_one_ok(row))
}

pub async fn delete(
    State(scope): State<EntityScope>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id);
    let id = blocking(scope, move |entity| entity.destroy(&id)).await?;
    Ok(success_one_ok(serde_json::json!({ "id": id })))
}
