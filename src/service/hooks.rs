//! Per-entity lifecycle hooks. Every method defaults to a pass-through.

use crate::config::EntitySchema;
use crate::error::AppError;
use crate::service::QueryBuilder;
use crate::store::Row;
use serde_json::{Map, Value};

/// Hooks run around reads and writes of one entity. An `Err` aborts the operation.
pub trait EntityHooks: Send + Sync {
    /// May add conditions to the pending read.
    fn before_get(&self, _schema: &EntitySchema, _query: &mut QueryBuilder) -> Result<(), AppError> {
        Ok(())
    }

    fn after_get(&self, _schema: &EntitySchema, _rows: &mut Vec<Row>) -> Result<(), AppError> {
        Ok(())
    }

    /// Returns the attributes to insert.
    fn before_create(
        &self,
        _schema: &EntitySchema,
        attributes: Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError> {
        Ok(attributes)
    }

    fn after_create(
        &self,
        _schema: &EntitySchema,
        _id: &Value,
        _attributes: &Map<String, Value>,
        model: Row,
    ) -> Result<Row, AppError> {
        Ok(model)
    }

    fn before_update(
        &self,
        _schema: &EntitySchema,
        _id: &Value,
        attributes: Map<String, Value>,
    ) -> Result<Map<String, Value>, AppError> {
        Ok(attributes)
    }

    fn after_update(
        &self,
        _schema: &EntitySchema,
        _id: &Value,
        _attributes: &Map<String, Value>,
        model: Row,
    ) -> Result<Row, AppError> {
        Ok(model)
    }

    fn before_destroy(&self, _schema: &EntitySchema, _id: &Value) -> Result<(), AppError> {
        Ok(())
    }

    fn after_destroy(&self, _schema: &EntitySchema, _id: &Value) -> Result<(), AppError> {
        Ok(())
    }
}

pub struct NoHooks;

impl EntityHooks for NoHooks {}
