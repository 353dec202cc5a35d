//! Shared application state: connection, resolved model, settings and hooks.

use crate::config::{ResolvedModel, Settings};
use crate::error::AppError;
use crate::service::{Entity, EntityHooks, Executor, NoHooks};
use crate::store::Connection;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub conn: Arc<dyn Connection>,
    pub model: Arc<ResolvedModel>,
    pub settings: Arc<Settings>,
    hooks: Arc<HashMap<String, Arc<dyn EntityHooks>>>,
}

impl AppState {
    pub fn new(conn: Arc<dyn Connection>, model: ResolvedModel, settings: Settings) -> Self {
        AppState {
            conn,
            model: Arc::new(model),
            settings: Arc::new(settings),
            hooks: Arc::new(HashMap::new()),
        }
    }

    /// Register hooks for the entity named `entity`, replacing any earlier ones.
    pub fn with_hooks(mut self, entity: &str, hooks: impl EntityHooks + 'static) -> Self {
        Arc::make_mut(&mut self.hooks).insert(entity.to_string(), Arc::new(hooks));
        self
    }

    pub fn hooks_for(&self, entity: &str) -> Arc<dyn EntityHooks> {
        self.hooks
            .get(entity)
            .cloned()
            .unwrap_or_else(|| Arc::new(NoHooks))
    }

    pub fn executor(&self) -> Executor {
        Executor::new(self.conn.clone(), &self.settings)
    }

    /// A fresh entity instance for the declared `name`.
    pub fn entity(&self, name: &str) -> Result<Entity, AppError> {
        let schema = self
            .model
            .entity(name)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("entity {}", name)))?;
        Ok(Entity::new(schema, self.clone()))
    }
}
