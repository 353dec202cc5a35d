//! apiframe: configuration-driven data access and REST glue over a synchronous SQL backend.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_file, resolve, EntityConfig, FullConfig, ResolvedModel, Settings};
pub use error::{AppError, ConfigError, StoreError, ValidationErrors};
pub use routes::{app_router, common_routes, entity_routes};
pub use service::{Entity, EntityHooks, QueryBuilder, RelationshipResolver};
pub use state::AppState;
pub use store::{Connection, Row, SqliteConnection, Statement};
