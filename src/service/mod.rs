//! Data-access services: statement execution, query building, relationships and entity CRUD.

mod entity;
mod executor;
mod hooks;
mod query;
mod relations;
mod validation;

pub use entity::{Entity, Pagination};
pub use executor::Executor;
pub use hooks::{EntityHooks, NoHooks};
pub use query::QueryBuilder;
pub use relations::RelationshipResolver;
pub use validation::RequestValidator;
