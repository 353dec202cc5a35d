//! Router assembly.

mod common;
mod entity;

pub use common::common_routes;
pub use entity::entity_routes;

use crate::state::AppState;
use axum::Router;

/// Common routes at the root and entity routes under `prefix` (e.g. `/api`, or `""` for the root).
pub fn app_router(state: AppState, prefix: &str) -> Router {
    let entities = entity_routes(state.clone());
    let router = common_routes(state);
    if prefix.is_empty() || prefix == "/" {
        router.merge(entities)
    } else {
        router.nest(prefix, entities)
    }
}
