//! Entity CRUD routes built from the resolved model: one nested router per declared entity.

use crate::handlers::entity::{create, delete as delete_handler, list, read, update, EntityScope};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// `GET|POST /<entity>` and `GET|PUT|PATCH|DELETE /<entity>/:id` for every declared entity.
pub fn entity_routes(state: AppState) -> Router {
    let body_limit = state
        .settings
        .get_parsed::<usize>("request.body_limit")
        .unwrap_or(DEFAULT_BODY_LIMIT);
    let mut router = Router::new();
    for schema in &state.model.entities {
        let scope = EntityScope {
            app: state.clone(),
            entity: schema.name.clone(),
        };
        let scoped = Router::new()
            .route("/", get(list).post(create))
            .route(
                "/:id",
                get(read).put(update).patch(update).delete(delete_handler),
            )
            .with_state(scope);
        router = router.nest(&format!("/{}", schema.name), scoped);
    }
    router.layer(RequestBodyLimitLayer::new(body_limit))
}
