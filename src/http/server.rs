//! Main router configuration for the consumer endpoints.

use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    context::AppState,
    handler_consumers::{
        get_consumer_handler, list_consumers_handler, register_consumer_handler,
    },
};

/// Build the application router
pub fn build_router(ctx: AppState) -> Router {
    Router::new()
        .route(
            "/consumers",
            get(list_consumers_handler).post(register_consumer_handler),
        )
        .route("/consumers/{component_id}", get(get_consumer_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
