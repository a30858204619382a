use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the main application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_timeout = Duration::from_secs(state.config.server.request_timeout_seconds);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        // Invocation endpoint for the external cron trigger
        .route(
            "/api/publish-scheduled",
            post(handlers::publish::publish_scheduled).get(handlers::publish::publish_scheduled),
        )
        .route(
            "/api/publish-scheduled/status",
            get(handlers::publish::publish_status),
        )
        .route(
            "/api/articles",
            post(handlers::articles::create_article).get(handlers::articles::list_articles),
        )
        .route("/api/articles/:id", get(handlers::articles::get_article))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(cors),
        )
        .with_state(state)
}
