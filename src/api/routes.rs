//! API route definitions

use super::handlers::{self, OrchestratorState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: OrchestratorState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Scopes
        // ====================================================================
        .route("/api/scopes", get(handlers::list_scopes))
        .route(
            "/api/scopes/{scope}/connection",
            get(handlers::get_connection).put(handlers::put_connection),
        )
        .route("/api/scopes/{scope}/sync", post(handlers::sync_scope))
        // ====================================================================
        // Suites
        // ====================================================================
        .route("/api/scopes/{scope}/suites", get(handlers::list_suites))
        .route(
            "/api/scopes/{scope}/suites/{suite_key}",
            get(handlers::get_suite),
        )
        .route(
            "/api/scopes/{scope}/suites/{suite_key}/test-cases/{test_case_id}/issue",
            post(handlers::link_issue),
        )
        .route(
            "/api/scopes/{scope}/suites/{suite_key}/test-cases/{test_case_id}/enhance",
            post(handlers::enhance_test_case),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
