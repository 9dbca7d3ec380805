// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, session, test_series},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Public: reading a test series (answer keys stripped).
/// * Authenticated: creating series, running sessions, reading results.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let public_routes = Router::new().route("/test-series/{id}", get(test_series::get_test_series));

    let protected_routes = Router::new()
        .route("/test-series", post(test_series::create_test_series))
        .route("/test-series/{id}/sessions", post(session::start_session))
        .route(
            "/sessions/{id}",
            get(session::get_session).delete(session::exit_session),
        )
        .route("/sessions/{id}/answer", post(session::select_answer))
        .route("/sessions/{id}/navigate", post(session::navigate))
        .route("/sessions/{id}/review", post(session::toggle_review))
        .route("/sessions/{id}/lifeline", post(session::use_lifeline))
        .route("/sessions/{id}/pause", post(session::toggle_pause))
        .route("/sessions/{id}/submit", post(session::submit_session))
        .route("/sessions/{id}/result", get(session::get_session_result))
        .route("/attempts", get(attempt::list_attempts))
        .route("/attempts/{id}/result", get(attempt::get_attempt_result))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
