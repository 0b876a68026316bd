mod complete;
mod init;
mod rollback;
mod start;
mod start_and_complete;
mod status;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use http::StatusCode;
use pgshift::Session;
use tower_http::trace::TraceLayer;

use crate::{response::ApiResponse, state::AppState};

pub fn create() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/hello", get(hello))
        .route("/status", get(status::get))
        .route("/init", post(init::post).fallback(method_not_allowed))
        .route(
            "/start-migration",
            post(start::post).fallback(method_not_allowed),
        )
        .route(
            "/complete-migration",
            post(complete::post).fallback(method_not_allowed),
        )
        .route(
            "/start-and-complete-migration",
            post(start_and_complete::post).fallback(method_not_allowed),
        )
        .route(
            "/rollback-migration",
            post(rollback::post).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
}

async fn index() -> &'static str {
    "Welcome to pgshift.\nTry /hello or /status\n"
}

async fn hello() -> &'static str {
    "Hello, World!\n"
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "404 Not Found\n")
}

async fn method_not_allowed() -> ApiResponse {
    ApiResponse::method_not_allowed()
}

/// Sessions are released on every exit path; a close failure is logged but
/// never overrides the operation's outcome.
pub(crate) async fn release(session: &Session) {
    if let Err(err) = session.close().await {
        tracing::warn!(error = %err, "failed to release migration session");
    }
}
