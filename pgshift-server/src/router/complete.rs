use axum::extract::State;

use super::release;
use crate::{response::ApiResponse, state::AppState};

pub async fn post(State(state): State<AppState>) -> ApiResponse {
    let session = match state.factory.open().await {
        Ok(session) => session,
        Err(err) => return ApiResponse::server_error("Failed to open migration session", err),
    };

    let result = session.complete().await;
    release(&session).await;

    match result {
        Ok(_) => ApiResponse::ok("Migration completed successfully"),
        Err(err) => ApiResponse::server_error("Failed to complete migration", err),
    }
}
