use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};

use super::release;
use crate::{response::ApiResponse, state::AppState};

pub async fn get(State(state): State<AppState>) -> Response {
    let session = match state.factory.open().await {
        Ok(session) => session,
        Err(err) => {
            return ApiResponse::server_error("Failed to open migration session", err)
                .into_response()
        }
    };

    let result = session.status().await;
    release(&session).await;

    match result {
        Ok(status) => Json(status).into_response(),
        Err(err) => {
            ApiResponse::server_error("Failed to read migration status", err).into_response()
        }
    }
}
