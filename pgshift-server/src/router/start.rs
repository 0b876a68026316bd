use axum::{body::Bytes, extract::State};
use pgshift::{Migration, RawMigration};

use super::release;
use crate::{response::ApiResponse, state::AppState};

pub async fn post(State(state): State<AppState>, body: Bytes) -> ApiResponse {
    let raw: RawMigration = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(err) => return ApiResponse::bad_request("Failed to read request body", err),
    };

    let migration = match Migration::parse(raw) {
        Ok(migration) => migration,
        Err(err) => return ApiResponse::bad_request("Failed to parse migration", err),
    };

    let session = match state.factory.open().await {
        Ok(session) => session,
        Err(err) => return ApiResponse::server_error("Failed to open migration session", err),
    };

    let result = session.start(&migration).await;
    release(&session).await;

    match result {
        Ok(()) => ApiResponse::ok("Migration started successfully"),
        Err(err) => ApiResponse::server_error("Failed to start migration", err),
    }
}
