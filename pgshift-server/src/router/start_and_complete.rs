use axum::{body::Bytes, extract::State};
use pgshift::{Migration, RawMigration};

use super::release;
use crate::{response::ApiResponse, state::AppState};

/// `start` immediately followed by `complete`, as one logical unit from the
/// caller's point of view but two sequential engine calls underneath.
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

    let outcome = match session.start(&migration).await {
        Ok(()) => session
            .complete()
            .await
            .map(|_| ())
            .map_err(|err| ("Failed to complete migration", err)),
        Err(err) => Err(("Failed to start migration", err)),
    };
    release(&session).await;

    match outcome {
        Ok(()) => ApiResponse::ok("Migration started and completed successfully"),
        Err((message, err)) => ApiResponse::server_error(message, err),
    }
}
