use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::Serialize;
use tracing::error;

/// The façade's single response shape: `{success, message, [error]}`.
/// Engine-side causes are stringified, not classified further.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    status: StatusCode,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            status: StatusCode::OK,
        }
    }

    pub fn bad_request(message: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::failure(message, Some(err.to_string()), StatusCode::BAD_REQUEST)
    }

    pub fn server_error(message: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::failure(
            message,
            Some(err.to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }

    pub fn method_not_allowed() -> Self {
        Self::failure("Method not allowed", None, StatusCode::METHOD_NOT_ALLOWED)
    }

    fn failure(message: impl Into<String>, error: Option<String>, status: StatusCode) -> Self {
        Self {
            success: false,
            message: message.into(),
            error,
            status,
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        if !self.success {
            error!(
                status = %self.status,
                message = %self.message,
                error = self.error.as_deref().unwrap_or_default(),
                "request failed"
            );
        }

        (self.status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_error_field_on_success() {
        let body = serde_json::to_value(ApiResponse::ok("done")).unwrap();

        assert_eq!(body, serde_json::json!({"success": true, "message": "done"}));
    }

    #[test]
    fn carries_error_string_on_failure() {
        let body =
            serde_json::to_value(ApiResponse::server_error("failed", "boom")).unwrap();

        assert_eq!(
            body,
            serde_json::json!({"success": false, "message": "failed", "error": "boom"})
        );
    }
}
