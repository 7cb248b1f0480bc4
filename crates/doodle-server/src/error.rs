//! JSON error responses for the REST routes.
//!
//! The status and rounds views are built from in-memory state, so the
//! only way they fail is encoding the body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A REST handler could not encode its response body.
#[derive(Debug, thiserror::Error)]
#[error("failed to encode response: {0}")]
pub struct ApiError(#[from] serde_json::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encode_failure_is_a_json_500() {
        let source = serde_json::from_str::<u8>("not a number").unwrap_err();
        let response = ApiError::from(source).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], 500);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("failed to encode response")
        );
    }
}
