//! HTTP error mapping.
//!
//! Every failure is rendered as `{"error": {"kind": ..., "message": ...}}`
//! with a status derived from the error variant.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::agent_core::OrchestratorError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// The server was started without model API credentials.
    #[error("model API is not configured")]
    ModelUnavailable,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(e) => match e {
                SessionError::UnknownServer { .. } | SessionError::ToolNotFound { .. } => {
                    StatusCode::NOT_FOUND
                }
                SessionError::NotConnected { .. } => StatusCode::BAD_REQUEST,
                SessionError::MissingArguments { .. } | SessionError::InvalidArguments { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                SessionError::Connection { .. }
                | SessionError::ToolExecution { .. }
                | SessionError::Protocol { .. } => StatusCode::BAD_GATEWAY,
            },
            ApiError::Orchestrator(OrchestratorError::ModelApi { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Session(e) => e.kind(),
            ApiError::Orchestrator(OrchestratorError::ModelApi { .. }) => "model_api_error",
            ApiError::ModelUnavailable => "model_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Session(SessionError::UnknownServer { server: "x".into() }),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Session(SessionError::NotConnected { server: "x".into() }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Session(SessionError::ToolNotFound {
                    server: "x".into(),
                    tool: "t".into(),
                    available: vec![],
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Session(SessionError::MissingArguments {
                    server: "x".into(),
                    tool: "t".into(),
                    missing: vec!["a".into()],
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Session(SessionError::Connection {
                    server: "x".into(),
                    reason: "r".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Session(SessionError::ToolExecution {
                    server: "x".into(),
                    tool: "t".into(),
                    reason: "r".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Orchestrator(OrchestratorError::ModelApi {
                    message: "m".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (ApiError::ModelUnavailable, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }
}
