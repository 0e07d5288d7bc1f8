use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use flowdeck_comfyui::api::EngineApiError;
use flowdeck_workflows::content::ContentError;
use flowdeck_workflows::WorkflowError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors and implements [`IntoResponse`] to produce
/// consistent JSON error bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A run-level failure from the orchestrator.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// A content API passthrough failure.
    #[error(transparent)]
    Content(#[from] ContentError),

    /// A direct engine passthrough failure (upload, view).
    #[error(transparent)]
    Engine(#[from] EngineApiError),

    /// A malformed request.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Workflow(workflow) => match workflow {
                WorkflowError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                WorkflowError::UnsupportedType(_) => {
                    (StatusCode::BAD_REQUEST, "UNSUPPORTED_TYPE")
                }
                WorkflowError::ContentApi(_) => (StatusCode::BAD_GATEWAY, "CONTENT_API_ERROR"),
                WorkflowError::Engine(EngineApiError::Unreachable(_)) => {
                    (StatusCode::BAD_GATEWAY, "ENGINE_UNREACHABLE")
                }
                WorkflowError::Engine(EngineApiError::Rejected { .. }) => {
                    (StatusCode::BAD_GATEWAY, "ENGINE_REJECTED")
                }
                WorkflowError::Stream(_) => (StatusCode::BAD_GATEWAY, "ENGINE_STREAM_ERROR"),
                WorkflowError::Execution(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "EXECUTION_FAILED")
                }
                WorkflowError::EmptyOutput => (StatusCode::BAD_GATEWAY, "EMPTY_OUTPUT"),
            },
            AppError::Content(_) => (StatusCode::BAD_GATEWAY, "CONTENT_API_ERROR"),
            AppError::Engine(EngineApiError::Unreachable(_)) => {
                (StatusCode::BAD_GATEWAY, "ENGINE_UNREACHABLE")
            }
            AppError::Engine(EngineApiError::Rejected { .. }) => {
                (StatusCode::BAD_GATEWAY, "ENGINE_REJECTED")
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        };

        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(error = %message, %code, "Request failed");
        }

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: AppError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn workflow_errors_map_to_expected_statuses() {
        assert_eq!(
            status_of(WorkflowError::NotFound("k".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(WorkflowError::UnsupportedType("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(WorkflowError::EmptyOutput.into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(WorkflowError::Execution("boom".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn bad_request_is_400() {
        assert_eq!(
            status_of(AppError::BadRequest("missing field".into())),
            StatusCode::BAD_REQUEST
        );
    }
}
