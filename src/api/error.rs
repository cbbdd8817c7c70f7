use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use crate::clients::ProviderError;
use crate::pipeline::PipelineError;

/// HTTP 境界のエラー。`{error, message, details?}` の JSON として返す。
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },
    #[error("{0}")]
    NotFound(String),
    #[error("missing or invalid credentials")]
    Unauthorized,
    #[error("upstream provider failed: {0}")]
    UpstreamProvider(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ApiError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UpstreamProvider(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::UpstreamProvider(_) => "upstream_provider_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::NotFound { .. } => Self::NotFound(error.to_string()),
            PipelineError::Upstream(provider) => Self::UpstreamProvider(provider.to_string()),
            PipelineError::Timeout(_) => Self::UpstreamProvider(error.to_string()),
            PipelineError::Store(source) => Self::Internal(source),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(error: ProviderError) -> Self {
        Self::UpstreamProvider(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, details) = match &self {
            Self::Validation { field, message } => (message.clone(), Some(json!({ "field": field }))),
            Self::UpstreamProvider(detail) => (
                "the generative provider failed".to_string(),
                Some(json!({ "provider": detail })),
            ),
            Self::Internal(source) => {
                error!(error = ?source, "request failed with internal error");
                ("internal server error".to_string(), None)
            }
            Self::NotFound(_) | Self::Unauthorized => (self.to_string(), None),
        };

        let body = ErrorBody {
            error: self.code(),
            message,
            details,
        };
        (status, Json(body)).into_response()
    }
}
