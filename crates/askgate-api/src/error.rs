use askgate_core::{AskError, ErrorKind};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ask(#[from] AskError),

    /// Body that could not be read as an ask request at all.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ask(err) => match err {
                AskError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                AskError::CorpusUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                AskError::RetrievalTimeout { .. } | AskError::DeadlineExceeded(_) => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                AskError::EmbeddingFailure(_)
                | AskError::RetrievalFailed { .. }
                | AskError::ProviderError { .. }
                | AskError::ProviderFatal(_)
                | AskError::ValidationInconclusive { .. } => StatusCode::BAD_GATEWAY,
                AskError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest(_) => ErrorKind::InvalidRequest,
            ApiError::Ask(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(kind = %self.kind(), "request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
