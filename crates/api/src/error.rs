//! API error type

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use phonesync_reconcile::SyncError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be read as an invocation envelope
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Sync(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::BadRequest(message) => message.clone(),
            Self::Sync(SyncError::Input(message)) => message.clone(),
            Self::Sync(e) => e.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
