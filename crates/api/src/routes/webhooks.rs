//! Webhook entry points
//!
//! `POST /webhooks/stripe` takes the raw Stripe event and answers with the
//! workflow's status and JSON body. `POST /invoke` takes a function-URL
//! style envelope and always answers 200 with the full
//! `{statusCode, headers, body}` envelope, the logical status living inside.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use phonesync_reconcile::{HandlerResponse, SyncError};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Function-URL invocation; only the body matters here
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl InvokeRequest {
    /// The webhook payload carried by the envelope
    pub fn payload(&self) -> Result<String, SyncError> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| SyncError::Input("Missing request body".to_string()))?;

        if !self.is_base64_encoded {
            return Ok(body.to_string());
        }

        let bytes = STANDARD
            .decode(body)
            .map_err(|e| SyncError::Input(format!("Invalid base64 body: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| SyncError::Input(format!("Body is not UTF-8: {}", e)))
    }
}

pub async fn stripe_webhook(State(state): State<AppState>, body: String) -> Response {
    tracing::info!(bytes = body.len(), "Received Stripe webhook");
    render(state.sync.handle_webhook(&body).await)
}

pub async fn invoke(State(state): State<AppState>, body: String) -> ApiResult<Json<Value>> {
    let request: InvokeRequest = serde_json::from_str(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid invocation envelope: {}", e)))?;

    let response = match request.payload() {
        Ok(payload) => state.sync.handle_webhook(&payload).await,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected invocation envelope");
            HandlerResponse::from_error(&e)
        }
    };

    Ok(Json(response.to_envelope()))
}

/// Logical status becomes the HTTP status
fn render(response: HandlerResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}
