//! Reconciliation error types

use thiserror::Error;

/// Errors raised while reconciling a checkout event into the CRM
#[derive(Debug, Error)]
pub enum SyncError {
    /// Required event fields are missing or the payload is not JSON
    #[error("{0}")]
    Input(String),

    /// Agency credential missing/malformed, or a location token exchange was refused
    #[error("authentication failed ({status:?}): {message}")]
    Auth {
        status: Option<u16>,
        message: String,
    },

    /// The subaccount location never appeared within the retry budget
    #[error("no location found for customer {customer_id} after {attempts} attempts")]
    LocationNotFound { customer_id: String, attempts: usize },

    #[error("rate limited on {path} after {attempts} attempts")]
    RateLimited { path: String, attempts: usize },

    #[error("network error on {path}: {message}")]
    Network { path: String, message: String },

    #[error("CRM API error ({status}) on {path}: {body}")]
    Api {
        status: u16,
        path: String,
        body: String,
    },

    #[error("failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("unable to retrieve secret {name}: {message}")]
    Secret { name: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn auth(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Auth {
            status,
            message: message.into(),
        }
    }

    /// HTTP status the invocation reports when this error ends it
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Input(_) => 400,
            // A refused credential is a client-side problem; anything else is ours
            Self::Auth {
                status: Some(401 | 403),
                ..
            } => 401,
            Self::Auth { .. } | Self::Secret { .. } | Self::Config(_) => 500,
            Self::LocationNotFound { .. } => 200,
            Self::RateLimited { .. } => 429,
            Self::Network { .. } | Self::Api { .. } | Self::Decode { .. } => 502,
        }
    }

    /// Whether the HTTP client should try the same request again
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network { .. })
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
