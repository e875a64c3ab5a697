//! Agency credential retrieval and location token exchange

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::client::CrmClient;
use crate::error::{SyncError, SyncResult};
use crate::secrets::SecretStore;

/// Anything that can be sent as a bearer token
pub trait BearerToken {
    fn bearer(&self) -> &str;
}

/// Company-wide credential. Only used for lookups and token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct AgencyCredential(String);

impl AgencyCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl BearerToken for AgencyCredential {
    fn bearer(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AgencyCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AgencyCredential(***)")
    }
}

/// Token scoped to exactly one location
#[derive(Clone, PartialEq, Eq)]
pub struct LocationToken {
    location_id: String,
    token: String,
}

impl LocationToken {
    pub fn new(location_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
            token: token.into(),
        }
    }

    /// The location this token was minted for
    pub fn location_id(&self) -> &str {
        &self.location_id
    }
}

impl BearerToken for LocationToken {
    fn bearer(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for LocationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationToken")
            .field("location_id", &self.location_id)
            .field("token", &"***")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LocationTokenResponse {
    access_token: Option<String>,
}

/// Secret payload when the credential is stored as JSON rather than a bare string
#[derive(Debug, Deserialize)]
struct StoredCredential {
    access_token: Option<String>,
    token: Option<String>,
}

pub struct TokenBroker {
    client: CrmClient,
    secrets: Arc<dyn SecretStore>,
    secret_name: String,
    company_id: String,
}

impl TokenBroker {
    pub fn new(
        client: CrmClient,
        secrets: Arc<dyn SecretStore>,
        secret_name: impl Into<String>,
        company_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            secrets,
            secret_name: secret_name.into(),
            company_id: company_id.into(),
        }
    }

    /// Fetch the agency credential from the secret store
    pub async fn agency_token(&self) -> SyncResult<AgencyCredential> {
        let raw = self
            .secrets
            .get_secret(&self.secret_name)
            .await
            .map_err(|e| {
                tracing::error!(secret = %self.secret_name, error = %e, "Unable to retrieve secret");
                SyncError::auth(None, e.to_string())
            })?;

        parse_credential(&raw).map(AgencyCredential)
    }

    /// Exchange the agency credential for a token scoped to `location_id`
    pub async fn location_token(
        &self,
        agency: &AgencyCredential,
        location_id: &str,
    ) -> SyncResult<LocationToken> {
        let form = [
            ("companyId", self.company_id.as_str()),
            ("locationId", location_id),
        ];

        let response: LocationTokenResponse = self
            .client
            .post_form("/oauth/locationToken", agency, &form)
            .await
            .map_err(|e| match e {
                SyncError::Api { status, body, .. } => SyncError::auth(Some(status), body),
                other => other,
            })?;

        let token = response
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::auth(Some(200), "token response without access_token"))?;

        tracing::info!(location_id = %location_id, "Retrieved location access token");
        Ok(LocationToken::new(location_id, token))
    }
}

fn parse_credential(raw: &str) -> SyncResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SyncError::auth(None, "agency credential is empty"));
    }

    if !trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let stored: StoredCredential = serde_json::from_str(trimmed)
        .map_err(|e| SyncError::auth(None, format!("malformed agency credential: {}", e)))?;

    stored
        .access_token
        .or(stored.token)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SyncError::auth(None, "agency credential has no access_token"))
}
