//! Authenticated CRM HTTP client
//!
//! Every call carries a bearer token and the CRM `Version` header. HTTP 429
//! and transport failures are retried on the configured schedule before the
//! error surfaces; other non-2xx responses are returned immediately.

use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_retry::RetryIf;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::retry::RetrySchedule;
use crate::tokens::{AgencyCredential, BearerToken, LocationToken};

/// API revision sent in the `Version` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    /// Contacts, users and OAuth endpoints
    Standard,
    /// SaaS public API (location lookup by Stripe customer)
    Saas,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "2021-07-28",
            Self::Saas => "2021-04-15",
        }
    }
}

/// Request payload encodings used by the CRM
#[derive(Debug, Clone, Copy)]
pub enum RequestBody<'a> {
    Json(&'a Value),
    Form(&'a [(&'a str, &'a str)]),
}

#[derive(Debug, Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetrySchedule,
}

impl CrmClient {
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.http_retry.clone(),
        })
    }

    /// Send one logical request, retrying 429s and network failures
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        token: &str,
        version: ApiVersion,
        query: &[(&str, &str)],
        body: Option<RequestBody<'_>>,
    ) -> SyncResult<(StatusCode, Value)> {
        let mut attempt = 0usize;

        RetryIf::spawn(
            self.retry.strategy(),
            || {
                attempt += 1;
                self.send_once(method.clone(), path, token, version, query, body, attempt)
            },
            |e: &SyncError| {
                if e.is_transient() {
                    tracing::info!(path = %path, error = %e, "Transient CRM failure, retrying");
                    true
                } else {
                    false
                }
            },
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_once(
        &self,
        method: Method,
        path: &str,
        token: &str,
        version: ApiVersion,
        query: &[(&str, &str)],
        body: Option<RequestBody<'_>>,
        attempt: usize,
    ) -> SyncResult<(StatusCode, Value)> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header("Version", version.as_str())
            .header(ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        request = match body {
            Some(RequestBody::Json(value)) => request.json(value),
            Some(RequestBody::Form(fields)) => request.form(fields),
            None => request,
        };

        let network = |e: reqwest::Error| SyncError::Network {
            path: path.to_string(),
            message: e.to_string(),
        };

        let response = request.send().await.map_err(network)?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SyncError::RateLimited {
                path: path.to_string(),
                attempts: attempt,
            });
        }

        let text = response.text().await.map_err(network)?;

        if !status.is_success() {
            tracing::error!(
                path = %path,
                status = %status,
                body = %text,
                "CRM request failed"
            );
            return Err(SyncError::Api {
                status: status.as_u16(),
                path: path.to_string(),
                body: text,
            });
        }

        let json = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| SyncError::Decode {
                path: path.to_string(),
                message: e.to_string(),
            })?
        };

        Ok((status, json))
    }

    /// GET and decode a typed response; read-only, so either token kind is accepted
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &impl BearerToken,
        version: ApiVersion,
        query: &[(&str, &str)],
    ) -> SyncResult<T> {
        let (_, json) = self
            .call(Method::GET, path, token.bearer(), version, query, None)
            .await?;
        decode(path, json)
    }

    /// PUT a JSON body. Mutations only ever run under a location-scoped token.
    pub async fn put_json<B: Serialize>(
        &self,
        path: &str,
        token: &LocationToken,
        body: &B,
    ) -> SyncResult<Value> {
        let body = serde_json::to_value(body).map_err(|e| SyncError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let (_, json) = self
            .call(
                Method::PUT,
                path,
                token.bearer(),
                ApiVersion::Standard,
                &[],
                Some(RequestBody::Json(&body)),
            )
            .await?;
        Ok(json)
    }

    /// POST a form under the agency credential (token exchange)
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &AgencyCredential,
        fields: &[(&str, &str)],
    ) -> SyncResult<T> {
        let (_, json) = self
            .call(
                Method::POST,
                path,
                token.bearer(),
                ApiVersion::Standard,
                &[],
                Some(RequestBody::Form(fields)),
            )
            .await?;
        decode(path, json)
    }
}

fn decode<T: DeserializeOwned>(path: &str, json: Value) -> SyncResult<T> {
    serde_json::from_value(json).map_err(|e| SyncError::Decode {
        path: path.to_string(),
        message: e.to_string(),
    })
}
