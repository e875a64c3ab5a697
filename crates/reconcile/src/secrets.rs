//! Secret lookup
//!
//! The agency credential lives outside the service. The workflow only needs
//! `get_secret(name)`, so the store is a trait object chosen at startup.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the current value of a named secret
    async fn get_secret(&self, name: &str) -> SyncResult<String>;
}

/// Reads secrets from environment variables named after the secret
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore;

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get_secret(&self, name: &str) -> SyncResult<String> {
        let value = std::env::var(name).map_err(|e| SyncError::Secret {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        tracing::info!(secret = %name, "Retrieved secret successfully");
        Ok(value)
    }
}

/// In-memory secrets, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticSecretStore {
    values: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn get_secret(&self, name: &str) -> SyncResult<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::Secret {
                name: name.to_string(),
                message: "secret not found".to_string(),
            })
    }
}
