//! Application state

use std::sync::Arc;

use phonesync_reconcile::{PhoneSync, SecretStore};

use crate::{config::Config, error::ApiResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Workflow entry point, shared by every request
    pub sync: Arc<PhoneSync>,
}

impl AppState {
    pub fn new(config: Config, secrets: Arc<dyn SecretStore>) -> ApiResult<Self> {
        let sync = PhoneSync::new(config.sync.clone(), secrets)?;
        Ok(Self {
            config,
            sync: Arc::new(sync),
        })
    }
}
