//! Server configuration

use phonesync_reconcile::SyncConfig;

use crate::error::ApiResult;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT=json` selects JSON lines, anything else the human format
    pub fn from_env() -> Self {
        match std::env::var("LOG_FORMAT") {
            Ok(v) if v.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub log_format: LogFormat,
    pub sync: SyncConfig,
}

impl Config {
    pub fn from_env() -> ApiResult<Self> {
        let bind_address = std::env::var("BIND_ADDRESS")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        Ok(Self {
            bind_address,
            log_format: LogFormat::from_env(),
            sync: SyncConfig::from_env()?,
        })
    }
}
