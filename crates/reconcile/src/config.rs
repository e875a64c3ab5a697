//! Reconciliation configuration

use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::retry::RetrySchedule;

pub const DEFAULT_BASE_URL: &str = "https://services.leadconnectorhq.com";
pub const DEFAULT_COMPANY_ID: &str = "Cbjwl9dRdmiskYlzh8Oo";
pub const DEFAULT_LOCATION_ID: &str = "c2DjRsOo4e13Od6ZTU6S";
pub const DEFAULT_SECRET_NAME: &str = "GHLAccessKey";

/// Everything the workflow needs that is not part of the event itself
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// CRM API root, without trailing slash
    pub base_url: String,
    /// Agency (company) the credential belongs to
    pub company_id: String,
    /// Pre-existing location that holds legacy contacts
    pub default_location_id: String,
    /// Name of the agency credential in the secret store
    pub secret_name: String,
    /// Waits between location lookups while the subaccount is provisioned
    pub location_retry: RetrySchedule,
    /// Waits between attempts of one HTTP request on 429 or network failure
    pub http_retry: RetrySchedule,
    pub http_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            company_id: DEFAULT_COMPANY_ID.to_string(),
            default_location_id: DEFAULT_LOCATION_ID.to_string(),
            secret_name: DEFAULT_SECRET_NAME.to_string(),
            location_retry: RetrySchedule::location_provisioning(),
            http_retry: RetrySchedule::transient_http(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> SyncResult<Self> {
        let defaults = Self::default();

        let location_initial = env_parse("LOCATION_RETRY_INITIAL_SECS", 10u64)?;
        let location_count = env_parse("LOCATION_RETRY_COUNT", 6usize)?;
        let http_initial = env_parse("HTTP_RETRY_INITIAL_MS", 2000u64)?;
        let http_count = env_parse("HTTP_RETRY_COUNT", 3usize)?;
        let http_timeout = env_parse("HTTP_TIMEOUT_SECS", 30u64)?;

        let location_retry = checked_schedule(
            "LOCATION_RETRY_INITIAL_SECS",
            RetrySchedule::doubling(Duration::from_secs(location_initial), location_count),
        )?;
        let http_retry = checked_schedule(
            "HTTP_RETRY_INITIAL_MS",
            RetrySchedule::doubling(Duration::from_millis(http_initial), http_count),
        )?;

        Ok(Self {
            base_url: env_or("GHL_BASE_URL", &defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            company_id: env_or("GHL_COMPANY_ID", &defaults.company_id),
            default_location_id: env_or("GHL_DEFAULT_LOCATION_ID", &defaults.default_location_id),
            secret_name: env_or("GHL_SECRET_NAME", &defaults.secret_name),
            location_retry,
            http_retry,
            http_timeout: Duration::from_secs(http_timeout),
        })
    }
}

/// Reject schedules whose total wait does not fit in a `Duration`
fn checked_schedule(key: &str, schedule: RetrySchedule) -> SyncResult<RetrySchedule> {
    match schedule.checked_total_wait() {
        Some(_) => Ok(schedule),
        None => Err(SyncError::Config(format!(
            "{} with {} retries overflows the total wait",
            key,
            schedule.delays().len()
        ))),
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> SyncResult<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| SyncError::Config(format!("{} must be a number, got {:?}", key, raw))),
        _ => Ok(default),
    }
}
