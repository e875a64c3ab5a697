// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! PhoneSync API Library
//!
//! HTTP surface for the reconciliation workflow: the Stripe webhook, a
//! function-URL style invocation endpoint and a health check.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;


pub use config::{Config, LogFormat};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
