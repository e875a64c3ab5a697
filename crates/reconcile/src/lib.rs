// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! PhoneSync Reconciliation
//!
//! Propagates the phone number from a completed Stripe checkout into the
//! CRM, tolerating the delay before the CRM provisions the customer's
//! subaccount.
//!
//! ## Features
//!
//! - **Contact Reconciliation**: Tag and phone merge on the default-location contact
//! - **User Reconciliation**: Phone update on the subaccount user
//! - **Location Resolution**: Bounded exponential wait for subaccount provisioning
//! - **Token Broker**: Agency credential and location-scoped token exchange
//! - **Rate Limit Handling**: 429 and network retry in the HTTP client
//! - **Name Normalization**: O'Connor, Mary-Jane, McDonald

pub mod client;
pub mod config;
pub mod contacts;
pub mod error;
pub mod event;
pub mod locations;
pub mod names;
pub mod phone;
pub mod retry;
pub mod secrets;
pub mod tokens;
pub mod users;
pub mod workflow;

#[cfg(test)]
mod edge_case_tests;

// Client
pub use client::{ApiVersion, CrmClient};

// Config
pub use config::SyncConfig;

// Contacts
pub use contacts::{Contact, ContactOutcome, ContactPlan, ContactReconciler, CLOSED_TAGS};

// Error
pub use error::{SyncError, SyncResult};

// Event
pub use event::{CustomerEvent, WebhookOutcome};

// Locations
pub use locations::{LocationResolver, SubaccountLocation};

// Names
pub use names::{normalize_name, split_full_name};

// Retry
pub use retry::RetrySchedule;

// Secrets
pub use secrets::{EnvSecretStore, SecretStore, StaticSecretStore};

// Tokens
pub use tokens::{AgencyCredential, BearerToken, LocationToken, TokenBroker};

// Users
pub use users::{User, UserReconciler};

// Workflow
pub use workflow::{
    DefaultLocationResult, HandlerResponse, LocationResult, PhoneSync, ReconciliationReport,
    ReconciliationResult, ResponseBody, SubaccountsResult, WorkflowState,
};
