//! Reconciliation workflow
//!
//! ```text
//! Start -> AgencyAuthed -+-> DefaultLocationReconciled ------------------------+-> Done
//!                        +-> SubaccountLocating -> SubaccountAuthed              |
//!                                               -> SubaccountReconciled ---------+
//! ```
//!
//! Any state can end in `Failed`, but only an agency authentication failure
//! (or bad input, before `Start`) fails the invocation. The default-location
//! branch and the subaccount branch run concurrently, touch disjoint records
//! and each mint their own location token; a failure in one is recorded in
//! the result and never stops the other.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::client::CrmClient;
use crate::config::SyncConfig;
use crate::contacts::ContactReconciler;
use crate::error::{SyncError, SyncResult};
use crate::event::{CustomerEvent, WebhookOutcome};
use crate::locations::LocationResolver;
use crate::secrets::SecretStore;
use crate::tokens::{AgencyCredential, TokenBroker};
use crate::users::UserReconciler;

pub const SUCCESS_MESSAGE: &str = "Phone numbers updated successfully";
pub const IGNORED_MESSAGE: &str = "Event type not processed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Input,
    Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Start,
    AgencyAuthed,
    DefaultLocationReconciled,
    SubaccountLocating,
    SubaccountAuthed,
    SubaccountReconciled,
    Done,
    Failed(FailureKind),
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::AgencyAuthed => f.write_str("agency_authed"),
            Self::DefaultLocationReconciled => f.write_str("default_location_reconciled"),
            Self::SubaccountLocating => f.write_str("subaccount_locating"),
            Self::SubaccountAuthed => f.write_str("subaccount_authed"),
            Self::SubaccountReconciled => f.write_str("subaccount_reconciled"),
            Self::Done => f.write_str("done"),
            Self::Failed(FailureKind::Input) => f.write_str("failed(input)"),
            Self::Failed(FailureKind::Auth) => f.write_str("failed(auth)"),
        }
    }
}

fn enter(state: WorkflowState, customer_id: &str) {
    tracing::debug!(state = %state, customer_id = %customer_id, "Workflow transition");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultLocationResult {
    pub location_id: String,
    pub contacts_updated: usize,
    pub tags_added: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationResult {
    pub location_id: String,
    pub users_updated: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubaccountsResult {
    pub total_users_updated: usize,
    pub locations: Vec<LocationResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub default_location: DefaultLocationResult,
    pub new_subaccounts: SubaccountsResult,
}

/// Success body returned to the webhook caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub message: String,
    #[serde(flatten)]
    pub result: ReconciliationResult,
    pub customer_email: String,
    pub customer_phone: String,
    pub stripe_customer_id: String,
    /// Set when the subaccount location had not been provisioned in time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Reconciled(ReconciliationReport),
    Message { message: String },
    Error { error: String },
}

/// Status plus JSON body, shaped like a function-URL response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: ResponseBody,
}

impl HandlerResponse {
    pub fn reconciled(report: ReconciliationReport) -> Self {
        Self {
            status_code: 200,
            body: ResponseBody::Reconciled(report),
        }
    }

    pub fn message(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            body: ResponseBody::Message {
                message: message.into(),
            },
        }
    }

    pub fn from_error(error: &SyncError) -> Self {
        let message = match error {
            SyncError::Input(message) => message.clone(),
            other => other.to_string(),
        };
        Self {
            status_code: error.status_code(),
            body: ResponseBody::Error { error: message },
        }
    }

    /// Lambda-style envelope: the body is a JSON document encoded as a string
    pub fn to_envelope(&self) -> Value {
        let body = serde_json::to_string(&self.body).unwrap_or_else(|_| "{}".to_string());
        json!({
            "statusCode": self.status_code,
            "headers": {"Content-Type": "application/json"},
            "body": body,
        })
    }
}

/// Sequences token exchange, lookups and reconciliation for one checkout
pub struct PhoneSync {
    config: SyncConfig,
    tokens: TokenBroker,
    locations: LocationResolver,
    contacts: ContactReconciler,
    users: UserReconciler,
}

impl PhoneSync {
    pub fn new(config: SyncConfig, secrets: Arc<dyn SecretStore>) -> SyncResult<Self> {
        let client = CrmClient::new(&config)?;

        Ok(Self {
            tokens: TokenBroker::new(
                client.clone(),
                secrets,
                config.secret_name.clone(),
                config.company_id.clone(),
            ),
            locations: LocationResolver::new(
                client.clone(),
                config.company_id.clone(),
                config.location_retry.clone(),
            ),
            contacts: ContactReconciler::new(client.clone()),
            users: UserReconciler::new(client),
            config,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Handle a raw webhook body end to end
    pub async fn handle_webhook(&self, body: &str) -> HandlerResponse {
        match WebhookOutcome::parse(body) {
            Ok(WebhookOutcome::Checkout(event)) => self.handle_event(&event).await,
            Ok(WebhookOutcome::Ignored(event_type)) => {
                tracing::info!(event_type = %event_type, "Ignoring event type");
                HandlerResponse::message(200, IGNORED_MESSAGE)
            }
            Err(e) => {
                enter(WorkflowState::Failed(FailureKind::Input), "");
                tracing::error!(error = %e, "Rejected webhook payload");
                HandlerResponse::from_error(&e)
            }
        }
    }

    pub async fn handle_event(&self, event: &CustomerEvent) -> HandlerResponse {
        match self.reconcile(event).await {
            Ok(report) => HandlerResponse::reconciled(report),
            Err(e) => {
                tracing::error!(error = %e, "Error processing webhook");
                HandlerResponse::from_error(&e)
            }
        }
    }

    /// Run both branches; errors only when the agency credential is unusable
    pub async fn reconcile(&self, event: &CustomerEvent) -> SyncResult<ReconciliationReport> {
        let customer_id = event.customer_id.as_str();
        enter(WorkflowState::Start, customer_id);
        tracing::info!(
            email = %event.email,
            phone = %event.phone,
            customer_id = %customer_id,
            "Processing customer"
        );

        let agency = match self.tokens.agency_token().await {
            Ok(agency) => agency,
            Err(e) => {
                enter(WorkflowState::Failed(FailureKind::Auth), customer_id);
                return Err(e);
            }
        };
        enter(WorkflowState::AgencyAuthed, customer_id);

        let (default_location, (new_subaccounts, note)) = tokio::join!(
            self.reconcile_default_location(&agency, event),
            self.reconcile_subaccounts(&agency, event),
        );
        enter(WorkflowState::Done, customer_id);

        Ok(ReconciliationReport {
            message: SUCCESS_MESSAGE.to_string(),
            result: ReconciliationResult {
                default_location,
                new_subaccounts,
            },
            customer_email: event.email.clone(),
            customer_phone: event.phone.clone(),
            stripe_customer_id: event.customer_id.clone(),
            note,
        })
    }

    async fn reconcile_default_location(
        &self,
        agency: &AgencyCredential,
        event: &CustomerEvent,
    ) -> DefaultLocationResult {
        let location_id = self.config.default_location_id.as_str();
        tracing::info!(location_id = %location_id, "Updating contact in default location");

        let outcome = async {
            let token = self.tokens.location_token(agency, location_id).await?;
            self.contacts.reconcile(&token, event).await
        }
        .await;

        match outcome {
            Ok(outcome) => {
                enter(WorkflowState::DefaultLocationReconciled, &event.customer_id);
                DefaultLocationResult {
                    location_id: location_id.to_string(),
                    contacts_updated: outcome.contacts_updated,
                    tags_added: outcome.tags_added,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(location_id = %location_id, error = %e, "Default location update failed");
                DefaultLocationResult {
                    location_id: location_id.to_string(),
                    contacts_updated: 0,
                    tags_added: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn reconcile_subaccounts(
        &self,
        agency: &AgencyCredential,
        event: &CustomerEvent,
    ) -> (SubaccountsResult, Option<String>) {
        let customer_id = event.customer_id.as_str();
        enter(WorkflowState::SubaccountLocating, customer_id);
        tracing::info!(customer_id = %customer_id, "Looking for new subaccount");

        let locations = match self
            .locations
            .find_locations(agency, customer_id, event.subscription_id.as_deref())
            .await
        {
            Ok(locations) => locations,
            Err(e) => {
                if !matches!(e, SyncError::LocationNotFound { .. }) {
                    tracing::error!(customer_id = %customer_id, error = %e, "Subaccount lookup failed");
                }
                return (SubaccountsResult::default(), Some(e.to_string()));
            }
        };

        let mut result = SubaccountsResult::default();
        for location in locations {
            tracing::info!(location_id = %location.id, "Processing new subaccount");

            let token = match self.tokens.location_token(agency, &location.id).await {
                Ok(token) => token,
                Err(e) => {
                    tracing::error!(location_id = %location.id, error = %e, "Failed to get location token");
                    result.locations.push(LocationResult {
                        location_id: location.id,
                        users_updated: 0,
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };
            enter(WorkflowState::SubaccountAuthed, customer_id);

            let entry = match self.users.reconcile(&token, event).await {
                Ok(users_updated) => {
                    enter(WorkflowState::SubaccountReconciled, customer_id);
                    LocationResult {
                        location_id: location.id,
                        users_updated,
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::error!(location_id = %location.id, error = %e, "User update failed");
                    LocationResult {
                        location_id: location.id,
                        users_updated: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            result.total_users_updated += entry.users_updated;
            result.locations.push(entry);
        }

        (result, None)
    }
}
