//! Inbound checkout event extraction
//!
//! Only `checkout.session.completed` events are reconciled. Everything else
//! is acknowledged without touching the CRM.

use serde::Deserialize;

use crate::error::{SyncError, SyncResult};
use crate::names::split_full_name;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// Customer identity and contact data carried by a completed checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerEvent {
    pub email: String,
    pub phone: String,
    /// Stripe customer id, the key the CRM provisions subaccounts under
    pub customer_id: String,
    pub subscription_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl CustomerEvent {
    /// Validates the required fields; fails before any CRM call is made
    pub fn new(email: &str, phone: &str, customer_id: &str) -> SyncResult<Self> {
        let email = email.trim();
        let phone = phone.trim();
        let customer_id = customer_id.trim();

        if email.is_empty() {
            return Err(SyncError::Input("No customer email found".into()));
        }
        if phone.is_empty() {
            return Err(SyncError::Input("No customer phone found".into()));
        }
        if customer_id.is_empty() {
            return Err(SyncError::Input("No Stripe customer ID found".into()));
        }

        Ok(Self {
            email: email.to_string(),
            phone: phone.to_string(),
            customer_id: customer_id.to_string(),
            subscription_id: None,
            first_name: None,
            last_name: None,
        })
    }

    pub fn with_subscription(mut self, subscription_id: Option<String>) -> Self {
        self.subscription_id = subscription_id.filter(|s| !s.trim().is_empty());
        self
    }

    /// Attach a "full name" field, split into first and last
    pub fn with_full_name(mut self, full_name: Option<&str>) -> Self {
        if let Some(full_name) = full_name {
            let (first, last) = split_full_name(full_name);
            self.first_name = Some(first).filter(|s| !s.is_empty());
            self.last_name = Some(last).filter(|s| !s.is_empty());
        }
        self
    }
}

/// What a webhook body turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Checkout(CustomerEvent),
    /// Any other event type, carrying the type name
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    event_type: Option<String>,
    data: Option<StripeEventData>,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: Option<CheckoutSession>,
}

#[derive(Debug, Default, Deserialize)]
struct CheckoutSession {
    customer: Option<String>,
    subscription: Option<String>,
    customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
    phone: Option<String>,
    name: Option<String>,
}

impl WebhookOutcome {
    /// Parse a raw Stripe webhook body
    pub fn parse(body: &str) -> SyncResult<Self> {
        let event: StripeEvent = serde_json::from_str(body)
            .map_err(|e| SyncError::Input(format!("Invalid event payload: {}", e)))?;

        let event_type = event.event_type.unwrap_or_else(|| "unknown".to_string());
        tracing::info!(event_type = %event_type, "Processing event");

        if event_type != CHECKOUT_COMPLETED {
            return Ok(Self::Ignored(event_type));
        }

        let session = event.data.and_then(|d| d.object).unwrap_or_default();
        let details = session.customer_details.unwrap_or_default();

        let customer_event = CustomerEvent::new(
            details.email.as_deref().unwrap_or_default(),
            details.phone.as_deref().unwrap_or_default(),
            session.customer.as_deref().unwrap_or_default(),
        )?
        .with_subscription(session.subscription)
        .with_full_name(details.name.as_deref());

        Ok(Self::Checkout(customer_event))
    }
}
