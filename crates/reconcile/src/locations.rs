//! Subaccount location lookup
//!
//! The CRM provisions a subaccount location asynchronously after the same
//! checkout that triggers the webhook, so the first lookups usually find
//! nothing. Lookups are repeated on the provisioning schedule until at least
//! one location appears or the budget runs out.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio_retry::RetryIf;

use crate::client::{ApiVersion, CrmClient};
use crate::error::{SyncError, SyncResult};
use crate::retry::RetrySchedule;
use crate::tokens::AgencyCredential;

const LOCATIONS_PATH: &str = "/saas-api/public-api/locations";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubaccountLocation {
    pub id: String,
    pub name: Option<String>,
}

/// The SaaS endpoint returns either bare ids or location objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LocationEntry {
    Id(String),
    Record {
        #[serde(alias = "_id")]
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl From<LocationEntry> for SubaccountLocation {
    fn from(entry: LocationEntry) -> Self {
        match entry {
            LocationEntry::Id(id) => Self { id, name: None },
            LocationEntry::Record { id, name } => Self { id, name },
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocationsResponse {
    #[serde(default)]
    data: Vec<LocationEntry>,
}

pub struct LocationResolver {
    client: CrmClient,
    company_id: String,
    schedule: RetrySchedule,
}

impl LocationResolver {
    pub fn new(client: CrmClient, company_id: impl Into<String>, schedule: RetrySchedule) -> Self {
        Self {
            client,
            company_id: company_id.into(),
            schedule,
        }
    }

    /// Find the locations provisioned for a Stripe customer, waiting for them to appear
    ///
    /// Returns at least one location, or `LocationNotFound` once every
    /// scheduled retry has been spent.
    pub async fn find_locations(
        &self,
        agency: &AgencyCredential,
        customer_id: &str,
        subscription_id: Option<&str>,
    ) -> SyncResult<Vec<SubaccountLocation>> {
        poll_until_provisioned(&self.schedule, customer_id, || {
            self.lookup_or_empty(agency, customer_id, subscription_id)
        })
        .await
    }

    async fn lookup_or_empty(
        &self,
        agency: &AgencyCredential,
        customer_id: &str,
        subscription_id: Option<&str>,
    ) -> Vec<SubaccountLocation> {
        match self.lookup(agency, customer_id, subscription_id).await {
            Ok(found) => found,
            Err(e) => {
                // A failed lookup spends an attempt like an empty one
                tracing::error!(customer_id = %customer_id, error = %e, "Error getting locations");
                Vec::new()
            }
        }
    }

    /// Single lookup without retry; an empty list means "not provisioned yet"
    pub async fn lookup(
        &self,
        agency: &AgencyCredential,
        customer_id: &str,
        subscription_id: Option<&str>,
    ) -> SyncResult<Vec<SubaccountLocation>> {
        let mut query = vec![
            ("companyId", self.company_id.as_str()),
            ("customerId", customer_id),
        ];
        if let Some(subscription_id) = subscription_id {
            query.push(("subscriptionId", subscription_id));
        }

        let response: LocationsResponse = self
            .client
            .get_json(LOCATIONS_PATH, agency, ApiVersion::Saas, &query)
            .await?;

        Ok(response.data.into_iter().map(Into::into).collect())
    }
}

/// Repeat `lookup` on `schedule` until it yields at least one location
async fn poll_until_provisioned<F, Fut>(
    schedule: &RetrySchedule,
    customer_id: &str,
    mut lookup: F,
) -> SyncResult<Vec<SubaccountLocation>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Vec<SubaccountLocation>>,
{
    let max_attempts = schedule.max_attempts();
    let mut attempt = 0usize;

    let locations = RetryIf::spawn(
        schedule.strategy(),
        || {
            attempt += 1;
            let attempt = attempt;
            let pending = lookup();
            async move {
                let found = pending.await;
                if found.is_empty() {
                    tracing::info!(
                        customer_id = %customer_id,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        "No locations found yet"
                    );
                    return Err(SyncError::LocationNotFound {
                        customer_id: customer_id.to_string(),
                        attempts: attempt,
                    });
                }

                tracing::info!(
                    customer_id = %customer_id,
                    attempt = attempt,
                    count = found.len(),
                    "Found locations"
                );
                Ok(found)
            }
        },
        |e: &SyncError| matches!(e, SyncError::LocationNotFound { .. }),
    )
    .await;

    if let Err(SyncError::LocationNotFound { attempts, .. }) = &locations {
        tracing::warn!(
            customer_id = %customer_id,
            attempts = attempts,
            "No locations found after exhausting retries"
        );
    }

    locations
}
