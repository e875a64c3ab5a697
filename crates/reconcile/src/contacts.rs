//! Default-location contact reconciliation
//!
//! The contact is found by email, then re-read in full before anything is
//! written: search results can carry a partial tag list, and building an
//! update from them would drop tags. The update is a merge:
//!
//! - tags: existing tags plus `close` and `closed`, never fewer
//! - phone: the checkout phone when it differs from the stored one
//! - names: capitalized via [`crate::names::normalize_name`]
//!
//! When the tags already cover `close`/`closed` and the phone matches, no
//! write is issued at all.

use serde::{Deserialize, Deserializer, Serialize};

use crate::client::{ApiVersion, CrmClient};
use crate::error::SyncResult;
use crate::event::CustomerEvent;
use crate::names::normalize_name;
use crate::phone::same_phone;
use crate::tokens::LocationToken;

/// Tags every reconciled contact must carry
pub const CLOSED_TAGS: [&str; 2] = ["close", "closed"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct ContactSearchResponse {
    #[serde(default)]
    contacts: Vec<Contact>,
}

/// `GET /contacts/{id}` wraps the record; older responses return it bare
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContactDetail {
    Wrapped { contact: Contact },
    Bare(Contact),
}

impl ContactDetail {
    fn into_contact(self) -> Contact {
        match self {
            Self::Wrapped { contact } | Self::Bare(contact) => contact,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContactUpdate<'a> {
    phone: &'a str,
    tags: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
}

/// Merged state computed from the full contact and the event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactPlan {
    pub tags: Vec<String>,
    pub tags_added: bool,
    pub phone: String,
    pub phone_changed: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ContactPlan {
    pub fn new(contact: &Contact, event: &CustomerEvent) -> Self {
        let mut tags = contact.tags.clone();
        let mut tags_added = false;
        for required in CLOSED_TAGS {
            if !tags.iter().any(|t| t == required) {
                tags.push(required.to_string());
                tags_added = true;
            }
        }

        let stored_phone = contact.phone.as_deref().unwrap_or_default();
        let phone_changed = !same_phone(stored_phone, &event.phone);
        let phone = if phone_changed {
            event.phone.clone()
        } else {
            stored_phone.to_string()
        };

        let name = |incoming: &Option<String>, stored: &Option<String>| {
            incoming
                .as_deref()
                .or(stored.as_deref())
                .map(normalize_name)
                .filter(|n| !n.is_empty())
        };

        Self {
            tags,
            tags_added,
            phone,
            phone_changed,
            first_name: name(&event.first_name, &contact.first_name),
            last_name: name(&event.last_name, &contact.last_name),
        }
    }

    /// Names alone never trigger a write; they ride along with tag or phone changes
    pub fn needs_write(&self) -> bool {
        self.tags_added || self.phone_changed
    }
}

/// Result of reconciling the default-location contact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactOutcome {
    /// 1 when a matching contact exists and is now consistent, whether or not a write was needed
    pub contacts_updated: usize,
    /// 1 when the close/closed tags had to be added
    pub tags_added: usize,
    /// Whether a PUT was issued
    pub wrote: bool,
}

pub struct ContactReconciler {
    client: CrmClient,
}

impl ContactReconciler {
    pub fn new(client: CrmClient) -> Self {
        Self { client }
    }

    /// Reconcile the contact matching the event's email in the token's location
    pub async fn reconcile(
        &self,
        token: &LocationToken,
        event: &CustomerEvent,
    ) -> SyncResult<ContactOutcome> {
        let location_id = token.location_id();

        let matches = self.search_by_email(token, &event.email).await?;
        let Some(found) = matches.first() else {
            tracing::info!(
                location_id = %location_id,
                email = %event.email,
                "No contact found for email, nothing to reconcile"
            );
            return Ok(ContactOutcome::default());
        };
        if matches.len() > 1 {
            tracing::warn!(
                location_id = %location_id,
                email = %event.email,
                count = matches.len(),
                "Multiple contacts share this email, reconciling the first"
            );
        }

        let contact = self.fetch(token, &found.id).await?;
        let plan = ContactPlan::new(&contact, event);

        if !plan.needs_write() {
            tracing::info!(
                contact_id = %contact.id,
                location_id = %location_id,
                "Contact already has phone and tags"
            );
            return Ok(ContactOutcome {
                contacts_updated: 1,
                tags_added: 0,
                wrote: false,
            });
        }

        let update = ContactUpdate {
            phone: &plan.phone,
            tags: &plan.tags,
            first_name: plan.first_name.as_deref(),
            last_name: plan.last_name.as_deref(),
        };
        self.client
            .put_json(&format!("/contacts/{}", contact.id), token, &update)
            .await?;

        tracing::info!(
            contact_id = %contact.id,
            location_id = %location_id,
            phone_changed = plan.phone_changed,
            tags_added = plan.tags_added,
            "Updated contact"
        );

        Ok(ContactOutcome {
            contacts_updated: 1,
            tags_added: usize::from(plan.tags_added),
            wrote: true,
        })
    }

    /// Contacts whose email matches exactly (case-insensitive)
    async fn search_by_email(
        &self,
        token: &LocationToken,
        email: &str,
    ) -> SyncResult<Vec<Contact>> {
        let query = [
            ("locationId", token.location_id()),
            ("query", email),
            ("limit", "100"),
        ];
        let response: ContactSearchResponse = self
            .client
            .get_json("/contacts/", token, ApiVersion::Standard, &query)
            .await?;

        let matching: Vec<Contact> = response
            .contacts
            .into_iter()
            .filter(|c| {
                c.email
                    .as_deref()
                    .is_some_and(|e| e.trim().eq_ignore_ascii_case(email))
            })
            .collect();

        tracing::info!(
            location_id = %token.location_id(),
            count = matching.len(),
            "Found contacts with email"
        );
        Ok(matching)
    }

    async fn fetch(&self, token: &LocationToken, contact_id: &str) -> SyncResult<Contact> {
        let detail: ContactDetail = self
            .client
            .get_json(
                &format!("/contacts/{}", contact_id),
                token,
                ApiVersion::Standard,
                &[],
            )
            .await?;
        Ok(detail.into_contact())
    }
}
