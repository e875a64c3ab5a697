//! Subaccount user reconciliation

use serde::{Deserialize, Serialize};

use crate::client::{ApiVersion, CrmClient};
use crate::error::SyncResult;
use crate::event::CustomerEvent;
use crate::phone::same_phone;
use crate::tokens::LocationToken;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserPhoneUpdate<'a> {
    phone: &'a str,
    is_ejected_user: bool,
}

pub struct UserReconciler {
    client: CrmClient,
}

impl UserReconciler {
    pub fn new(client: CrmClient) -> Self {
        Self { client }
    }

    /// Write the event phone onto the matching user of the token's location.
    /// Returns 1 when a user matched (written or already consistent), else 0.
    pub async fn reconcile(&self, token: &LocationToken, event: &CustomerEvent) -> SyncResult<usize> {
        let location_id = token.location_id();
        let users = self.list_users(token).await?;

        let Some(user) = users.iter().find(|u| {
            u.email
                .as_deref()
                .is_some_and(|e| e.trim().eq_ignore_ascii_case(&event.email))
        }) else {
            tracing::info!(
                location_id = %location_id,
                email = %event.email,
                "No user with this email in location"
            );
            return Ok(0);
        };

        let stored = user.phone.as_deref().unwrap_or_default();
        if same_phone(stored, &event.phone) {
            tracing::info!(
                user_id = %user.id,
                location_id = %location_id,
                "User already has this phone"
            );
            return Ok(1);
        }

        let update = UserPhoneUpdate {
            phone: &event.phone,
            is_ejected_user: false,
        };
        self.client
            .put_json(&format!("/users/{}", user.id), token, &update)
            .await?;

        tracing::info!(user_id = %user.id, location_id = %location_id, "Updated user phone");
        Ok(1)
    }

    async fn list_users(&self, token: &LocationToken) -> SyncResult<Vec<User>> {
        let response: UsersResponse = self
            .client
            .get_json(
                "/users/",
                token,
                ApiVersion::Standard,
                &[("locationId", token.location_id())],
            )
            .await?;

        tracing::info!(
            location_id = %token.location_id(),
            count = response.users.len(),
            "Found users for location"
        );
        Ok(response.users)
    }
}
