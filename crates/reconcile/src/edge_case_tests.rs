// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! End-to-end scenarios for the reconciliation workflow
//!
//! Every scenario runs the full workflow against a mockito CRM:
//! - Contact merge (scenarios A and B)
//! - Subaccount never provisioned (scenario C)
//! - Idempotent user update (scenario D)
//! - Branch isolation and agency authentication failure
//! - Rate limiting on writes

#[cfg(test)]
mod workflow_scenarios {
    use std::sync::Arc;
    use std::time::Duration;

    use mockito::{Matcher, Mock, ServerGuard};
    use serde_json::json;

    use crate::config::SyncConfig;
    use crate::retry::RetrySchedule;
    use crate::secrets::StaticSecretStore;
    use crate::workflow::{HandlerResponse, PhoneSync, ResponseBody, IGNORED_MESSAGE};

    const DEFAULT_LOCATION: &str = "loc_default";
    const SUB_LOCATION: &str = "loc_sub";
    const LOCATIONS_PATH: &str = "/saas-api/public-api/locations";

    fn checkout_body() -> String {
        json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "customer": "cus_1",
                    "subscription": "sub_1",
                    "customer_details": {
                        "email": "a@x.com",
                        "phone": "+15551234567",
                        "name": "anthony o'connor"
                    }
                }
            }
        })
        .to_string()
    }

    fn sync(server: &ServerGuard) -> PhoneSync {
        let config = SyncConfig {
            base_url: server.url(),
            company_id: "comp_1".into(),
            default_location_id: DEFAULT_LOCATION.into(),
            location_retry: RetrySchedule::doubling(Duration::from_millis(1), 6),
            http_retry: RetrySchedule::doubling(Duration::from_millis(1), 3),
            ..SyncConfig::default()
        };
        let secrets = StaticSecretStore::new().with_secret("GHLAccessKey", "agency-token");
        PhoneSync::new(config, Arc::new(secrets)).unwrap()
    }

    async fn token_mock(server: &mut ServerGuard, location_id: &str, token: &str) -> Mock {
        server
            .mock("POST", "/oauth/locationToken")
            .match_header("authorization", "Bearer agency-token")
            .match_body(Matcher::UrlEncoded("locationId".into(), location_id.into()))
            .with_status(200)
            .with_body(json!({ "access_token": token }).to_string())
            .create_async()
            .await
    }

    /// Contact search + full record for the default location
    async fn contact_mocks(server: &mut ServerGuard, contact: Option<serde_json::Value>) -> Vec<Mock> {
        let search = match &contact {
            Some(c) => json!({ "contacts": [c] }),
            None => json!({ "contacts": [] }),
        };
        let mut mocks = vec![server
            .mock("GET", "/contacts/")
            .match_header("authorization", "Bearer default-token")
            .match_query(Matcher::UrlEncoded("locationId".into(), DEFAULT_LOCATION.into()))
            .with_status(200)
            .with_body(search.to_string())
            .create_async()
            .await];
        if let Some(c) = contact {
            mocks.push(
                server
                    .mock("GET", "/contacts/c1")
                    .with_status(200)
                    .with_body(json!({ "contact": c }).to_string())
                    .create_async()
                    .await,
            );
        }
        mocks
    }

    async fn locations_mock(server: &mut ServerGuard, ids: &[&str]) -> Mock {
        server
            .mock("GET", LOCATIONS_PATH)
            .match_query(Matcher::UrlEncoded("customerId".into(), "cus_1".into()))
            .with_status(200)
            .with_body(json!({ "data": ids }).to_string())
            .create_async()
            .await
    }

    async fn users_mock(server: &mut ServerGuard, users: serde_json::Value) -> Mock {
        server
            .mock("GET", "/users/")
            .match_header("authorization", "Bearer sub-token")
            .match_query(Matcher::UrlEncoded("locationId".into(), SUB_LOCATION.into()))
            .with_status(200)
            .with_body(json!({ "users": users }).to_string())
            .create_async()
            .await
    }

    fn body(response: &HandlerResponse) -> serde_json::Value {
        serde_json::to_value(&response.body).unwrap()
    }

    // =========================================================================
    // Scenario A: contact with tags {"vip"} and a different phone
    // =========================================================================
    #[tokio::test]
    async fn test_contact_tags_merged_and_phone_updated() {
        let mut server = mockito::Server::new_async().await;
        let _default_token = token_mock(&mut server, DEFAULT_LOCATION, "default-token").await;
        let _sub_token = token_mock(&mut server, SUB_LOCATION, "sub-token").await;
        let _contacts = contact_mocks(
            &mut server,
            Some(json!({"id": "c1", "email": "a@x.com", "phone": "+15550000000", "tags": ["vip"]})),
        )
        .await;
        let contact_update = server
            .mock("PUT", "/contacts/c1")
            .match_header("authorization", "Bearer default-token")
            .match_body(Matcher::Json(json!({
                "phone": "+15551234567",
                "tags": ["vip", "close", "closed"],
                "firstName": "Anthony",
                "lastName": "O'Connor"
            })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;
        let _locations = locations_mock(&mut server, &[SUB_LOCATION]).await;
        let _users = users_mock(&mut server, json!([{"id": "u1", "email": "a@x.com"}])).await;
        let user_update = server
            .mock("PUT", "/users/u1")
            .match_header("authorization", "Bearer sub-token")
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let response = sync(&server).handle_webhook(&checkout_body()).await;

        assert_eq!(response.status_code, 200);
        let body = body(&response);
        assert_eq!(body["default_location"]["location_id"], DEFAULT_LOCATION);
        assert_eq!(body["default_location"]["contacts_updated"], 1);
        assert_eq!(body["default_location"]["tags_added"], 1);
        assert_eq!(body["new_subaccounts"]["total_users_updated"], 1);
        assert_eq!(body["new_subaccounts"]["locations"][0]["location_id"], SUB_LOCATION);
        assert_eq!(body["stripe_customer_id"], "cus_1");
        contact_update.assert_async().await;
        user_update.assert_async().await;
    }

    // =========================================================================
    // Scenario B: no contact for the email
    // =========================================================================
    #[tokio::test]
    async fn test_missing_contact_counts_zero_without_write() {
        let mut server = mockito::Server::new_async().await;
        let _default_token = token_mock(&mut server, DEFAULT_LOCATION, "default-token").await;
        let _sub_token = token_mock(&mut server, SUB_LOCATION, "sub-token").await;
        let _contacts = contact_mocks(&mut server, None).await;
        let contact_update = server
            .mock("PUT", Matcher::Regex("^/contacts/".into()))
            .expect(0)
            .create_async()
            .await;
        let _locations = locations_mock(&mut server, &[SUB_LOCATION]).await;
        let _users = users_mock(&mut server, json!([])).await;

        let response = sync(&server).handle_webhook(&checkout_body()).await;

        assert_eq!(response.status_code, 200);
        let body = body(&response);
        assert_eq!(body["default_location"]["contacts_updated"], 0);
        assert!(body["default_location"].get("error").is_none());
        assert_eq!(body["new_subaccounts"]["total_users_updated"], 0);
        contact_update.assert_async().await;
    }

    // =========================================================================
    // Scenario C: subaccount never appears within the retry budget
    // =========================================================================
    #[tokio::test]
    async fn test_subaccount_never_provisioned_is_still_success() {
        let mut server = mockito::Server::new_async().await;
        let _default_token = token_mock(&mut server, DEFAULT_LOCATION, "default-token").await;
        let _contacts = contact_mocks(
            &mut server,
            Some(json!({"id": "c1", "email": "a@x.com", "phone": "+15551234567", "tags": ["close", "closed"]})),
        )
        .await;
        let lookups = server
            .mock("GET", LOCATIONS_PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"data": []}"#)
            .expect(7)
            .create_async()
            .await;

        let response = sync(&server).handle_webhook(&checkout_body()).await;

        assert_eq!(response.status_code, 200);
        let body = body(&response);
        assert_eq!(body["default_location"]["contacts_updated"], 1);
        assert_eq!(body["new_subaccounts"]["total_users_updated"], 0);
        assert_eq!(body["new_subaccounts"]["locations"], json!([]));
        assert!(body["note"].as_str().unwrap().contains("cus_1"));
        lookups.assert_async().await;
    }

    // =========================================================================
    // Scenario D: user already carries the checkout phone
    // =========================================================================
    #[tokio::test]
    async fn test_user_with_same_phone_counts_without_write() {
        let mut server = mockito::Server::new_async().await;
        let _default_token = token_mock(&mut server, DEFAULT_LOCATION, "default-token").await;
        let _sub_token = token_mock(&mut server, SUB_LOCATION, "sub-token").await;
        let _contacts = contact_mocks(&mut server, None).await;
        let _locations = locations_mock(&mut server, &[SUB_LOCATION]).await;
        let _users = users_mock(
            &mut server,
            json!([{"id": "u1", "email": "A@X.COM", "phone": "+1 555 123 4567"}]),
        )
        .await;
        let user_update = server
            .mock("PUT", Matcher::Regex("^/users/".into()))
            .expect(0)
            .create_async()
            .await;

        let response = sync(&server).handle_webhook(&checkout_body()).await;

        let body = body(&response);
        assert_eq!(body["new_subaccounts"]["total_users_updated"], 1);
        assert_eq!(body["new_subaccounts"]["locations"][0]["users_updated"], 1);
        user_update.assert_async().await;
    }

    // =========================================================================
    // Contact already consistent: no write, still reconciled
    // =========================================================================
    #[tokio::test]
    async fn test_consistent_contact_not_rewritten() {
        let mut server = mockito::Server::new_async().await;
        let _default_token = token_mock(&mut server, DEFAULT_LOCATION, "default-token").await;
        let _sub_token = token_mock(&mut server, SUB_LOCATION, "sub-token").await;
        let _contacts = contact_mocks(
            &mut server,
            Some(json!({
                "id": "c1",
                "email": "a@x.com",
                "phone": "+1 (555) 123-4567",
                "tags": ["closed", "vip", "close"]
            })),
        )
        .await;
        let contact_update = server
            .mock("PUT", "/contacts/c1")
            .expect(0)
            .create_async()
            .await;
        let _locations = locations_mock(&mut server, &[SUB_LOCATION]).await;
        let _users = users_mock(&mut server, json!([])).await;

        let response = sync(&server).handle_webhook(&checkout_body()).await;

        let body = body(&response);
        assert_eq!(body["default_location"]["contacts_updated"], 1);
        assert_eq!(body["default_location"]["tags_added"], 0);
        contact_update.assert_async().await;
    }

    // =========================================================================
    // 429 on the contact write is absorbed by the client retry
    // =========================================================================
    #[tokio::test]
    async fn test_rate_limited_contact_update_eventually_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let _default_token = token_mock(&mut server, DEFAULT_LOCATION, "default-token").await;
        let _sub_token = token_mock(&mut server, SUB_LOCATION, "sub-token").await;
        let _contacts = contact_mocks(
            &mut server,
            Some(json!({"id": "c1", "email": "a@x.com", "tags": []})),
        )
        .await;
        let limited = server
            .mock("PUT", "/contacts/c1")
            .with_status(429)
            .expect(2)
            .create_async()
            .await;
        let accepted = server
            .mock("PUT", "/contacts/c1")
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;
        let _locations = locations_mock(&mut server, &[SUB_LOCATION]).await;
        let _users = users_mock(&mut server, json!([])).await;

        let response = sync(&server).handle_webhook(&checkout_body()).await;

        let body = body(&response);
        assert_eq!(response.status_code, 200);
        assert_eq!(body["default_location"]["contacts_updated"], 1);
        assert!(body["default_location"].get("error").is_none());
        limited.assert_async().await;
        accepted.assert_async().await;
    }

    // =========================================================================
    // Branch isolation: default location fails, subaccount still reconciled
    // =========================================================================
    #[tokio::test]
    async fn test_default_branch_failure_does_not_stop_subaccount() {
        let mut server = mockito::Server::new_async().await;
        let _default_token = server
            .mock("POST", "/oauth/locationToken")
            .match_body(Matcher::UrlEncoded("locationId".into(), DEFAULT_LOCATION.into()))
            .with_status(403)
            .with_body(r#"{"message": "forbidden"}"#)
            .create_async()
            .await;
        let _sub_token = token_mock(&mut server, SUB_LOCATION, "sub-token").await;
        let _locations = locations_mock(&mut server, &[SUB_LOCATION]).await;
        let _users = users_mock(&mut server, json!([{"id": "u1", "email": "a@x.com", "phone": ""}])).await;
        let user_update = server
            .mock("PUT", "/users/u1")
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let response = sync(&server).handle_webhook(&checkout_body()).await;

        assert_eq!(response.status_code, 200);
        let body = body(&response);
        assert_eq!(body["default_location"]["contacts_updated"], 0);
        assert!(body["default_location"]["error"].is_string());
        assert_eq!(body["new_subaccounts"]["total_users_updated"], 1);
        user_update.assert_async().await;
    }

    // =========================================================================
    // Subaccount token refused: recorded per location, invocation succeeds
    // =========================================================================
    #[tokio::test]
    async fn test_subaccount_token_failure_recorded() {
        let mut server = mockito::Server::new_async().await;
        let _default_token = token_mock(&mut server, DEFAULT_LOCATION, "default-token").await;
        let _sub_token = server
            .mock("POST", "/oauth/locationToken")
            .match_body(Matcher::UrlEncoded("locationId".into(), SUB_LOCATION.into()))
            .with_status(400)
            .with_body(r#"{"message": "location not ready"}"#)
            .create_async()
            .await;
        let _contacts = contact_mocks(&mut server, None).await;
        let _locations = locations_mock(&mut server, &[SUB_LOCATION]).await;

        let response = sync(&server).handle_webhook(&checkout_body()).await;

        assert_eq!(response.status_code, 200);
        let body = body(&response);
        let location = &body["new_subaccounts"]["locations"][0];
        assert_eq!(location["location_id"], SUB_LOCATION);
        assert_eq!(location["users_updated"], 0);
        assert!(location["error"].as_str().unwrap().contains("authentication failed"));
    }

    // =========================================================================
    // Agency credential missing: whole invocation fails, no CRM calls
    // =========================================================================
    #[tokio::test]
    async fn test_agency_auth_failure_aborts_invocation() {
        let mut server = mockito::Server::new_async().await;
        let any_get = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let any_post = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let config = SyncConfig {
            base_url: server.url(),
            ..SyncConfig::default()
        };
        let sync = PhoneSync::new(config, Arc::new(StaticSecretStore::new())).unwrap();
        let response = sync.handle_webhook(&checkout_body()).await;

        assert_eq!(response.status_code, 500);
        assert!(matches!(response.body, ResponseBody::Error { .. }));
        any_get.assert_async().await;
        any_post.assert_async().await;
    }

    // =========================================================================
    // Malformed input and ignored event types never reach the CRM
    // =========================================================================
    #[tokio::test]
    async fn test_input_errors_and_ignored_events() {
        let server = mockito::Server::new_async().await;
        let sync = sync(&server);

        let missing_phone = json!({
            "type": "checkout.session.completed",
            "data": {"object": {"customer": "cus_1", "customer_details": {"email": "a@x.com"}}}
        })
        .to_string();
        let response = sync.handle_webhook(&missing_phone).await;
        assert_eq!(response.status_code, 400);
        assert_eq!(body(&response), json!({"error": "No customer phone found"}));

        let ignored = json!({"type": "customer.created", "data": {"object": {}}}).to_string();
        let response = sync.handle_webhook(&ignored).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(body(&response), json!({ "message": IGNORED_MESSAGE }));
    }
}
