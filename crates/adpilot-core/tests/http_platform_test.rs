//! Integration tests for the REST binding against a mock server.

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use adpilot_core::platform::{
    AdPlatform, CampaignFilter, ConnectionState, HttpPlatform, HttpPlatformConfig, PlatformError,
};
use adpilot_db::models::{CampaignStatus, ExternalStatus};

fn platform(server: &MockServer) -> HttpPlatform {
    HttpPlatform::new(HttpPlatformConfig::new(server.uri()).with_access_token("test-token"))
        .unwrap()
}

#[tokio::test]
async fn sends_bearer_token_and_decodes_connection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/connection"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "state": "connected_with_account",
            "accountId": "123-456-7890",
            "accountName": "Acme Plumbing"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = platform(&server).fetch_connection().await.unwrap();

    assert_eq!(
        state,
        ConnectionState::ConnectedWithAccount {
            account_id: "123-456-7890".into(),
            account_name: "Acme Plumbing".into(),
        }
    );
}

#[tokio::test]
async fn rejection_carries_platform_message() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path(format!("/campaigns/{id}/publish")))
        .and(body_json(json!({ "adGroupIndices": [0, 2] })))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "message": "Budget below platform minimum" })),
        )
        .mount(&server)
        .await;

    let err = platform(&server).publish_draft(id, &[0, 2]).await.unwrap_err();

    assert!(matches!(err, PlatformError::Rejected { status: Some(422), .. }));
    assert_eq!(err.user_message(), "Budget below platform minimum");
}

#[tokio::test]
async fn error_field_is_accepted_as_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "upstream down" })))
        .mount(&server)
        .await;

    let err = platform(&server).list_linkable_accounts().await.unwrap_err();

    assert_eq!(err.user_message(), "upstream down");
}

#[tokio::test]
async fn missing_message_falls_back_to_generic_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = platform(&server).list_linkable_accounts().await.unwrap_err();

    assert_eq!(err.user_message(), adpilot_core::platform::error::GENERIC_FAILURE);
}

#[tokio::test]
async fn unauthorized_status_maps_to_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "grant expired" })))
        .mount(&server)
        .await;

    let err = platform(&server).list_linkable_accounts().await.unwrap_err();

    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let platform = HttpPlatform::new(HttpPlatformConfig::new(uri)).unwrap();
    let err = platform.fetch_connection().await.unwrap_err();

    assert!(err.is_transport());
}

#[tokio::test]
async fn live_campaign_filter_is_sent_as_query() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/campaigns"))
        .and(query_param("published", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": id,
            "name": "Spring plumbing",
            "status": "active",
            "externalResourceId": "customers/1/campaigns/7",
            "externalStatus": "enabled"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let campaigns = platform(&server)
        .list_campaigns(&CampaignFilter::live())
        .await
        .unwrap();

    assert_eq!(campaigns.len(), 1);
    assert_eq!(campaigns[0].status, CampaignStatus::Active);
    assert_eq!(campaigns[0].external_status, Some(ExternalStatus::Enabled));
    assert!(campaigns[0].is_live());
}

#[tokio::test]
async fn toggle_and_disconnect_bodies() {
    let server = MockServer::start().await;
    let id = Uuid::new_v4();
    Mock::given(method("PUT"))
        .and(path(format!("/campaigns/{id}/ad-groups/g-1/status")))
        .and(body_json(json!({ "enabled": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "confirmedStatus": "paused" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/connection/disconnect"))
        .and(body_json(json!({ "pauseCampaigns": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let platform = platform(&server);
    let outcome = platform.set_ad_group_enabled(id, "g-1", false).await.unwrap();
    assert_eq!(outcome.confirmed_status, Some(ExternalStatus::Paused));
    platform.disconnect(true).await.unwrap();
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/connection"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = platform(&server).fetch_connection().await.unwrap_err();

    assert!(matches!(err, PlatformError::Decode(_)));
}
