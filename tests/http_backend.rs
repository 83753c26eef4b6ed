//! Tests for the HTTP backend request format and error mapping.

use std::collections::BTreeMap;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::*;

fn backend(server: &MockServer) -> HttpBackend {
    HttpBackend::new(
        "test_api_key",
        Some(&server.uri()),
        SystemInfo {
            platform_flavor: "native".to_string(),
            platform_version: Some("1.0".to_string()),
            ui_preview_mode: false,
        },
    )
    .expect("valid backend config")
}

#[tokio::test]
async fn test_post_attribution_data_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/subscribers/userID/attribution"))
        .and(header("authorization", "Bearer test_api_key"))
        .and(header("x-platform-flavor", "native"))
        .and(body_json(json!({"network": 0, "data": {"something": "here"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server)
        .post_attribution_data(
            &attribution_data(json!({"something": "here"})),
            AttributionNetwork::AppleSearchAds,
            "userID",
        )
        .await
        .expect("post should succeed");
}

#[tokio::test]
async fn test_post_ad_services_token_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/subscribers/userID/adservices_attribution"))
        .and(body_json(json!({"aad_attribution_token": "asdf"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server)
        .post_ad_services_token("asdf", "userID")
        .await
        .expect("post should succeed");
}

#[tokio::test]
async fn test_post_subscriber_attributes_request() {
    let server = MockServer::start().await;
    let set_at = chrono::DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/subscribers/userID/attributes"))
        .and(body_json(json!({
            "attributes": {
                "$adjustId": {"value": "abc", "updated_at_ms": 1_700_000_000_000i64},
                "$campaign": {"value": null, "updated_at_ms": 1_700_000_000_000i64},
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let attributes = BTreeMap::from([
        (
            "$adjustId".to_string(),
            SubscriberAttribute {
                value: Some("abc".to_string()),
                set_at,
                is_synced: false,
            },
        ),
        (
            "$campaign".to_string(),
            SubscriberAttribute {
                value: None,
                set_at,
                is_synced: false,
            },
        ),
    ]);

    backend(&server)
        .post_subscriber_attributes(&attributes, "userID")
        .await
        .expect("post should succeed");
}

#[tokio::test]
async fn test_error_response_maps_to_error_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/subscribers/userID/adservices_attribution"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"code": 7225, "message": "Invalid API Key."})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = backend(&server)
        .post_ad_services_token("asdf", "userID")
        .await
        .unwrap_err();

    assert_eq!(err.code, PurchasesErrorCode::InvalidApiKey);
    assert_eq!(err.status_code, Some(401));
    assert!(err.message.contains("Invalid API Key."), "got: {}", err.message);
}

#[tokio::test]
async fn test_server_error_without_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/subscribers/userID/attribution"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = backend(&server)
        .post_attribution_data(&AttributionData::new(), AttributionNetwork::Adjust, "userID")
        .await
        .unwrap_err();

    assert_eq!(err.code, PurchasesErrorCode::ServerError);
    assert_eq!(err.status_code, Some(503));
    assert_eq!(err.message, "Request failed: 503");
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let backend = HttpBackend::new("test_api_key", Some(&uri), SystemInfo::default()).unwrap();
    let err = backend
        .post_ad_services_token("asdf", "userID")
        .await
        .unwrap_err();

    assert_eq!(err.code, PurchasesErrorCode::NetworkError);
}
