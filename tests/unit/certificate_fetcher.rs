//! Ops Manager client against a mock API.

use cert_exporter::http::{HttpConfig, build_http_client};
use cert_exporter::{
    BearerToken, CertificateSource, ErrorKind, ExporterError, NetworkFailure, OpsManClient, Token,
};
use chrono::Utc;
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CERTIFICATES_PATH: &str = "/api/v0/deployed/certificates";

fn client(server: &MockServer, timeout: Duration) -> OpsManClient {
    let http = build_http_client(&HttpConfig::default().with_timeout(timeout)).unwrap();
    let url = Url::parse(&format!("{}{CERTIFICATES_PATH}", server.uri())).unwrap();
    OpsManClient::new(http, url)
}

fn bearer(value: &str) -> BearerToken {
    Token::new(value, Utc::now(), Duration::from_secs(3600)).bearer()
}

async fn mount(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(CERTIFICATES_PATH))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_sends_bearer_and_maps_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CERTIFICATES_PATH))
        .and(header("authorization", "Bearer abc.def"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "certificates": [
                {
                    "configurable": false,
                    "is_ca": false,
                    "property_reference": ".properties.networking_poe_ssl_certs",
                    "property_type": "rsa_cert_credentials",
                    "product_guid": "cf-0123",
                    "location": "ops_manager",
                    "variable_path": "/opsmgr/cf-0123/router-tls",
                    "issuer": "/C=US/O=Pivotal",
                    "common_name": "*.apps.example.com",
                    "valid_from": "2024-03-01T00:00:00Z",
                    "valid_until": "2026-03-01T00:00:00Z"
                },
                {
                    "is_ca": true,
                    "property_reference": ".properties.uaa_ca",
                    "product_guid": "p-bosh-0123",
                    "location": "credhub",
                    "variable_path": "/p-bosh/uaa-tls",
                    "issuer": "/C=US/O=Pivotal",
                    "valid_from": "2024-03-01T00:00:00Z",
                    "valid_until": "2025-03-01T00:00:00Z"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let records = client(&server, Duration::from_secs(5))
        .fetch(&bearer("abc.def"))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "/opsmgr/cf-0123/router-tls");
    assert_eq!(records[0].common_name, "*.apps.example.com");
    assert_eq!(records[1].name, "/p-bosh/uaa-tls");
    assert!(records[1].is_ca);
    assert!(records[1].common_name.is_empty());
}

#[tokio::test]
async fn test_duplicate_names_keep_last() {
    let server = MockServer::start().await;
    let entry = |until: &str| {
        json!({
            "variable_path": "/dup",
            "valid_from": "2024-01-01T00:00:00Z",
            "valid_until": until
        })
    };
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "certificates": [entry("2025-01-01T00:00:00Z"), entry("2027-01-01T00:00:00Z")]
        })),
    )
    .await;

    let records = client(&server, Duration::from_secs(5))
        .fetch(&bearer("t"))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].valid_until.to_rfc3339(), "2027-01-01T00:00:00+00:00");
}

#[tokio::test]
async fn test_rejected_token_is_auth_error() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_token"})),
    )
    .await;

    let err = client(&server, Duration::from_secs(5))
        .fetch(&bearer("expired"))
        .await
        .unwrap_err();
    assert!(err.invalidates_token());
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn test_server_error_is_transient_network_error() {
    let server = MockServer::start().await;
    mount(&server, ResponseTemplate::new(502).set_body_string("bad gateway")).await;

    let err = client(&server, Duration::from_secs(5))
        .fetch(&bearer("t"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExporterError::Network {
            failure: NetworkFailure::Status(502),
            ..
        }
    ));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_slow_response_is_timeout() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"certificates": []}))
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let err = client(&server, Duration::from_millis(300))
        .fetch(&bearer("t"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExporterError::Network {
            failure: NetworkFailure::Timeout,
            ..
        }
    ));
}

#[tokio::test]
async fn test_html_login_page_is_parse_error() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_string("<html><body>Ops Manager login</body></html>"),
    )
    .await;

    let err = client(&server, Duration::from_secs(5))
        .fetch(&bearer("t"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[tokio::test]
async fn test_unexpected_client_error_is_parse_error() {
    let server = MockServer::start().await;
    mount(&server, ResponseTemplate::new(404)).await;

    let err = client(&server, Duration::from_secs(5))
        .fetch(&bearer("t"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}
