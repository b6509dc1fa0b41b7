//! Integration tests for the API client using wiremock
//!
//! These validate request shaping, payload parsing and the response
//! classification taxonomy against a mock HTTP server.

use std::time::Duration;

use gavel::client::{CongressClient, LegislativeApi};
use gavel::error::FetchError;
use gavel::models::{BillReference, BillType};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> CongressClient {
    CongressClient::new(&server.uri(), "test-key", 100, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_bill_detail_success() {
    let mock_server = MockServer::start().await;
    let body = r#"{
        "bill": {
            "congress": 118,
            "type": "HR",
            "number": "3076",
            "title": "Postal Service Reform Act",
            "latestAction": {
                "actionDate": "2023-06-01",
                "text": "Referred to the Committee on Oversight."
            },
            "actions": {"count": 3}
        }
    }"#;

    Mock::given(method("GET"))
        .and(path("/bill/118/hr/3076"))
        .and(query_param("api_key", "test-key"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let bill = BillReference::new(118, BillType::Hr, 3076);
    let detail = client(&mock_server).bill_detail(&bill).await.unwrap();

    assert_eq!(detail.congress, 118);
    assert_eq!(detail.title.as_deref(), Some("Postal Service Reform Act"));
    assert!(detail.has_actions());
    assert_eq!(
        detail.latest_action.unwrap().text.as_deref(),
        Some("Referred to the Committee on Oversight.")
    );
}

#[tokio::test]
async fn test_429_classified_with_retry_after_hint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bill/118/hr/1"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&mock_server)
        .await;

    let bill = BillReference::new(118, BillType::Hr, 1);
    let error = client(&mock_server).bill_detail(&bill).await.unwrap_err();

    match error {
        FetchError::RateLimited { retry_after_ms } => {
            assert_eq!(retry_after_ms, Some(30_000));
        }
        other => panic!("expected rate-limit error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_404_is_permanent_and_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bill/118/s/9999"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let bill = BillReference::new(118, BillType::S, 9999);
    let error = client(&mock_server).bill_detail(&bill).await.unwrap_err();

    assert!(matches!(error, FetchError::Permanent(404)));
    assert!(!error.is_transient());
}

#[tokio::test]
async fn test_503_classified_as_service_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bill/118/hr/2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let bill = BillReference::new(118, BillType::Hr, 2);
    let error = client(&mock_server).bill_detail(&bill).await.unwrap_err();

    assert!(matches!(error, FetchError::ServiceUnavailable));
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_list_bills_parses_and_skips_malformed() {
    let mock_server = MockServer::start().await;
    let body = r#"{
        "bills": [
            {"congress": 118, "type": "HR", "number": "1"},
            {"congress": 118, "type": "S", "number": "42"},
            {"congress": 118, "type": "XYZ", "number": "3"},
            {"congress": 118, "type": "HR", "number": "not-a-number"}
        ]
    }"#;

    Mock::given(method("GET"))
        .and(path("/bill/118"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let bills = client(&mock_server)
        .list_bills(Some(118), 0, 20)
        .await
        .unwrap();

    // Unknown types and non-numeric numbers are skipped, not fatal
    assert_eq!(bills.len(), 2);
    assert_eq!(bills[0], BillReference::new(118, BillType::Hr, 1));
    assert_eq!(bills[1], BillReference::new(118, BillType::S, 42));
}

#[tokio::test]
async fn test_text_versions_listing() {
    let mock_server = MockServer::start().await;
    let body = r#"{
        "textVersions": [
            {
                "date": "2023-06-01T04:00:00Z",
                "type": "Engrossed in House",
                "formats": [
                    {"type": "Formatted XML", "url": "https://example.com/bill.xml"},
                    {"type": "PDF", "url": "https://example.com/bill.pdf"}
                ]
            }
        ]
    }"#;

    Mock::given(method("GET"))
        .and(path("/bill/118/hjres/12/text"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let bill = BillReference::new(118, BillType::Hjres, 12);
    let versions = client(&mock_server).text_versions(&bill).await.unwrap();

    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].formats.len(), 2);
    assert_eq!(versions[0].formats[0].format_type, "Formatted XML");
}

#[tokio::test]
async fn test_fetch_document_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/doc/bill.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("A BILL to test."))
        .mount(&mock_server)
        .await;

    let url = format!("{}/doc/bill.txt", mock_server.uri());
    let body = client(&mock_server).fetch_document(&url).await.unwrap();
    assert_eq!(body, "A BILL to test.");
}

#[tokio::test]
async fn test_malformed_json_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bill/118/hr/5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let bill = BillReference::new(118, BillType::Hr, 5);
    let error = client(&mock_server).bill_detail(&bill).await.unwrap_err();

    assert!(matches!(error, FetchError::Decode(_)));
    assert!(!error.is_transient());
}
