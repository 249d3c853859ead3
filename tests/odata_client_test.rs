//! Integration tests for the OData client against a mock HTTP server
//!
//! Covers client-driven paging, server-driven paging, retry of transient
//! failures, the shared re-authentication on 401 and splitting of long
//! membership filters.

use mockito::{Matcher, Server};
use p21_export::adapters::odata::{FetchRequest, ODataClient, RecordFetcher, MAX_FILTER_VALUES};
use p21_export::config::{secret_string, ConnectionConfig, RetryConfig};
use p21_export::core::engine::{ReportOutcome, ReportScheduler, SchedulerConfig};
use p21_export::core::reports::ReportRegistry;
use p21_export::domain::{FetchError, ReportDescriptor, ReportName};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;

const VIEW_PATH: &str = "/odataservice/odata/view/p21_view_po_hdr";

fn connection(base_url: &str, page_size: usize) -> ConnectionConfig {
    ConnectionConfig {
        base_url: base_url.to_string(),
        username: "api_user".to_string(),
        password: secret_string("api_pass".to_string()),
        timeout_seconds: 5,
        page_size,
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
        },
    }
}

fn page(first: usize, count: usize, total: Option<usize>) -> String {
    let value: Vec<Value> = (first..first + count)
        .map(|n| json!({"po_no": n.to_string(), "supplier_id": 11777}))
        .collect();
    let mut body = json!({ "value": value });
    if let Some(total) = total {
        body["@odata.count"] = json!(total);
    }
    body.to_string()
}

fn request() -> FetchRequest {
    FetchRequest::new("po_headers", "p21_view_po_hdr").select(&["po_no", "supplier_id"])
}

#[tokio::test]
async fn test_client_paging_follows_skip_until_short_page() {
    let mut server = Server::new_async().await;

    let mut mocks = Vec::new();
    for (skip, count) in [(0usize, 50usize), (50, 50), (100, 10)] {
        mocks.push(
            server
                .mock("GET", VIEW_PATH)
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("$skip".into(), skip.to_string()),
                    Matcher::UrlEncoded("$top".into(), "50".into()),
                    Matcher::UrlEncoded("$select".into(), "po_no,supplier_id".into()),
                ]))
                .match_header("authorization", "Bearer token-1")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(page(skip, count, None))
                .expect(1)
                .create_async()
                .await,
        );
    }

    let client = ODataClient::new(&connection(&server.url(), 50))
        .unwrap()
        .with_access_token("token-1");
    let fetched = client.fetch_all(&request()).await.unwrap();

    assert_eq!(fetched.records.len(), 110);
    assert_eq!(fetched.pages, 3);
    assert_eq!(fetched.attempts, 3);
    assert_eq!(fetched.records[0]["po_no"], json!("0"));
    assert_eq!(fetched.records[109]["po_no"], json!("109"));
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_client_paging_stops_at_reported_count() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", VIEW_PATH)
        .match_query(Matcher::UrlEncoded("$skip".into(), "0".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page(0, 50, Some(50)))
        .expect(1)
        .create_async()
        .await;

    let client = ODataClient::new(&connection(&server.url(), 50))
        .unwrap()
        .with_access_token("token-1");
    let fetched = client.fetch_all(&request()).await.unwrap();

    assert_eq!(fetched.records.len(), 50);
    assert_eq!(fetched.pages, 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_paging_continues_when_server_caps_page_size() {
    let mut server = Server::new_async().await;

    let mut mocks = Vec::new();
    for (skip, count) in [(0usize, 100usize), (100, 100), (200, 50)] {
        mocks.push(
            server
                .mock("GET", VIEW_PATH)
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("$skip".into(), skip.to_string()),
                    Matcher::UrlEncoded("$top".into(), "1000".into()),
                ]))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(page(skip, count, Some(250)))
                .expect(1)
                .create_async()
                .await,
        );
    }

    let client = ODataClient::new(&connection(&server.url(), 1000))
        .unwrap()
        .with_access_token("token-1");
    let fetched = client.fetch_all(&request()).await.unwrap();

    assert_eq!(fetched.records.len(), 250);
    assert_eq!(fetched.pages, 3);
    assert_eq!(fetched.records[249]["po_no"], json!("249"));
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_client_paging_stops_on_empty_page_below_count() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", VIEW_PATH)
        .match_query(Matcher::UrlEncoded("$skip".into(), "0".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page(0, 20, Some(30)))
        .expect(1)
        .create_async()
        .await;
    let empty = server
        .mock("GET", VIEW_PATH)
        .match_query(Matcher::UrlEncoded("$skip".into(), "20".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page(20, 0, Some(30)))
        .expect(1)
        .create_async()
        .await;

    let client = ODataClient::new(&connection(&server.url(), 50))
        .unwrap()
        .with_access_token("token-1");
    let fetched = client.fetch_all(&request()).await.unwrap();

    assert_eq!(fetched.records.len(), 20);
    assert_eq!(fetched.pages, 2);
    first.assert_async().await;
    empty.assert_async().await;
}

#[tokio::test]
async fn test_long_membership_filter_is_split_across_requests() {
    let mut server = Server::new_async().await;
    let view_path = "/odataservice/odata/view/p21_view_inv_mast";

    let uids: Vec<Value> = (1..=120).map(|n| json!(n)).collect();
    let request = FetchRequest::new("items", "p21_view_inv_mast")
        .select(&["inv_mast_uid", "item_id"])
        .any_of("inv_mast_uid", uids.iter(), false)
        .unwrap();
    let parts = request.split(MAX_FILTER_VALUES);
    assert_eq!(parts.len(), 3);

    let mut mocks = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        let filter = part.filter_expression().unwrap();
        assert!(filter.len() < 2_000);
        mocks.push(
            server
                .mock("GET", view_path)
                .match_query(Matcher::UrlEncoded("$filter".into(), filter))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(json!({"value": [{"inv_mast_uid": i, "item_id": format!("KDB-{i}")}]}).to_string())
                .expect(1)
                .create_async()
                .await,
        );
    }

    let client = ODataClient::new(&connection(&server.url(), 100))
        .unwrap()
        .with_access_token("token-1");
    let fetched = client.fetch_all(&request).await.unwrap();

    let items: Vec<&Value> = fetched.records.iter().map(|r| &r["item_id"]).collect();
    assert_eq!(items, vec![&json!("KDB-0"), &json!("KDB-1"), &json!("KDB-2")]);
    assert_eq!(fetched.pages, 3);
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_server_paging_follows_next_link() {
    let mut server = Server::new_async().await;
    let next_link = format!("{}{VIEW_PATH}?$skiptoken=2", server.url());

    let first = server
        .mock("GET", VIEW_PATH)
        .match_query(Matcher::UrlEncoded("$skip".into(), "0".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "value": [{"po_no": "1"}, {"po_no": "2"}],
                "@odata.nextLink": next_link,
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", VIEW_PATH)
        .match_query(Matcher::UrlEncoded("$skiptoken".into(), "2".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"value": [{"po_no": "3"}]}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = ODataClient::new(&connection(&server.url(), 2))
        .unwrap()
        .with_access_token("token-1");
    let fetched = client.fetch_all(&request()).await.unwrap();

    let po_numbers: Vec<&Value> = fetched.records.iter().map(|r| &r["po_no"]).collect();
    assert_eq!(po_numbers, vec![&json!("1"), &json!("2"), &json!("3")]);
    assert_eq!(fetched.pages, 2);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_transient_failures_are_retried_and_counted() {
    let mut server = Server::new_async().await;
    let view_path = "/odataservice/odata/view/p21_view_stockstatus_report";

    let unavailable = server
        .mock("GET", view_path)
        .match_query(Matcher::Any)
        .with_status(503)
        .expect(2)
        .create_async()
        .await;
    let ok = server
        .mock("GET", view_path)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"value": [{"item_id": "KDB-100", "qty_on_hand": 4}]}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = ODataClient::new(&connection(&server.url(), 100))
        .unwrap()
        .with_access_token("token-1");
    let scheduler = ReportScheduler::new(
        SchedulerConfig::default(),
        Arc::new(ReportRegistry::standard()),
        Arc::new(client),
    );
    let (_tx, rx) = watch::channel(false);

    let outcome = scheduler
        .run_batch(
            vec![ReportDescriptor::new(
                ReportName::new("inventory_stock_status").unwrap(),
            )],
            rx,
        )
        .await
        .unwrap();

    match &outcome.results[0].outcome {
        ReportOutcome::Succeeded { table, attempts } => {
            assert_eq!(*attempts, 3);
            assert_eq!(table.len(), 1);
        }
        other => panic!("expected success, got {other:?}"),
    }
    unavailable.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_exhausted_retries_are_transient_errors() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", VIEW_PATH)
        .match_query(Matcher::Any)
        .with_status(502)
        .expect(3)
        .create_async()
        .await;

    let client = ODataClient::new(&connection(&server.url(), 50))
        .unwrap()
        .with_access_token("token-1");
    let err = client.fetch_all(&request()).await.unwrap_err();

    assert!(matches!(err, FetchError::Transient { attempts: 3, .. }));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_query_is_not_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", VIEW_PATH)
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body("Could not find a property named 'po_number'")
        .expect(1)
        .create_async()
        .await;

    let client = ODataClient::new(&connection(&server.url(), 50))
        .unwrap()
        .with_access_token("token-1");
    let err = client.fetch_all(&request()).await.unwrap_err();

    assert!(matches!(&err, FetchError::Query(message) if message.contains("po_number")));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_unauthorized_requests_share_one_reauthentication() {
    let mut server = Server::new_async().await;

    let token = server
        .mock("POST", "/api/security/token")
        .match_header("username", "api_user")
        .match_header("password", "api_pass")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"AccessToken": "fresh-token", "ExpiresInSeconds": 3600}).to_string())
        .expect(1)
        .create_async()
        .await;
    let rejected = server
        .mock("GET", VIEW_PATH)
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer expired-token")
        .with_status(401)
        .expect(2)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", VIEW_PATH)
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer fresh-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page(0, 1, Some(1)))
        .expect(2)
        .create_async()
        .await;

    let client = Arc::new(
        ODataClient::new(&connection(&server.url(), 50))
            .unwrap()
            .with_access_token("expired-token"),
    );
    let first = request();
    let second = request();

    let (a, b) = tokio::join!(client.fetch_all(&first), client.fetch_all(&second));

    assert_eq!(a.unwrap().records.len(), 1);
    assert_eq!(b.unwrap().records.len(), 1);
    assert_eq!(client.token_generation().await, 1);
    token.assert_async().await;
    rejected.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn test_rejected_credentials_are_auth_errors() {
    let mut server = Server::new_async().await;
    let token = server
        .mock("POST", "/api/security/token")
        .with_status(401)
        .with_body("invalid username or password")
        .expect(1)
        .create_async()
        .await;

    let client = ODataClient::new(&connection(&server.url(), 50)).unwrap();
    let err = client.authenticate().await.unwrap_err();

    assert!(matches!(err, FetchError::Auth(_)));
    token.assert_async().await;
}

#[tokio::test]
async fn test_transient_token_failure_is_retried() {
    let mut server = Server::new_async().await;
    let unavailable = server
        .mock("POST", "/api/security/token")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let token = server
        .mock("POST", "/api/security/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"AccessToken": "fresh-token", "ExpiresInSeconds": 3600}).to_string())
        .expect(1)
        .create_async()
        .await;
    let view = server
        .mock("GET", VIEW_PATH)
        .match_query(Matcher::Any)
        .match_header("authorization", "Bearer fresh-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(page(0, 1, Some(1)))
        .expect(1)
        .create_async()
        .await;

    let client = ODataClient::new(&connection(&server.url(), 50)).unwrap();
    let fetched = client.fetch_all(&request()).await.unwrap();

    assert_eq!(fetched.records.len(), 1);
    assert_eq!(client.token_generation().await, 1);
    unavailable.assert_async().await;
    token.assert_async().await;
    view.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_token_endpoint_exhausts_retries() {
    let mut server = Server::new_async().await;
    let token = server
        .mock("POST", "/api/security/token")
        .with_status(502)
        .expect(3)
        .create_async()
        .await;

    let client = ODataClient::new(&connection(&server.url(), 50)).unwrap();
    let err = client.authenticate().await.unwrap_err();

    assert!(matches!(err, FetchError::Transient { attempts: 3, .. }));
    token.assert_async().await;
}
