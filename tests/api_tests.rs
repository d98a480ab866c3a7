use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use fuse_link_relay::config::Config;
use fuse_link_relay::router::{AppState, build_router};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sha2::Sha256;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-api-key";

fn test_config(base: &str) -> Config {
    Config {
        fuse_base_path: base.to_string(),
        fuse_client_id: "client-id".to_string(),
        fuse_api_key: API_KEY.to_string(),
        plaid_client_id: None,
        plaid_secret: None,
        teller_application_id: None,
        teller_certificate: None,
        teller_private_key: None,
        teller_signing_secret: None,
        mx_client_id: None,
        mx_api_key: None,
        server_port: 0,
        link_client_name: "Fuse Example".to_string(),
        backoff_attempts: 3,
        backoff_start_delay_ms: 1,
        backoff_max_delay_ms: 5,
        upstream_timeout_secs: 5,
        exchange_deadline_secs: 5,
    }
}

fn app(server: &MockServer) -> Router {
    build_router(AppState::from_config(&test_config(&server.uri())).unwrap())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn webhook(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("fuse-verification", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn hmac_base64(message: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(API_KEY.as_bytes()).unwrap();
    mac.update(message.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Background calls land after the handler returns; poll until they arrive.
async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<wiremock::Request> {
    for _ in 0..100 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.received_requests().await.unwrap_or_default()
}

#[tokio::test]
async fn health_returns_ok() {
    let server = MockServer::start().await;
    let (status, body) = send(app(&server), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn session_secret_feeds_link_token_creation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/session"))
        .and(header("fuse-api-key", API_KEY))
        .and(body_partial_json(json!({
            "entity": {"id": "u1"},
            "is_web_view": false,
            "supported_financial_institution_aggregators": ["plaid", "mx", "teller"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_secret": "session-secret-1",
            "expiration": "2030-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/link/token"))
        .and(body_partial_json(json!({
            "entity": {"id": "u1"},
            "institution_id": "inst_1",
            "session_client_secret": "session-secret-1",
            "client_name": "Fuse Example"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "link_token": "link-token-1",
            "request_id": "req_1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, session) = send(
        app(&server),
        post_json("/create-session", json!({"user_id": "u1", "is_web_view": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let secret = session["client_secret"].as_str().unwrap();
    assert!(!secret.is_empty());
    assert_eq!(session["expiration"], "2030-01-01T00:00:00Z");

    let (status, link) = send(
        app(&server),
        post_json(
            "/create-link-token",
            json!({"user_id": "u1", "institution_id": "inst_1", "client_secret": secret}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!link["link_token"].as_str().unwrap().is_empty());
    assert_eq!(link["request_id"], "req_1");
}

#[tokio::test]
async fn blank_user_id_is_rejected_before_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (status, body) = send(
        app(&server),
        post_json("/create-session", json!({"user_id": ""})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn exchange_returns_credentials_after_prefetch() {
    let server = MockServer::start().await;
    let routes = [
        (
            "/v1/financial_connections/public_token/exchange",
            json!({"access_token": "access-1", "financial_connection_id": "fc_1"}),
        ),
        (
            "/v1/financial_connections/accounts",
            json!({"accounts": [{"remote_id": "acc_1"}], "financial_connection": {"id": "fc_1"}}),
        ),
        (
            "/v1/financial_connections/accounts/details",
            json!({"account_details": [{"remote_id": "acc_1"}], "financial_connection": {"id": "fc_1"}}),
        ),
        ("/v1/financial_connections/balances", json!({"balances": []})),
        (
            "/v1/financial_connections/owners",
            json!({"accounts": [{"remote_id": "acc_1", "owners": [{"name": "Jane"}]}]}),
        ),
        (
            "/v1/financial_connections/transactions",
            json!({"transactions": [], "total_transactions": 0}),
        ),
    ];
    for (route, body) in &routes {
        Mock::given(method("POST"))
            .and(path(*route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let (status, body) = send(
        app(&server),
        post_json("/exchange-public-token", json!({"public_token": "public-1"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["access_token"], "access-1");
    assert_eq!(body["financial_connection_id"], "fc_1");

    let order: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect();
    assert_eq!(
        order,
        routes.iter().map(|(route, _)| route.to_string()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn aggregator_client_errors_pass_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/financial_connections/accounts"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "invalid_access_token",
            "message": "The access token is invalid"
        })))
        .mount(&server)
        .await;

    let (status, body) = send(app(&server), get("/accounts?access_token=bad")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "invalid_access_token");
}

#[tokio::test]
async fn missing_access_token_query_is_rejected() {
    let server = MockServer::start().await;
    let (status, body) = send(app(&server), get("/owners")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("access_token"));
}

#[tokio::test]
async fn malformed_bodies_use_the_json_error_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // Missing field
    let (status, body) = send(
        app(&server),
        post_json("/create-link-token", json!({"user_id": "u1", "institution_id": "inst_1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("client_secret"));

    // Not JSON at all
    let request = Request::builder()
        .method("POST")
        .uri("/exchange-public-token")
        .header("content-type", "application/json")
        .body(Body::from("{public_token"))
        .unwrap();
    let (status, body) = send(app(&server), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");

    // No content type
    let request = Request::builder()
        .method("POST")
        .uri("/create-session")
        .body(Body::from(r#"{"user_id":"u1"}"#))
        .unwrap();
    let (status, body) = send(app(&server), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn balances_forward_remote_account_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/financial_connections/balances"))
        .and(body_partial_json(json!({
            "access_token": "tok",
            "options": {"remote_account_ids": ["acc_1", "acc_2"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "balances": [{"remote_account_id": "acc_1"}, {"remote_account_id": "acc_2"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = send(
        app(&server),
        get("/balances?access_token=tok&remote_account_ids=acc_1,acc_2"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balances"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn balances_recover_from_a_first_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/financial_connections/balances"))
        .respond_with(ResponseTemplate::new(504))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/financial_connections/balances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"balances": []})))
        .mount(&server)
        .await;

    let (status, _) = send(app(&server), get("/balances?access_token=tok")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn transactions_paginate_until_empty() {
    let server = MockServer::start().await;
    let page_one: Vec<Value> = (0..100).map(|i| json!({"remote_id": format!("tx_{i}")})).collect();
    Mock::given(method("POST"))
        .and(path("/v1/financial_connections/transactions"))
        .and(body_partial_json(json!({"page": 1, "records_per_page": 100})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactions": page_one,
            "total_transactions": 100
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/financial_connections/transactions"))
        .and(body_partial_json(json!({"page": 2, "records_per_page": 100})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "transactions": [],
            "total_transactions": 100
        })))
        .mount(&server)
        .await;

    let mut collected = 0;
    let mut page = 1;
    loop {
        let (status, body) = send(
            app(&server),
            get(&format!("/transactions?access_token=tok&page={page}&records_per_page=100")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let transactions = body["transactions"].as_array().unwrap();
        assert!(transactions.len() <= 100);
        if transactions.is_empty() {
            break;
        }
        collected += transactions.len();
        page += 1;
    }

    assert_eq!(collected, 100);
    assert_eq!(page, 2);
}

#[tokio::test]
async fn webhook_without_header_is_forbidden_and_not_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let event = r#"{"type":"financial_connection.sync_data"}"#;
    let (status, _) = send(app(&server), webhook(event, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The header check comes first, so even a broken body gets 403
    let (status, _) = send(app(&server), webhook("{not json", None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(app(&server), webhook(event, Some(""))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn webhook_with_bad_signature_is_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let event = r#"{"type":"financial_connection.sync_data","financial_connection_id":"fc_1"}"#;
    let signature = hmac_base64(r#"{"financial_connection_id":"fc_2","type":"financial_connection.sync_data"}"#);

    let (status, _) = send(app(&server), webhook(event, Some(&signature))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn webhook_with_malformed_body_is_bad_request() {
    let server = MockServer::start().await;
    let (status, _) = send(app(&server), webhook("{not json", Some("c2ln"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn verified_sync_webhook_is_forwarded_with_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/financial_connections/sync"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    // Sent with unsorted keys; signed over the sorted form
    let event = r#"{"type":"financial_connection.sync_data","financial_connection_id":"fc_1","environment":"sandbox"}"#;
    let signature = hmac_base64(
        r#"{"environment":"sandbox","financial_connection_id":"fc_1","type":"financial_connection.sync_data"}"#,
    );

    let (status, body) = send(app(&server), webhook(event, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let received = wait_for_requests(&server, 1).await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].headers["fuse-verification"], signature.as_str());
    assert_eq!(
        serde_json::from_slice::<Value>(&received[0].body).unwrap(),
        serde_json::from_str::<Value>(event).unwrap()
    );
}

#[tokio::test]
async fn webhook_with_long_floats_verifies_against_javascript_signature() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/financial_connections/sync"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    // Signature produced by JSON.stringify with sorted keys and HMAC-SHA256 under API_KEY
    let event = r#"{"type":"financial_connection.sync_data","financial_connection_id":"fc_1","balance":{"current":1234.5600000000002,"available":0.1},"rates":[0.013000000000000001,0.010333333333333333]}"#;
    let signature = hmac_base64(
        r#"{"balance":{"available":0.1,"current":1234.5600000000002},"financial_connection_id":"fc_1","rates":[0.013000000000000001,0.010333333333333333],"type":"financial_connection.sync_data"}"#,
    );

    let (status, _) = send(app(&server), webhook(event, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(wait_for_requests(&server, 1).await.len(), 1);
}

#[tokio::test]
async fn webhook_success_does_not_wait_for_sync_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/financial_connections/sync"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_secs(2)))
        .expect(1)
        .mount(&server)
        .await;

    let event = r#"{"type":"financial_connection.sync_data"}"#;
    let signature = hmac_base64(event);

    let started = Instant::now();
    let (status, _) = send(app(&server), webhook(event, Some(&signature))).await;

    // 200 is reported even though the sync call is slow and ultimately fails
    assert_eq!(status, StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(wait_for_requests(&server, 1).await.len(), 1);
}

#[tokio::test]
async fn other_webhook_types_are_acknowledged_without_forwarding() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    // (body as sent, canonical text it is signed over)
    let events = [
        (
            r#"{"type":"financial_connection.disconnected","financial_connection_id":"fc_1"}"#,
            r#"{"financial_connection_id":"fc_1","type":"financial_connection.disconnected"}"#,
        ),
        (
            r#"{"type":"transactions.updated"}"#,
            r#"{"type":"transactions.updated"}"#,
        ),
        (r#"{"amounts":[1.0,2.5]}"#, r#"{"amounts":[1,2.5]}"#),
    ];
    for (event, canonical) in events {
        let (status, _) = send(app(&server), webhook(event, Some(&hmac_base64(canonical)))).await;
        assert_eq!(status, StatusCode::OK, "event {event}");
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
}
