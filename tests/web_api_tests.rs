//! Integration tests for the web API.
//!
//! These tests drive the axum router directly with `oneshot` requests.

#![cfg(feature = "web")]

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use alpaca_rotator::services::{build_router, AlpacaContext};
use alpaca_rotator::{Config, DeviceConfig, ServerConfig};

fn create_test_app(config: Config) -> (axum::Router, Arc<AlpacaContext>) {
    let ctx = Arc::new(AlpacaContext::new(config));
    let router = build_router(Arc::clone(&ctx), &ctx.config.network);
    (router, ctx)
}

fn fast_config() -> Config {
    Config::default().with_device(DeviceConfig::default().with_steps_per_sec(1000))
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn put(app: &axum::Router, uri: &str, form: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method("PUT")
        .uri(uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get_json(app: &axum::Router, uri: &str) -> Value {
    let (status, body) = get(app, uri).await;
    assert_eq!(status, StatusCode::OK, "GET {uri}");
    serde_json::from_slice(&body).unwrap()
}

async fn put_json(app: &axum::Router, uri: &str, form: &str) -> Value {
    let (status, body) = put(app, uri, form).await;
    assert_eq!(status, StatusCode::OK, "PUT {uri}");
    serde_json::from_slice(&body).unwrap()
}

async fn wait_until_stopped(app: &axum::Router) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let body = get_json(app, "/api/v1/rotator/0/ismoving").await;
        if body["Value"] == false {
            return;
        }
        assert!(Instant::now() < deadline, "rotator never stopped");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_get_name() {
    let (app, _ctx) = create_test_app(Config::default());

    let body = get_json(&app, "/api/v1/rotator/0/name?ClientID=1&ClientTransactionID=7").await;

    assert_eq!(body["Value"], "Sample Rotator");
    assert_eq!(body["ErrorNumber"], 0);
    assert_eq!(body["ErrorMessage"], "");
    assert_eq!(body["ClientTransactionID"], 7);
    assert_eq!(body["ServerTransactionID"], 1);
}

#[tokio::test]
async fn test_unknown_device_number_is_bad_request() {
    let (app, ctx) = create_test_app(Config::default());

    let (status, body) = get(&app, "/api/v1/rotator/5/position").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "Device number 5 does not exist. Maximum device number is 0."
    );
    assert_eq!(ctx.sequencer.current(), 0);
}

#[tokio::test]
async fn test_bad_client_transaction_id_is_bad_request() {
    let (app, _ctx) = create_test_app(Config::default());

    let (status, body) = get(&app, "/api/v1/rotator/0/name?ClientTransactionID=-4").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body).unwrap().contains("ClientTransactionID"));
}

#[tokio::test]
async fn test_oversized_client_transaction_id_is_bad_request() {
    let (app, _ctx) = create_test_app(Config::default());

    let (status, _) = get(&app, "/api/v1/rotator/0/name?ClientTransactionID=4294967296").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = get_json(&app, "/api/v1/rotator/0/name?ClientTransactionID=4294967295").await;
    assert_eq!(body["ClientTransactionID"], 4294967295u32);
}

#[tokio::test]
async fn test_position_requires_connection() {
    let (app, _ctx) = create_test_app(Config::default());

    let body = get_json(&app, "/api/v1/rotator/0/position").await;

    assert_eq!(body["ErrorNumber"], 0x407);
    assert!(body.get("Value").is_none());
}

#[tokio::test]
async fn test_move_with_bad_position_is_invalid_value() {
    let (app, _ctx) = create_test_app(Config::default());
    put_json(&app, "/api/v1/rotator/0/connect", "").await;

    let body = put_json(&app, "/api/v1/rotator/0/move", "Position=abc&ClientTransactionID=3").await;

    assert_eq!(body["ErrorNumber"], 0x401);
    assert_eq!(body["ClientTransactionID"], 3);
    assert!(body.get("Value").is_none());
}

#[tokio::test]
async fn test_missing_parameter_is_bad_request() {
    let (app, _ctx) = create_test_app(Config::default());
    put_json(&app, "/api/v1/rotator/0/connect", "").await;

    let (status, body) = put(&app, "/api/v1/rotator/0/moveabsolute", "position=10").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "Missing, empty, or misspelled parameter \"Position\""
    );
}

#[tokio::test]
async fn test_bad_boolean_is_bad_request() {
    let (app, _ctx) = create_test_app(Config::default());

    let (status, _) = put(&app, "/api/v1/rotator/0/connected", "Connected=yes").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_connect_move_absolute_and_settle() {
    let (app, _ctx) = create_test_app(fast_config());

    let body = put_json(&app, "/api/v1/rotator/0/connected", "Connected=True").await;
    assert_eq!(body["ErrorNumber"], 0);
    assert_eq!(get_json(&app, "/api/v1/rotator/0/connected").await["Value"], true);

    let body = put_json(&app, "/api/v1/rotator/0/moveabsolute", "Position=90").await;
    assert_eq!(body["ErrorNumber"], 0);
    assert_eq!(get_json(&app, "/api/v1/rotator/0/targetposition").await["Value"], 90.0);

    wait_until_stopped(&app).await;

    let position = get_json(&app, "/api/v1/rotator/0/position").await["Value"]
        .as_f64()
        .unwrap();
    assert!((position - 90.0).abs() <= 1.0, "position {position}");
}

#[tokio::test]
async fn test_relative_move_wraps() {
    let (app, _ctx) = create_test_app(fast_config());
    put_json(&app, "/api/v1/rotator/0/connect", "").await;

    put_json(&app, "/api/v1/rotator/0/move", "Position=-20").await;
    wait_until_stopped(&app).await;

    let mech = get_json(&app, "/api/v1/rotator/0/mechanicalposition").await["Value"]
        .as_f64()
        .unwrap();
    assert!((mech - 340.0).abs() <= 1.0, "mechanical {mech}");
}

#[tokio::test]
async fn test_sync_then_read_position() {
    let (app, _ctx) = create_test_app(Config::default());
    put_json(&app, "/api/v1/rotator/0/connect", "").await;

    let body = put_json(&app, "/api/v1/rotator/0/sync", "Position=45").await;
    assert_eq!(body["ErrorNumber"], 0);

    assert_eq!(get_json(&app, "/api/v1/rotator/0/position").await["Value"], 45.0);
    assert_eq!(get_json(&app, "/api/v1/rotator/0/mechanicalposition").await["Value"], 0.0);
}

#[tokio::test]
async fn test_relative_move_after_sync() {
    let (app, _ctx) = create_test_app(fast_config());
    put_json(&app, "/api/v1/rotator/0/connect", "").await;
    put_json(&app, "/api/v1/rotator/0/sync", "Position=45").await;

    let body = put_json(&app, "/api/v1/rotator/0/move", "Position=10").await;
    assert_eq!(body["ErrorNumber"], 0);
    assert_eq!(get_json(&app, "/api/v1/rotator/0/targetposition").await["Value"], 10.0);
    wait_until_stopped(&app).await;

    let mech = get_json(&app, "/api/v1/rotator/0/mechanicalposition").await["Value"]
        .as_f64()
        .unwrap();
    assert!((mech - 325.0).abs() <= 1.0, "mechanical {mech}");
}

#[tokio::test]
async fn test_busy_rotator_rejects_second_move() {
    let config = Config::default().with_device(DeviceConfig::default().with_steps_per_sec(5));
    let (app, _ctx) = create_test_app(config);
    put_json(&app, "/api/v1/rotator/0/connect", "").await;

    put_json(&app, "/api/v1/rotator/0/move", "Position=120").await;
    let body = put_json(&app, "/api/v1/rotator/0/movemechanical", "Position=10").await;
    assert_eq!(body["ErrorNumber"], 0x40B);

    let body = put_json(&app, "/api/v1/rotator/0/halt", "").await;
    assert_eq!(body["ErrorNumber"], 0);
    assert_eq!(get_json(&app, "/api/v1/rotator/0/ismoving").await["Value"], false);
}

#[tokio::test]
async fn test_device_state() {
    let (app, _ctx) = create_test_app(Config::default());
    put_json(&app, "/api/v1/rotator/0/connect", "").await;

    let body = get_json(&app, "/api/v1/rotator/0/devicestate").await;
    let entries = body["Value"].as_array().unwrap();

    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["Name"], "IsMoving");
    assert_eq!(entries[0]["Value"], false);
    assert_eq!(entries[3]["Name"], "TimeStamp");
    assert!(entries[3]["Value"].is_string());
}

#[tokio::test]
async fn test_transaction_ids_increase() {
    let (app, _ctx) = create_test_app(Config::default());

    let mut last = 0;
    for uri in [
        "/api/v1/rotator/0/name",
        "/management/apiversions",
        "/api/v1/rotator/0/position",
        "/api/v1/rotator/0/interfaceversion",
    ] {
        let id = get_json(&app, uri).await["ServerTransactionID"].as_u64().unwrap();
        assert!(id > last, "{uri}: {id} after {last}");
        last = id;
    }
}

#[tokio::test]
async fn test_member_names_are_caseless() {
    let (app, _ctx) = create_test_app(Config::default());

    let body = get_json(&app, "/api/v1/rotator/0/InterfaceVersion").await;
    assert_eq!(body["Value"], 4);
}

#[tokio::test]
async fn test_unknown_member_and_wrong_verb() {
    let (app, _ctx) = create_test_app(Config::default());

    let (status, _) = get(&app, "/api/v1/rotator/0/tilt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = put(&app, "/api/v1/rotator/0/position", "Position=1").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = get(&app, "/api/v1/rotator/0/halt").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = get(&app, "/nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_management_endpoints() {
    let config = Config::default().with_server(ServerConfig::default().with_location("Observatory"));
    let (app, _ctx) = create_test_app(config);

    let body = get_json(&app, "/management/apiversions?ClientTransactionID=9").await;
    assert_eq!(body["Value"], serde_json::json!([1]));
    assert_eq!(body["ClientTransactionID"], 9);

    let body = get_json(&app, "/management/v1/description").await;
    assert_eq!(body["Value"]["Location"], "Observatory");
    assert_eq!(body["Value"]["Manufacturer"], "ASCOM Initiative");

    let body = get_json(&app, "/management/v1/configureddevices").await;
    assert_eq!(body["Value"][0]["DeviceName"], "Sample Rotator");
    assert_eq!(body["Value"][0]["DeviceNumber"], 0);
}

#[tokio::test]
async fn test_setup_pages() {
    let (app, _ctx) = create_test_app(Config::default());

    let (status, body) = get(&app, "/setup").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("Server setup is in config.toml"));

    let (status, body) = get(&app, "/setup/v1/rotator/0/setup").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("Device setup is in config.toml"));
}
