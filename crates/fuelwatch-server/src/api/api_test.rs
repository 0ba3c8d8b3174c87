use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use fuelwatch_core::{Coordinates, CycleSettings, RawPriceRecord};
use fuelwatch_pipeline::{
    spawn_cycle_worker, AcquisitionError, CycleRunner, DeliveryError, GeocodeError, Geocoder,
    Notifier, PriceSource,
};
use rust_decimal::Decimal;
use tower::ServiceExt;

use super::*;

struct StaticSource;

#[async_trait]
impl PriceSource for StaticSource {
    async fn fetch_raw_prices(&self) -> Result<Vec<RawPriceRecord>, AcquisitionError> {
        Ok(["A:1.50", "B:1.40"]
            .iter()
            .filter_map(|s| s.split_once(':'))
            .map(|(station, price)| RawPriceRecord {
                grade: "Diesel".to_owned(),
                station: station.to_owned(),
                price: Decimal::from_str(price).expect("decimal"),
                freshness_label: "just now".to_owned(),
            })
            .collect())
    }
}

struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Knows exactly one address.
struct OneAddressGeocoder;

#[async_trait]
impl Geocoder for OneAddressGeocoder {
    async fn resolve_address(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok((address == "Oulu").then(|| Coordinates::new(65.0121, 25.4651).expect("valid")))
    }
}

fn settings() -> CycleSettings {
    CycleSettings {
        schedule: "0 0 * * * *".to_owned(),
        run_on_startup: false,
        top_k: 10,
        average_speed_kmh: 50.0,
        acquisition_timeout_secs: 5,
        delivery_timeout_secs: 5,
        max_concurrent_deliveries: 2,
    }
}

async fn test_state() -> AppState {
    let store = Store::connect_in_memory().await.expect("in-memory store");
    let runner = CycleRunner::new(
        store.clone(),
        Arc::new(StaticSource),
        Arc::new(NullNotifier),
        settings(),
    );
    let (cycles, _task) = spawn_cycle_worker(runner);
    AppState {
        registry: SubscriptionService::new(
            store.clone(),
            Arc::new(OneAddressGeocoder),
            Duration::from_secs(1),
        ),
        query: PriceQuery::new(store.clone(), 50.0),
        store,
        cycles,
        top_k: 10,
    }
}

async fn app() -> Router {
    build_app(test_state().await, AuthState::disabled(), default_rate_limit_state())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

#[test]
fn normalize_limit_applies_defaults_and_bounds() {
    assert_eq!(normalize_limit(None, 10, 50), 10);
    assert_eq!(normalize_limit(Some(0), 10, 50), 1);
    assert_eq!(normalize_limit(Some(1_000), 10, 50), 50);
    assert_eq!(normalize_limit(Some(25), 10, 50), 25);
}

#[test]
fn api_error_codes_map_to_statuses() {
    for (code, status) in [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("not_found", StatusCode::NOT_FOUND),
        ("conflict", StatusCode::CONFLICT),
        ("rate_limited", StatusCode::TOO_MANY_REQUESTS),
        ("unauthorized", StatusCode::UNAUTHORIZED),
        ("upstream_error", StatusCode::BAD_GATEWAY),
        ("unavailable", StatusCode::SERVICE_UNAVAILABLE),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ] {
        let response = ApiError::new("req-1", code, "x").into_response();
        assert_eq!(response.status(), status, "code {code}");
    }
}

#[tokio::test]
async fn health_reports_ok_with_envelope() {
    let app = app().await;
    let request = Request::builder()
        .uri("/api/v1/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("bytes");
    let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["meta"]["request_id"], "req-42");
}

#[tokio::test]
async fn protected_routes_require_a_valid_bearer_token() {
    let auth = AuthState::new(&["secret".to_owned()], false).expect("auth");
    let app = build_app(test_state().await, auth, default_rate_limit_state());

    let (status, json) = send(&app, "GET", "/api/v1/stations", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["code"], "unauthorized");

    let request = Request::builder()
        .uri("/api/v1/stations")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    // health stays public
    let (status, _) = send(&app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_rejects_requests_over_the_window() {
    let app = build_app(
        test_state().await,
        AuthState::disabled(),
        RateLimitState::new(1, Duration::from_secs(60)),
    );

    let (first, _) = send(&app, "GET", "/api/v1/stations", None).await;
    let (second, json) = send(&app, "GET", "/api/v1/stations", None).await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
}

#[tokio::test]
async fn subscription_lifecycle() {
    let app = app().await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/subscriptions",
        Some(serde_json::json!({
            "email": "U@X.com",
            "threshold": "1.45",
            "grade": "diesel",
            "address": "Oulu"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["subscription"]["email"], "u@x.com");
    assert_eq!(json["data"]["subscription"]["grade"], "Diesel");
    assert_eq!(json["data"]["location_resolved"], true);

    let (status, json) = send(&app, "GET", "/api/v1/subscriptions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().map(Vec::len), Some(1));

    let (status, _) = send(&app, "DELETE", "/api/v1/subscriptions/u@x.com", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = send(&app, "DELETE", "/api/v1/subscriptions/u@x.com", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "not_found");
}

#[tokio::test]
async fn subscription_validation_errors_are_bad_requests() {
    let app = app().await;

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/subscriptions",
        Some(serde_json::json!({ "email": "u@x.com", "threshold": "1.45", "grade": "lpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let (status, json) = send(
        &app,
        "POST",
        "/api/v1/subscriptions",
        Some(serde_json::json!({ "threshold": "1.45", "grade": "diesel" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "email: is required");
}

#[tokio::test]
async fn set_location_distinguishes_unknown_email_and_address() {
    let app = app().await;
    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/subscriptions/ghost@x.com/location",
        Some(serde_json::json!({ "address": "Oulu" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(
        &app,
        "POST",
        "/api/v1/subscriptions",
        Some(serde_json::json!({ "email": "u@x.com", "threshold": "1.45", "grade": "95" })),
    )
    .await;
    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/subscriptions/u@x.com/location",
        Some(serde_json::json!({ "address": "Atlantis" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        "PUT",
        "/api/v1/subscriptions/u@x.com/location",
        Some(serde_json::json!({ "address": "Oulu" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["location"]["address"], "Oulu");
}

#[tokio::test]
async fn stations_upsert_and_list() {
    let app = app().await;

    let (status, json) = send(
        &app,
        "PUT",
        "/api/v1/stations/Kempele",
        Some(serde_json::json!({ "latitude": 64.9126, "longitude": 25.5085 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "Kempele");

    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/stations/Kempele",
        Some(serde_json::json!({ "latitude": 64.9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = send(&app, "GET", "/api/v1/stations", None).await;
    assert_eq!(json["data"][0]["name"], "Kempele");
}

#[tokio::test]
async fn manual_cycle_populates_prices_and_history() {
    let app = app().await;

    let (status, json) = send(&app, "GET", "/api/v1/prices/diesel", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["prices"].as_array().map(Vec::len), Some(0));

    let (status, json) = send(&app, "POST", "/api/v1/cycles", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["trigger"], "manual");
    assert_eq!(json["data"]["ingested"], 2);

    let (_, json) = send(&app, "GET", "/api/v1/prices/diesel?limit=1", None).await;
    let prices = json["data"]["prices"].as_array().expect("prices");
    assert_eq!(prices.len(), 1);
    assert_eq!(prices[0]["station"], "B");
    assert!(prices[0]["distance_km"].is_null());

    let (_, json) = send(&app, "GET", "/api/v1/prices", None).await;
    assert_eq!(json["data"].as_array().map(Vec::len), Some(3));

    let (_, json) = send(&app, "GET", "/api/v1/cycles", None).await;
    assert_eq!(json["data"][0]["status"], "succeeded");
    assert_eq!(json["data"][0]["trigger_source"], "manual");

    let (_, json) = send(&app, "GET", "/api/v1/cycles/status", None).await;
    assert_eq!(json["data"]["state"], "idle");
    assert_eq!(json["data"]["cycles_completed"], 1);
}

#[tokio::test]
async fn unknown_grade_in_path_is_rejected() {
    let app = app().await;
    let (status, json) = send(&app, "GET", "/api/v1/prices/kerosene", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[tokio::test]
async fn manual_cycle_after_worker_stopped_is_unavailable() {
    let state = test_state().await;
    state.cycles.shutdown();
    let app = build_app(state, AuthState::disabled(), default_rate_limit_state());

    let (status, json) = send(&app, "POST", "/api/v1/cycles", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "unavailable");
}
