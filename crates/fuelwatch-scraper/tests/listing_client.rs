//! Integration tests for `ListingClient` and `NominatimClient`.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no
//! real network traffic is made.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fuelwatch_scraper::{ListingClient, NominatimClient, ScraperError};

const LISTING_HTML: &str = r#"<html><body>
<table class="table"><tr><th>#</th><th>Asema</th><th>Hinta</th><th>Päivitetty</th></tr>
<tr><td>1</td><td>Neste Oulu</td><td>1,799</td><td>2 tuntia sitten</td></tr>
</table>
<table class="table"><tr><th>#</th><th>Asema</th><th>Hinta</th><th>Päivitetty</th></tr>
<tr><td>1</td><td>ABC Kaakkuri</td><td>1,889</td><td>juuri nyt</td></tr>
</table>
<table class="table"><tr><th>#</th><th>Asema</th><th>Hinta</th><th>Päivitetty</th></tr>
<tr><td>1</td><td>St1 Limingantulli</td><td>1,619</td><td>5 minuuttia sitten</td></tr>
<tr><td>2</td><td>Teboil Rusko</td><td>1,639</td><td>1 tunti sitten</td></tr>
</table>
</body></html>"#;

fn listing_client(server: &MockServer, max_retries: u32) -> ListingClient {
    ListingClient::new(
        &format!("{}/oulu/", server.uri()),
        5,
        "fuelwatch-test/0.1",
        max_retries,
        0,
    )
    .expect("failed to build test ListingClient")
}

fn geocoder(server: &MockServer) -> NominatimClient {
    NominatimClient::new(&server.uri(), 5, "fuelwatch-test/0.1", 0, 0)
        .expect("failed to build test NominatimClient")
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_prices_parses_every_grade_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oulu/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_HTML))
        .expect(1)
        .mount(&server)
        .await;

    let records = listing_client(&server, 0).fetch_prices().await.unwrap();

    assert_eq!(records.len(), 4);
    let grades: Vec<&str> = records.iter().map(|r| r.grade.as_str()).collect();
    assert_eq!(grades, vec!["95 E10", "98 E5", "Diesel", "Diesel"]);
    assert_eq!(records[2].station, "St1 Limingantulli");
    assert_eq!(records[2].price.to_string(), "1.619");
    assert_eq!(records[2].freshness_label, "5 minutes ago");
}

#[tokio::test]
async fn fetch_prices_returns_empty_for_page_without_tables() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oulu/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let records = listing_client(&server, 0).fetch_prices().await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oulu/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = listing_client(&server, 3).fetch_prices().await;
    assert!(
        matches!(result, Err(ScraperError::NotFound { .. })),
        "expected NotFound, got: {result:?}"
    );
}

#[tokio::test]
async fn server_error_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oulu/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oulu/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING_HTML))
        .expect(1)
        .mount(&server)
        .await;

    let records = listing_client(&server, 3).fetch_prices().await.unwrap();
    assert_eq!(records.len(), 4);
}

#[tokio::test]
async fn rate_limit_surfaces_after_retries_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oulu/"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .expect(2)
        .mount(&server)
        .await;

    let result = listing_client(&server, 1).fetch_prices().await;
    match result {
        Err(ScraperError::RateLimited {
            retry_after_secs, ..
        }) => assert_eq!(retry_after_secs, 7),
        other => panic!("expected RateLimited, got: {other:?}"),
    }
}

#[tokio::test]
async fn forbidden_is_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oulu/"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let result = listing_client(&server, 3).fetch_prices().await;
    assert!(matches!(
        result,
        Err(ScraperError::UnexpectedStatus { status: 403, .. })
    ));
}

// ---------------------------------------------------------------------------
// Geocoding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_returns_first_hit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Kauppurienkatu 1, Oulu"))
        .and(query_param("format", "json"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"lat": "65.0124", "lon": "25.4682", "display_name": "Kauppurienkatu 1, Oulu, Finland"}
        ])))
        .mount(&server)
        .await;

    let place = geocoder(&server)
        .resolve("Kauppurienkatu 1, Oulu")
        .await
        .unwrap()
        .expect("a match");
    assert!((place.coordinates.latitude - 65.0124).abs() < 1e-9);
    assert!((place.coordinates.longitude - 25.4682).abs() < 1e-9);
    assert_eq!(
        place.display_name.as_deref(),
        Some("Kauppurienkatu 1, Oulu, Finland")
    );
}

#[tokio::test]
async fn resolve_returns_none_without_hits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(geocoder(&server).resolve("nowhere").await.unwrap().is_none());
}

#[tokio::test]
async fn resolve_rejects_out_of_range_coordinates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"lat": "123.0", "lon": "0"}])),
        )
        .mount(&server)
        .await;

    assert!(geocoder(&server).resolve("bogus").await.unwrap().is_none());
}

#[tokio::test]
async fn resolve_reports_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = geocoder(&server).resolve("x").await;
    assert!(matches!(result, Err(ScraperError::Deserialize { .. })));
}
