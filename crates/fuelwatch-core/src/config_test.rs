use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

/// Returns a map with every required env var populated.
fn full_env<'a>() -> HashMap<&'a str, &'a str> {
    let mut m = HashMap::new();
    m.insert("DATABASE_URL", "sqlite://data/fuel_prices.db");
    m
}

fn expect_invalid(map: &HashMap<&str, &str>, expected_var: &str) {
    let result = build_app_config(lookup_from_map(map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == expected_var),
        "expected InvalidEnvVar({expected_var}), got: {result:?}"
    );
}

#[test]
fn parse_environment_known_values() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
    assert_eq!(parse_environment("test").unwrap(), Environment::Test);
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "FUELWATCH_ENV"));
}

#[test]
fn build_app_config_fails_without_database_url() {
    let map: HashMap<&str, &str> = HashMap::new();
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "DATABASE_URL"),
        "expected MissingEnvVar(DATABASE_URL), got: {result:?}"
    );
}

#[test]
fn build_app_config_treats_blank_database_url_as_missing() {
    let mut map = HashMap::new();
    map.insert("DATABASE_URL", "   ");
    let result = build_app_config(lookup_from_map(&map));
    assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
}

#[test]
fn build_app_config_applies_defaults() {
    let map = full_env();
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();

    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.database_url, "sqlite://data/fuel_prices.db");
    assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:5001");
    assert_eq!(cfg.log_level, "info");
    assert!(cfg.api_keys.is_empty());
    assert_eq!(cfg.db_max_connections, 4);
    assert_eq!(cfg.db_min_connections, 1);
    assert_eq!(cfg.db_acquire_timeout_secs, 10);
    assert_eq!(cfg.source_url, "https://www.tankille.fi/oulu/");
    assert_eq!(cfg.scraper_request_timeout_secs, 30);
    assert_eq!(cfg.scraper_user_agent, "fuelwatch/0.1 (price-alerts)");
    assert_eq!(cfg.scraper_max_retries, 3);
    assert_eq!(cfg.scraper_retry_backoff_base_ms, 1000);
    assert_eq!(cfg.cycle.schedule, "0 0 * * * *");
    assert!(cfg.cycle.run_on_startup);
    assert_eq!(cfg.cycle.top_k, 10);
    assert!((cfg.cycle.average_speed_kmh - 50.0).abs() < f64::EPSILON);
    assert_eq!(cfg.cycle.acquisition_timeout_secs, 120);
    assert_eq!(cfg.cycle.delivery_timeout_secs, 30);
    assert_eq!(cfg.cycle.max_concurrent_deliveries, 4);
    assert_eq!(cfg.geocoder.base_url, "https://nominatim.openstreetmap.org");
    assert_eq!(cfg.geocoder.timeout_secs, 10);
    assert!(cfg.smtp.is_none());
}

#[test]
fn build_app_config_reads_overrides() {
    let mut map = full_env();
    map.insert("FUELWATCH_ENV", "production");
    map.insert("FUELWATCH_BIND_ADDR", "127.0.0.1:8080");
    map.insert("FUELWATCH_TOP_K", "5");
    map.insert("FUELWATCH_AVERAGE_SPEED_KMH", "80.5");
    map.insert("FUELWATCH_CYCLE_ON_STARTUP", "off");
    map.insert("FUELWATCH_CYCLE_SCHEDULE", "0 */15 * * * *");

    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.env, Environment::Production);
    assert_eq!(cfg.bind_addr.port(), 8080);
    assert_eq!(cfg.cycle.top_k, 5);
    assert!((cfg.cycle.average_speed_kmh - 80.5).abs() < f64::EPSILON);
    assert!(!cfg.cycle.run_on_startup);
    assert_eq!(cfg.cycle.schedule, "0 */15 * * * *");
}

#[test]
fn build_app_config_splits_api_keys() {
    let mut map = full_env();
    map.insert("FUELWATCH_API_KEYS", " alpha , ,beta");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.api_keys, vec!["alpha".to_string(), "beta".to_string()]);
}

#[test]
fn build_app_config_fails_with_invalid_bind_addr() {
    let mut map = full_env();
    map.insert("FUELWATCH_BIND_ADDR", "not-a-socket-addr");
    expect_invalid(&map, "FUELWATCH_BIND_ADDR");
}

#[test]
fn build_app_config_rejects_zero_top_k() {
    let mut map = full_env();
    map.insert("FUELWATCH_TOP_K", "0");
    expect_invalid(&map, "FUELWATCH_TOP_K");
}

#[test]
fn build_app_config_rejects_non_positive_speed() {
    let mut map = full_env();
    map.insert("FUELWATCH_AVERAGE_SPEED_KMH", "-3");
    expect_invalid(&map, "FUELWATCH_AVERAGE_SPEED_KMH");
}

#[test]
fn build_app_config_rejects_garbage_bool() {
    let mut map = full_env();
    map.insert("FUELWATCH_CYCLE_ON_STARTUP", "maybe");
    expect_invalid(&map, "FUELWATCH_CYCLE_ON_STARTUP");
}

#[test]
fn build_app_config_rejects_non_numeric_retries() {
    let mut map = full_env();
    map.insert("FUELWATCH_SCRAPER_MAX_RETRIES", "three");
    expect_invalid(&map, "FUELWATCH_SCRAPER_MAX_RETRIES");
}

#[test]
fn smtp_requires_credentials_once_server_is_set() {
    let mut map = full_env();
    map.insert("SMTP_SERVER", "smtp.example.com");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "SMTP_USERNAME"),
        "expected MissingEnvVar(SMTP_USERNAME), got: {result:?}"
    );
}

#[test]
fn smtp_sender_falls_back_to_username() {
    let mut map = full_env();
    map.insert("SMTP_SERVER", "smtp.example.com");
    map.insert("SMTP_USERNAME", "alerts@example.com");
    map.insert("SMTP_PASSWORD", "hunter2");

    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let smtp = cfg.smtp.expect("smtp configured");
    assert_eq!(smtp.port, 465);
    assert_eq!(smtp.from_address, "alerts@example.com");
}

#[test]
fn debug_output_redacts_secrets() {
    let mut map = full_env();
    map.insert("FUELWATCH_API_KEYS", "topsecret");
    map.insert("SMTP_SERVER", "smtp.example.com");
    map.insert("SMTP_USERNAME", "alerts@example.com");
    map.insert("SMTP_PASSWORD", "hunter2");

    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    let rendered = format!("{cfg:?}");
    assert!(!rendered.contains("topsecret"));
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("fuel_prices.db"));
}
