use std::str::FromStr;

use crate::app_config::{AppConfig, CycleSettings, Environment, GeocoderSettings, SmtpSettings};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("FUELWATCH_ENV", "development"))?;
    let bind_addr = parse_or(&lookup, "FUELWATCH_BIND_ADDR", "0.0.0.0:5001")?;
    let log_level = or_default("FUELWATCH_LOG_LEVEL", "info");
    let api_keys = or_default("FUELWATCH_API_KEYS", "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    let db_max_connections = parse_or(&lookup, "FUELWATCH_DB_MAX_CONNECTIONS", "4")?;
    let db_min_connections = parse_or(&lookup, "FUELWATCH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_or(&lookup, "FUELWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let source_url = or_default("FUELWATCH_SOURCE_URL", "https://www.tankille.fi/oulu/");
    let scraper_request_timeout_secs = parse_or(&lookup, "FUELWATCH_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default("FUELWATCH_SCRAPER_USER_AGENT", "fuelwatch/0.1 (price-alerts)");
    let scraper_max_retries = parse_or(&lookup, "FUELWATCH_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_ms = parse_or(&lookup, "FUELWATCH_SCRAPER_RETRY_BACKOFF_BASE_MS", "1000")?;

    let cycle = CycleSettings {
        schedule: or_default("FUELWATCH_CYCLE_SCHEDULE", "0 0 * * * *"),
        run_on_startup: parse_bool(
            "FUELWATCH_CYCLE_ON_STARTUP",
            &or_default("FUELWATCH_CYCLE_ON_STARTUP", "true"),
        )?,
        top_k: parse_or(&lookup, "FUELWATCH_TOP_K", "10")?,
        average_speed_kmh: parse_or(&lookup, "FUELWATCH_AVERAGE_SPEED_KMH", "50")?,
        acquisition_timeout_secs: parse_or(&lookup, "FUELWATCH_ACQUISITION_TIMEOUT_SECS", "120")?,
        delivery_timeout_secs: parse_or(&lookup, "FUELWATCH_DELIVERY_TIMEOUT_SECS", "30")?,
        max_concurrent_deliveries: parse_or(&lookup, "FUELWATCH_MAX_CONCURRENT_DELIVERIES", "4")?,
    };
    if cycle.top_k == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "FUELWATCH_TOP_K".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if !(cycle.average_speed_kmh.is_finite() && cycle.average_speed_kmh > 0.0) {
        return Err(ConfigError::InvalidEnvVar {
            var: "FUELWATCH_AVERAGE_SPEED_KMH".to_string(),
            reason: "must be a positive number".to_string(),
        });
    }

    let geocoder = GeocoderSettings {
        base_url: or_default("FUELWATCH_GEOCODER_URL", "https://nominatim.openstreetmap.org"),
        timeout_secs: parse_or(&lookup, "FUELWATCH_GEOCODE_TIMEOUT_SECS", "10")?,
    };

    let smtp = match lookup("SMTP_SERVER").ok().filter(|v| !v.trim().is_empty()) {
        Some(host) => {
            let username = require("SMTP_USERNAME")?;
            let password = require("SMTP_PASSWORD")?;
            let from_address = lookup("FUELWATCH_MAIL_FROM").unwrap_or_else(|_| username.clone());
            Some(SmtpSettings {
                host,
                port: parse_or(&lookup, "SMTP_PORT", "465")?,
                username,
                password,
                from_address,
            })
        }
        None => None,
    };

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        api_keys,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        source_url,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_max_retries,
        scraper_retry_backoff_base_ms,
        cycle,
        geocoder,
        smtp,
    })
}

/// Parse `var` as `T`, falling back to `default` when it is unset.
fn parse_or<T, F>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FUELWATCH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
