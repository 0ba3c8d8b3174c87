use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Knobs for one ingest → match → notify cycle.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Cron expression (with seconds) for the recurring trigger.
    pub schedule: String,
    pub run_on_startup: bool,
    pub top_k: usize,
    pub average_speed_kmh: f64,
    pub acquisition_timeout_secs: u64,
    pub delivery_timeout_secs: u64,
    pub max_concurrent_deliveries: usize,
}

impl CycleSettings {
    #[must_use]
    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition_timeout_secs)
    }

    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct GeocoderSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub api_keys: Vec<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub source_url: String,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_ms: u64,
    pub cycle: CycleSettings,
    pub geocoder: GeocoderSettings,
    /// `None` when `SMTP_SERVER` is unset; delivery then only logs.
    pub smtp: Option<SmtpSettings>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("source_url", &self.source_url)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_ms",
                &self.scraper_retry_backoff_base_ms,
            )
            .field("cycle", &self.cycle)
            .field("geocoder", &self.geocoder)
            .field("smtp", &self.smtp)
            .finish()
    }
}
