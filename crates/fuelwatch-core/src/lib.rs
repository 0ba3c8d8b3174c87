pub mod alerts;
pub mod app_config;
pub mod config;
pub mod distance;
pub mod grade;
pub mod prices;
pub mod stations;
pub mod subscriptions;

pub use alerts::{
    aggregate_alerts, compose_body, match_subscriptions, AlertCandidate, ComposedMessage,
    ALERT_SUBJECT,
};
pub use app_config::{AppConfig, CycleSettings, Environment, GeocoderSettings, SmtpSettings};
pub use config::{load_app_config, load_app_config_from_env};
pub use distance::{enrich, great_circle_km, GreatCircle, RankedPrice, TravelEstimate, TravelModel};
pub use grade::FuelGrade;
pub use prices::{top_cheapest, PriceRecord, RawPriceRecord, DEFAULT_TOP_K};
pub use stations::{Coordinates, Station};
pub use subscriptions::{normalize_email, NewSubscription, SubscriberLocation, Subscription};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unrecognized fuel grade: {0:?}")]
    UnknownGrade(String),
    #[error("{field}: {reason}")]
    Validation { field: &'static str, reason: String },
}

impl CoreError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
