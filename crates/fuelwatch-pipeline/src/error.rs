use fuelwatch_core::CoreError;
use fuelwatch_db::DbError;
use fuelwatch_scraper::ScraperError;
use serde::Serialize;
use thiserror::Error;

/// The price source could not produce a usable batch.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Scraper(#[from] ScraperError),
    #[error("price source returned no records")]
    Empty,
    #[error("price acquisition timed out after {secs}s")]
    TimedOut { secs: u64 },
    #[error("price source failed: {0}")]
    Other(String),
}

/// One recipient's message could not be handed to the transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid mail address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("could not build message: {0}")]
    Build(String),
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("delivery timed out after {secs}s")]
    TimedOut { secs: u64 },
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("address could not be resolved: {address:?}")]
    NotFound { address: String },
    #[error(transparent)]
    Lookup(#[from] ScraperError),
    #[error("geocoding timed out after {secs}s")]
    TimedOut { secs: u64 },
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("a cycle is already queued")]
    AlreadyQueued,
    #[error("cycle worker has stopped")]
    WorkerStopped,
}

/// Errors from the subscription registry service.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Validation(#[from] CoreError),
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
    #[error("no subscription for {email}")]
    NotFound { email: String },
    #[error(transparent)]
    Storage(DbError),
}

impl From<DbError> for RegistryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Validation(e) => Self::Validation(e),
            other => Self::Storage(other),
        }
    }
}

/// A failure recorded in a [`crate::CycleReport`].
///
/// Only `Acquisition` and `Storage` make a cycle count as failed; the other
/// kinds are isolated to a single record or recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleError {
    Acquisition {
        message: String,
    },
    Validation {
        grade: String,
        station: String,
        message: String,
    },
    Delivery {
        recipient: String,
        message: String,
    },
    Storage {
        message: String,
    },
}

impl CycleError {
    #[must_use]
    pub fn is_cycle_level(&self) -> bool {
        matches!(self, Self::Acquisition { .. } | Self::Storage { .. })
    }
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Acquisition { message } => write!(f, "acquisition: {message}"),
            Self::Validation {
                grade,
                station,
                message,
            } => write!(f, "validation ({grade} at {station}): {message}"),
            Self::Delivery { recipient, message } => write!(f, "delivery to {recipient}: {message}"),
            Self::Storage { message } => write!(f, "storage: {message}"),
        }
    }
}
