//! Seams to the outside world, plus their production adapters.

use async_trait::async_trait;
use fuelwatch_core::{Coordinates, RawPriceRecord};
use fuelwatch_scraper::{ListingClient, NominatimClient};

use crate::error::{AcquisitionError, DeliveryError, GeocodeError};

/// Yields the current raw price rows from the listing source.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_raw_prices(&self) -> Result<Vec<RawPriceRecord>, AcquisitionError>;
}

/// Hands one composed message to a transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Resolves a free-text address to coordinates; `Ok(None)` when nothing matches.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve_address(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

#[async_trait]
impl PriceSource for ListingClient {
    async fn fetch_raw_prices(&self) -> Result<Vec<RawPriceRecord>, AcquisitionError> {
        Ok(self.fetch_prices().await?)
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn resolve_address(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(self.resolve(address).await?.map(|place| place.coordinates))
    }
}
