//! Subscription registry operations that involve geocoding.

use std::sync::Arc;
use std::time::Duration;

use fuelwatch_core::{normalize_email, NewSubscription, SubscriberLocation, Subscription};
use fuelwatch_db::{DbError, Store};
use serde::Serialize;

use crate::collaborators::Geocoder;
use crate::error::{GeocodeError, RegistryError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribeOutcome {
    pub subscription: Subscription,
    /// `false` when no address was given or it could not be resolved.
    pub location_resolved: bool,
}

#[derive(Clone)]
pub struct SubscriptionService {
    store: Store,
    geocoder: Arc<dyn Geocoder>,
    geocode_timeout: Duration,
}

impl SubscriptionService {
    #[must_use]
    pub fn new(store: Store, geocoder: Arc<dyn Geocoder>, geocode_timeout: Duration) -> Self {
        Self {
            store,
            geocoder,
            geocode_timeout,
        }
    }

    /// Creates or replaces a subscription, geocoding `address` if given.
    ///
    /// A failed lookup does not block the subscription: it is saved without
    /// a location and `location_resolved` is `false`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Storage`] if the write fails.
    pub async fn subscribe(
        &self,
        new: &NewSubscription,
        address: Option<&str>,
    ) -> Result<SubscribeOutcome, RegistryError> {
        let address = address.map(str::trim).filter(|a| !a.is_empty());
        let location = match address {
            Some(address) => match self.locate(address).await {
                Ok(location) => Some(location),
                Err(e) => {
                    tracing::warn!(email = %new.email, error = %e, "saving subscription without location");
                    None
                }
            },
            None => None,
        };

        let subscription = self.store.subscribe(new, location.as_ref()).await?;
        tracing::info!(email = %subscription.email, grade = %subscription.grade, "subscription saved");
        Ok(SubscribeOutcome {
            location_resolved: subscription.location.is_some(),
            subscription,
        })
    }

    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `email` had no subscription.
    pub async fn unsubscribe(&self, email: &str) -> Result<(), RegistryError> {
        let email = normalize_email(email)?;
        if self.store.unsubscribe(&email).await? {
            tracing::info!(email = %email, "subscription removed");
            Ok(())
        } else {
            Err(RegistryError::NotFound { email })
        }
    }

    /// Geocodes `address` and stores it as the subscriber's location.
    ///
    /// Nothing is written if the lookup fails.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Geocode`] if the address cannot be resolved,
    /// or [`RegistryError::NotFound`] if `email` has no subscription.
    pub async fn set_location(&self, email: &str, address: &str) -> Result<Subscription, RegistryError> {
        let email = normalize_email(email)?;
        let address = address.trim();
        if address.is_empty() {
            return Err(RegistryError::Validation(fuelwatch_core::CoreError::Validation {
                field: "address",
                reason: "is required".to_owned(),
            }));
        }
        // Fail fast before spending a geocoding request on an unknown email.
        match self.store.get_subscription(&email).await {
            Ok(_) => {}
            Err(DbError::NotFound) => return Err(RegistryError::NotFound { email }),
            Err(e) => return Err(e.into()),
        }

        let location = self.locate(address).await?;
        match self.store.set_subscription_location(&email, &location).await {
            Ok(subscription) => Ok(subscription),
            Err(DbError::NotFound) => Err(RegistryError::NotFound { email }),
            Err(e) => Err(e.into()),
        }
    }

    async fn locate(&self, address: &str) -> Result<SubscriberLocation, GeocodeError> {
        let coordinates = tokio::time::timeout(
            self.geocode_timeout,
            self.geocoder.resolve_address(address),
        )
        .await
        .map_err(|_| GeocodeError::TimedOut {
            secs: self.geocode_timeout.as_secs(),
        })??
        .ok_or_else(|| GeocodeError::NotFound {
            address: address.to_owned(),
        })?;

        Ok(SubscriberLocation {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            address: Some(address.to_owned()),
        })
    }
}
