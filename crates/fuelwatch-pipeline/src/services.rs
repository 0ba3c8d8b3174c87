//! Production wiring of the collaborators from [`AppConfig`].

use std::sync::Arc;
use std::time::Duration;

use fuelwatch_core::AppConfig;
use fuelwatch_db::Store;
use fuelwatch_scraper::{ListingClient, NominatimClient};
use thiserror::Error;

use crate::collaborators::Notifier;
use crate::cycle::CycleRunner;
use crate::delivery::{LogNotifier, SmtpNotifier};
use crate::error::DeliveryError;
use crate::ranking::PriceQuery;
use crate::registry::SubscriptionService;

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("listing or geocoder client: {0}")]
    Client(#[from] fuelwatch_scraper::ScraperError),
    #[error("mail transport: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Everything a binary needs to run cycles and serve the registry.
#[derive(Clone)]
pub struct Services {
    pub runner: CycleRunner,
    pub registry: SubscriptionService,
    pub query: PriceQuery,
}

impl Services {
    /// Builds the scraper, geocoder and notifier from `config` around `store`.
    ///
    /// Without SMTP settings alerts are only logged.
    ///
    /// # Errors
    ///
    /// Returns [`ServicesError`] if an HTTP client or the mail transport
    /// cannot be constructed.
    pub fn from_config(store: Store, config: &AppConfig) -> Result<Self, ServicesError> {
        let source = ListingClient::new(
            &config.source_url,
            config.scraper_request_timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_ms,
        )?;
        let geocoder = NominatimClient::new(
            &config.geocoder.base_url,
            config.geocoder.timeout_secs,
            &config.scraper_user_agent,
            config.scraper_max_retries,
            config.scraper_retry_backoff_base_ms,
        )?;
        let notifier: Arc<dyn Notifier> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpNotifier::new(smtp)?),
            None => {
                tracing::warn!("SMTP_SERVER not set; alerts will only be logged");
                Arc::new(LogNotifier)
            }
        };

        Ok(Self {
            runner: CycleRunner::new(
                store.clone(),
                Arc::new(source),
                notifier,
                config.cycle.clone(),
            ),
            registry: SubscriptionService::new(
                store.clone(),
                Arc::new(geocoder),
                Duration::from_secs(config.geocoder.timeout_secs),
            ),
            query: PriceQuery::new(store, config.cycle.average_speed_kmh),
        })
    }
}
