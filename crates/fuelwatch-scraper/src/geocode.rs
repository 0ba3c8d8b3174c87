//! Address lookup against a Nominatim-compatible search API.

use fuelwatch_core::Coordinates;
use reqwest::Client;
use serde::Deserialize;

use crate::client::{build_http_client, check_status};
use crate::error::ScraperError;
use crate::retry::retry_with_backoff;

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// The best match for a free-text address.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    pub coordinates: Coordinates,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl NominatimClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        base_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        Ok(Self {
            client: build_http_client(timeout_secs, user_agent)?,
            base_url: base_url.trim_end_matches('/').to_owned(),
            max_retries,
            backoff_base_ms,
        })
    }

    /// Resolves `address` to the coordinates of the first search hit.
    ///
    /// Returns `Ok(None)` when the service has no match or the hit carries
    /// unusable coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] on transport failures, non-2xx statuses or an
    /// undecodable body.
    pub async fn resolve(&self, address: &str) -> Result<Option<GeocodedPlace>, ScraperError> {
        let url = format!("{}/search", self.base_url);
        let url = url.as_str();
        let places: Vec<NominatimPlace> =
            retry_with_backoff(self.max_retries, self.backoff_base_ms, || async move {
                let response = self
                    .client
                    .get(url)
                    .query(&[("q", address), ("format", "json"), ("limit", "1")])
                    .send()
                    .await?;
                check_status(&response, url)?;
                let body = response.text().await?;
                serde_json::from_str::<Vec<NominatimPlace>>(&body).map_err(|e| {
                    ScraperError::Deserialize {
                        context: format!("geocoding response for {address:?}"),
                        source: e,
                    }
                })
            })
            .await?;

        let Some(place) = places.into_iter().next() else {
            tracing::debug!(address, "no geocoding match");
            return Ok(None);
        };

        let parsed = place
            .lat
            .trim()
            .parse::<f64>()
            .ok()
            .zip(place.lon.trim().parse::<f64>().ok())
            .and_then(|(lat, lon)| Coordinates::new(lat, lon).ok());

        Ok(parsed.map(|coordinates| GeocodedPlace {
            coordinates,
            display_name: place.display_name,
        }))
    }
}
