use std::time::Duration;

use fuelwatch_core::RawPriceRecord;
use reqwest::{Client, Response, StatusCode};

use crate::error::ScraperError;
use crate::listing::parse_listing;
use crate::retry::retry_with_backoff;

/// Maps a non-success response onto the matching [`ScraperError`] variant.
pub(crate) fn check_status(response: &Response, url: &str) -> Result<(), ScraperError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(ScraperError::RateLimited {
            domain: extract_domain(url),
            retry_after_secs,
        });
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ScraperError::NotFound {
            url: url.to_owned(),
        });
    }
    if status.is_server_error() {
        return Err(ScraperError::ServerError {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }
    Err(ScraperError::UnexpectedStatus {
        status: status.as_u16(),
        url: url.to_owned(),
    })
}

pub(crate) fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}

pub(crate) fn build_http_client(timeout_secs: u64, user_agent: &str) -> Result<Client, ScraperError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?)
}

/// HTTP client for the public fuel price listing page.
///
/// Transient errors (429, 5xx, network failures) are retried with
/// exponential back-off and jitter up to `max_retries` additional attempts.
#[derive(Debug, Clone)]
pub struct ListingClient {
    client: Client,
    source_url: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl ListingClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidUrl`] if `source_url` does not parse,
    /// or [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        source_url: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ScraperError> {
        reqwest::Url::parse(source_url).map_err(|e| ScraperError::InvalidUrl {
            url: source_url.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            client: build_http_client(timeout_secs, user_agent)?,
            source_url: source_url.to_owned(),
            max_retries,
            backoff_base_ms,
        })
    }

    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Downloads the raw listing page.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::RateLimited`] / [`ScraperError::ServerError`] /
    ///   [`ScraperError::Http`] once retries are exhausted.
    /// - [`ScraperError::NotFound`] or [`ScraperError::UnexpectedStatus`]
    ///   immediately, without retrying.
    pub async fn fetch_html(&self) -> Result<String, ScraperError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async move {
            let response = self.client.get(&self.source_url).send().await?;
            check_status(&response, &self.source_url)?;
            Ok(response.text().await?)
        })
        .await
    }

    /// Downloads and parses the listing into raw price records.
    ///
    /// An empty result is returned as-is; deciding whether that is a failure
    /// is up to the caller.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::fetch_html`].
    pub async fn fetch_prices(&self) -> Result<Vec<RawPriceRecord>, ScraperError> {
        tracing::info!(url = %self.source_url, "scraping fuel prices");
        let html = self.fetch_html().await?;
        let records = parse_listing(&html);
        tracing::info!(count = records.len(), "scraped price entries");
        Ok(records)
    }
}
