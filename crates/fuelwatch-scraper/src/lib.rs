pub mod client;
pub mod error;
pub mod geocode;
pub mod listing;
pub(crate) mod retry;

pub use client::ListingClient;
pub use error::ScraperError;
pub use geocode::{GeocodedPlace, NominatimClient};
pub use listing::{parse_listing, parse_price, translate_freshness, LISTING_GRADES};
