//! Read path for ranked price listings.

use fuelwatch_core::{enrich, Coordinates, FuelGrade, GreatCircle, PriceRecord, RankedPrice};
use fuelwatch_db::{DbError, Store};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeListing {
    pub grade: FuelGrade,
    pub prices: Vec<RankedPrice>,
}

/// Top-K listings, optionally decorated with distance from a subscriber.
#[derive(Debug, Clone)]
pub struct PriceQuery {
    store: Store,
    model: GreatCircle,
}

impl PriceQuery {
    #[must_use]
    pub fn new(store: Store, average_speed_kmh: f64) -> Self {
        Self {
            store,
            model: GreatCircle::new(average_speed_kmh),
        }
    }

    /// The `k` cheapest stations for `grade`, with distances from `origin`
    /// when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a query fails.
    pub async fn top_cheapest(
        &self,
        grade: FuelGrade,
        k: usize,
        origin: Option<Coordinates>,
    ) -> Result<Vec<RankedPrice>, DbError> {
        let records = self.store.top_cheapest(grade, k).await?;
        self.decorate(records, origin).await
    }

    /// Top-`k` for a single grade, decorated the same way as
    /// [`PriceQuery::for_subscriber`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a query fails.
    pub async fn for_grade(
        &self,
        grade: FuelGrade,
        email: Option<&str>,
        k: usize,
    ) -> Result<GradeListing, DbError> {
        let origin = match email {
            Some(email) => self.origin_for(email).await?,
            None => None,
        };
        Ok(GradeListing {
            grade,
            prices: self.top_cheapest(grade, k, origin).await?,
        })
    }

    /// Top-`k` for every grade. When `email` belongs to a subscriber with a
    /// stored location, each row carries distance and ETA; otherwise the
    /// listing is returned undecorated.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a query fails.
    pub async fn for_subscriber(
        &self,
        email: Option<&str>,
        k: usize,
    ) -> Result<Vec<GradeListing>, DbError> {
        let origin = match email {
            Some(email) => self.origin_for(email).await?,
            None => None,
        };

        let mut listings = Vec::with_capacity(FuelGrade::ALL.len());
        for (grade, records) in self.store.latest_prices_all_grades(k).await? {
            listings.push(GradeListing {
                grade,
                prices: self.decorate(records, origin).await?,
            });
        }
        Ok(listings)
    }

    async fn origin_for(&self, email: &str) -> Result<Option<Coordinates>, DbError> {
        match self.store.get_subscription(email).await {
            Ok(subscription) => Ok(subscription.location.map(|l| l.coordinates())),
            Err(DbError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn decorate(
        &self,
        records: Vec<PriceRecord>,
        origin: Option<Coordinates>,
    ) -> Result<Vec<RankedPrice>, DbError> {
        let Some(origin) = origin else {
            return Ok(records.into_iter().map(RankedPrice::bare).collect());
        };
        let names: Vec<String> = records.iter().map(|r| r.station.clone()).collect();
        let locations = self.store.station_locations(&names).await?;
        Ok(enrich(records, origin, &locations, &self.model))
    }
}
