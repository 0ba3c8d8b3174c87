//! Subscription registry, keyed by lowercased email.

use std::str::FromStr;

use chrono::Utc;
use fuelwatch_core::{FuelGrade, NewSubscription, SubscriberLocation, Subscription};
use rust_decimal::Decimal;
use sqlx::{Executor, Sqlite};

use crate::{email_key, DbError, Store};

#[derive(Debug, Clone, sqlx::FromRow)]
struct SubscriptionRow {
    email: String,
    threshold: String,
    grade: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    address: Option<String>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DbError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let threshold = Decimal::from_str(&row.threshold)
            .map_err(|e| DbError::corrupt("threshold", row.threshold.clone(), e))?;
        let grade = row
            .grade
            .parse::<FuelGrade>()
            .map_err(|e| DbError::corrupt("grade", row.grade.clone(), e))?;
        let location = match (row.latitude, row.longitude) {
            (Some(latitude), Some(longitude)) => Some(SubscriberLocation {
                latitude,
                longitude,
                address: row.address,
            }),
            _ => None,
        };
        Ok(Subscription {
            email: row.email,
            threshold,
            grade,
            location,
        })
    }
}

const SELECT_COLUMNS: &str = "email, threshold, grade, latitude, longitude, address";

pub(crate) async fn fetch_subscriptions<'e, E>(executor: E) -> Result<Vec<Subscription>, DbError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, SubscriptionRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM subscriptions ORDER BY email ASC"
    ))
    .fetch_all(executor)
    .await?
    .into_iter()
    .map(Subscription::try_from)
    .collect()
}

impl Store {
    /// Creates or fully replaces the subscription for `new.email`.
    ///
    /// Threshold, grade and location are all overwritten; a `None` location
    /// clears any previously stored one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails or the stored row is corrupt.
    pub async fn subscribe(
        &self,
        new: &NewSubscription,
        location: Option<&SubscriberLocation>,
    ) -> Result<Subscription, DbError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "INSERT INTO subscriptions \
                 (email, threshold, grade, latitude, longitude, address, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT (email) DO UPDATE SET \
                 threshold = excluded.threshold, \
                 grade = excluded.grade, \
                 latitude = excluded.latitude, \
                 longitude = excluded.longitude, \
                 address = excluded.address, \
                 updated_at = excluded.updated_at \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(email_key(&new.email))
        .bind(new.threshold.to_string())
        .bind(new.grade.as_str())
        .bind(location.map(|l| l.latitude))
        .bind(location.map(|l| l.longitude))
        .bind(location.and_then(|l| l.address.clone()))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    /// Removes the subscription for `email`.
    ///
    /// Returns `false` if there was nothing to remove.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the delete fails.
    pub async fn unsubscribe(&self, email: &str) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE email = ?1")
            .bind(email_key(email))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no subscription exists for `email`.
    pub async fn get_subscription(&self, email: &str) -> Result<Subscription, DbError> {
        sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM subscriptions WHERE email = ?1"
        ))
        .bind(email_key(email))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?
        .try_into()
    }

    /// All subscriptions ordered by email.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a row is corrupt.
    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>, DbError> {
        fetch_subscriptions(&self.pool).await
    }

    /// Attaches a location to an existing subscription, leaving threshold
    /// and grade untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if `email` has no subscription.
    pub async fn set_subscription_location(
        &self,
        email: &str,
        location: &SubscriberLocation,
    ) -> Result<Subscription, DbError> {
        sqlx::query_as::<_, SubscriptionRow>(&format!(
            "UPDATE subscriptions \
             SET latitude = ?1, longitude = ?2, address = ?3, updated_at = ?4 \
             WHERE email = ?5 \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(location.address.as_deref())
        .bind(Utc::now())
        .bind(email_key(email))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)?
        .try_into()
    }
}
