//! Price history: ingestion, latest-per-station selection and the per-cycle
//! snapshot the matcher runs against.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use fuelwatch_core::{top_cheapest, FuelGrade, PriceRecord, RawPriceRecord, Subscription};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Executor, Sqlite};

use crate::subscriptions::fetch_subscriptions;
use crate::{DbError, Store};

#[derive(Debug, Clone, sqlx::FromRow)]
struct PriceRow {
    grade: String,
    station: String,
    price: String,
    freshness_label: String,
    observed_at: i64,
}

impl TryFrom<PriceRow> for PriceRecord {
    type Error = DbError;

    fn try_from(row: PriceRow) -> Result<Self, Self::Error> {
        let grade = row
            .grade
            .parse::<FuelGrade>()
            .map_err(|e| DbError::corrupt("grade", row.grade.clone(), e))?;
        let price = Decimal::from_str(&row.price)
            .map_err(|e| DbError::corrupt("price", row.price.clone(), e))?;
        let observed_at = DateTime::from_timestamp_micros(row.observed_at).ok_or_else(|| {
            DbError::corrupt("observed_at", row.observed_at.to_string(), "out of range")
        })?;
        Ok(PriceRecord {
            grade,
            station: row.station,
            price,
            freshness_label: row.freshness_label,
            observed_at,
        })
    }
}

/// A raw record that was not stored, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    pub grade: String,
    pub station: String,
    pub reason: String,
}

/// Outcome of one [`Store::ingest`] batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Distinct `(grade, station)` rows stored. Repeats within one batch
    /// overwrite each other and count once.
    pub written: usize,
    pub rejected: Vec<RejectedRecord>,
}

/// Everything one cycle matches against, read inside a single transaction.
#[derive(Debug, Clone, Default)]
pub struct CycleSnapshot {
    pub top_k_by_grade: HashMap<FuelGrade, Vec<PriceRecord>>,
    pub subscriptions: Vec<Subscription>,
}

fn validate(raw: &RawPriceRecord) -> Result<FuelGrade, String> {
    let grade = raw.grade.parse::<FuelGrade>().map_err(|e| e.to_string())?;
    if raw.station.trim().is_empty() {
        return Err("station name is empty".to_string());
    }
    if raw.price <= Decimal::ZERO {
        return Err(format!("price must be positive, got {}", raw.price));
    }
    Ok(grade)
}

const LATEST_PER_STATION_SQL: &str = "\
    SELECT p.grade, p.station, p.price, p.freshness_label, p.observed_at \
    FROM price_records p \
    WHERE p.grade = ?1 \
      AND p.observed_at = ( \
          SELECT MAX(q.observed_at) FROM price_records q \
          WHERE q.grade = p.grade AND q.station = p.station) \
    ORDER BY p.station ASC";

async fn fetch_latest<'e, E>(executor: E, grade: FuelGrade) -> Result<Vec<PriceRecord>, DbError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, PriceRow>(LATEST_PER_STATION_SQL)
        .bind(grade.as_str())
        .fetch_all(executor)
        .await?
        .into_iter()
        .map(PriceRecord::try_from)
        .collect()
}

impl Store {
    /// Writes one price observation per valid record, all stamped with
    /// `observed_at`.
    ///
    /// Invalid records (unknown grade, blank station, non-positive price) are
    /// logged and returned in [`IngestSummary::rejected`]; they never abort
    /// the rest of the batch. Re-ingesting a record with the same
    /// `(grade, station, observed_at)` overwrites it in place, so a batch that
    /// repeats a station keeps the last price seen. The batch commits as a
    /// single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the transaction cannot be opened,
    /// written or committed.
    pub async fn ingest(
        &self,
        records: &[RawPriceRecord],
        observed_at: DateTime<Utc>,
    ) -> Result<IngestSummary, DbError> {
        let stamp = observed_at.timestamp_micros();
        let mut summary = IngestSummary::default();
        let mut stored: HashSet<(FuelGrade, String)> = HashSet::new();
        let mut tx = self.pool.begin().await?;

        for raw in records {
            let grade = match validate(raw) {
                Ok(grade) => grade,
                Err(reason) => {
                    tracing::warn!(
                        grade = %raw.grade,
                        station = %raw.station,
                        %reason,
                        "rejecting price record"
                    );
                    summary.rejected.push(RejectedRecord {
                        grade: raw.grade.clone(),
                        station: raw.station.clone(),
                        reason,
                    });
                    continue;
                }
            };

            sqlx::query(
                "INSERT INTO price_records (grade, station, price, freshness_label, observed_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT (grade, station, observed_at) DO UPDATE SET \
                     price = excluded.price, \
                     freshness_label = excluded.freshness_label",
            )
            .bind(grade.as_str())
            .bind(raw.station.trim())
            .bind(raw.price.to_string())
            .bind(&raw.freshness_label)
            .bind(stamp)
            .execute(&mut *tx)
            .await?;
            stored.insert((grade, raw.station.trim().to_owned()));
        }
        summary.written = stored.len();

        tx.commit().await?;
        tracing::debug!(
            written = summary.written,
            rejected = summary.rejected.len(),
            "ingested price batch"
        );
        Ok(summary)
    }

    /// One record per station for `grade`: the one with the greatest
    /// `observed_at`. Stations come back in ascending name order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a stored row is corrupt.
    pub async fn latest_per_station(&self, grade: FuelGrade) -> Result<Vec<PriceRecord>, DbError> {
        fetch_latest(&self.pool, grade).await
    }

    /// The `k` cheapest stations for `grade` by latest observation.
    ///
    /// Equal prices are ordered by station name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the underlying query fails.
    pub async fn top_cheapest(&self, grade: FuelGrade, k: usize) -> Result<Vec<PriceRecord>, DbError> {
        let latest = self.latest_per_station(grade).await?;
        Ok(top_cheapest(latest, k))
    }

    /// Top-`k` for every grade, in [`FuelGrade::ALL`] order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any query fails.
    pub async fn latest_prices_all_grades(
        &self,
        k: usize,
    ) -> Result<Vec<(FuelGrade, Vec<PriceRecord>)>, DbError> {
        let mut out = Vec::with_capacity(FuelGrade::ALL.len());
        for grade in FuelGrade::ALL {
            out.push((grade, self.top_cheapest(grade, k).await?));
        }
        Ok(out)
    }

    /// Reads the Top-K set of every grade and every subscription inside one
    /// read transaction, so the whole cycle sees a single committed state.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the transaction or any query fails.
    pub async fn snapshot(&self, k: usize) -> Result<CycleSnapshot, DbError> {
        let mut tx = self.pool.begin().await?;

        let mut top_k_by_grade = HashMap::with_capacity(FuelGrade::ALL.len());
        for grade in FuelGrade::ALL {
            let latest = fetch_latest(&mut *tx, grade).await?;
            top_k_by_grade.insert(grade, top_cheapest(latest, k));
        }
        let subscriptions = fetch_subscriptions(&mut *tx).await?;

        tx.commit().await?;
        Ok(CycleSnapshot {
            top_k_by_grade,
            subscriptions,
        })
    }

    /// Total number of stored observations, history included.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn count_price_records(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM price_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(grade: &str, station: &str, price: &str) -> RawPriceRecord {
        RawPriceRecord {
            grade: grade.to_owned(),
            station: station.to_owned(),
            price: Decimal::from_str(price).expect("decimal"),
            freshness_label: "just now".to_owned(),
        }
    }

    #[test]
    fn validate_accepts_known_grade() {
        assert_eq!(validate(&raw("Diesel", "A", "1.50")), Ok(FuelGrade::Diesel));
    }

    #[test]
    fn validate_rejects_unknown_grade() {
        let reason = validate(&raw("LPG", "A", "1.50")).unwrap_err();
        assert!(reason.contains("LPG"), "got {reason}");
    }

    #[test]
    fn validate_rejects_blank_station_and_free_fuel() {
        assert!(validate(&raw("Diesel", "  ", "1.50")).is_err());
        assert!(validate(&raw("Diesel", "A", "0")).is_err());
    }

    #[test]
    fn corrupt_row_is_reported() {
        let row = PriceRow {
            grade: "Diesel".to_owned(),
            station: "A".to_owned(),
            price: "cheap".to_owned(),
            freshness_label: String::new(),
            observed_at: 0,
        };
        let err = PriceRecord::try_from(row).unwrap_err();
        assert!(matches!(err, DbError::CorruptColumn { column: "price", .. }));
    }
}
