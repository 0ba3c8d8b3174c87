//! Ledger of pipeline cycles (`cycle_runs`).
//!
//! A run is inserted as `running` when the cycle starts and moves exactly
//! once to `succeeded` or `failed`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{DbError, Store};

/// A row from the `cycle_runs` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CycleRunRow {
    pub id: i64,
    pub public_id: String,
    pub trigger_source: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_ingested: i64,
    pub alerts_matched: i64,
    pub messages_sent: i64,
    pub error_count: i64,
    pub error_message: Option<String>,
}

/// Counters written when a run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleTotals {
    pub records_ingested: usize,
    pub alerts_matched: usize,
    pub messages_sent: usize,
    pub error_count: usize,
}

const RUN_COLUMNS: &str = "id, public_id, trigger_source, status, started_at, completed_at, \
     records_ingested, alerts_matched, messages_sent, error_count, error_message";

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl Store {
    /// Inserts a new run in `running` status with `started_at = now`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the insert fails (including an unknown
    /// `trigger_source`, which the schema rejects).
    pub async fn start_cycle_run(&self, trigger_source: &str) -> Result<CycleRunRow, DbError> {
        let row = sqlx::query_as::<_, CycleRunRow>(&format!(
            "INSERT INTO cycle_runs (public_id, trigger_source, status, started_at) \
             VALUES (?1, ?2, 'running', ?3) \
             RETURNING {RUN_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(trigger_source)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Marks a `running` run as `succeeded` and records its totals.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidCycleRunTransition`] if the run is not
    /// `running`, or [`DbError::Sqlx`] if the update fails.
    pub async fn complete_cycle_run(&self, id: i64, totals: CycleTotals) -> Result<(), DbError> {
        self.finish_cycle_run(id, "succeeded", totals, None).await
    }

    /// Marks a `running` run as `failed` with a summary message.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidCycleRunTransition`] if the run is not
    /// `running`, or [`DbError::Sqlx`] if the update fails.
    pub async fn fail_cycle_run(
        &self,
        id: i64,
        totals: CycleTotals,
        error_message: &str,
    ) -> Result<(), DbError> {
        self.finish_cycle_run(id, "failed", totals, Some(error_message))
            .await
    }

    async fn finish_cycle_run(
        &self,
        id: i64,
        status: &'static str,
        totals: CycleTotals,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE cycle_runs \
             SET status = ?1, completed_at = ?2, records_ingested = ?3, alerts_matched = ?4, \
                 messages_sent = ?5, error_count = ?6, error_message = ?7 \
             WHERE id = ?8 AND status = 'running'",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(to_i64(totals.records_ingested))
        .bind(to_i64(totals.alerts_matched))
        .bind(to_i64(totals.messages_sent))
        .bind(to_i64(totals.error_count))
        .bind(error_message)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::InvalidCycleRunTransition {
                id,
                expected_status: "running",
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no run has the given `id`.
    pub async fn get_cycle_run(&self, id: i64) -> Result<CycleRunRow, DbError> {
        sqlx::query_as::<_, CycleRunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM cycle_runs WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound)
    }

    /// The most recent `limit` runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn list_cycle_runs(&self, limit: i64) -> Result<Vec<CycleRunRow>, DbError> {
        let rows = sqlx::query_as::<_, CycleRunRow>(&format!(
            "SELECT {RUN_COLUMNS} FROM cycle_runs ORDER BY id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
