//! SQLite persistence for price history, stations, subscriptions and the
//! cycle-run ledger.
//!
//! Everything goes through an explicitly constructed [`Store`]; there is no
//! process-wide connection.

use std::str::FromStr;
use std::time::Duration;

use fuelwatch_core::{AppConfig, CoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use thiserror::Error;

pub mod cycle_runs;
pub mod prices;
pub mod stations;
pub mod subscriptions;

pub use cycle_runs::{CycleRunRow, CycleTotals};
pub use prices::{CycleSnapshot, IngestSummary, RejectedRecord};

const DEFAULT_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Path relative to crates/fuelwatch-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Validation(#[from] CoreError),
    #[error("corrupt value in column {column}: {value:?} ({reason})")]
    CorruptColumn {
        column: &'static str,
        value: String,
        reason: String,
    },
    #[error("cycle run {id} is not in expected status '{expected_status}'")]
    InvalidCycleRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    pub(crate) fn corrupt(
        column: &'static str,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::CorruptColumn {
            column,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Cloneable handle over the connection pool.
///
/// Writers go through SQLite's own locking: each ingestion batch is a single
/// transaction, so two batches never interleave.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) a file-backed database in WAL mode.
    ///
    /// Does not run migrations; call [`Store::run_migrations`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the URL is malformed or the connection
    /// cannot be established.
    pub async fn connect(database_url: &str, config: PoolConfig) -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// A private, fully migrated in-memory database.
    ///
    /// Each in-memory connection is its own database, so the pool is pinned
    /// to exactly one connection that is never recycled.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or the migrations fail.
    pub async fn connect_in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run all pending migrations.
    ///
    /// Returns the number of migrations that were applied.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<usize, DbError> {
        // The ledger table does not exist on a fresh database; treat that as zero.
        let applied_before = self.applied_migrations().await;
        MIGRATOR.run(&self.pool).await?;
        let applied_after = self.applied_migrations().await;

        let delta = (applied_after - applied_before).max(0);
        Ok(usize::try_from(delta).unwrap_or(0))
    }

    async fn applied_migrations(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0)
    }

    /// Verify the pool can hand out a live connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the query fails.
    pub async fn health_check(&self) -> Result<(), DbError> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Lowercased, trimmed email used as the subscription key in lookups.
pub(crate) fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}
