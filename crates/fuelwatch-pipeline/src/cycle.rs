//! One ingest → match → notify cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fuelwatch_core::{aggregate_alerts, match_subscriptions, ComposedMessage, CycleSettings};
use fuelwatch_db::{CycleTotals, Store};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::collaborators::{Notifier, PriceSource};
use crate::error::{AcquisitionError, CycleError, DeliveryError};

/// What asked for a cycle. Stored verbatim in the run ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Schedule,
    Manual,
    Startup,
    Cli,
}

impl TriggerSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Manual => "manual",
            Self::Startup => "startup",
            Self::Cli => "cli",
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Ledger id, absent only if the ledger row itself could not be written.
    pub run_id: Option<i64>,
    pub trigger: TriggerSource,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ingested: usize,
    pub matched: usize,
    pub notified: usize,
    pub errors: Vec<CycleError>,
}

impl CycleReport {
    fn new(trigger: TriggerSource) -> Self {
        let now = Utc::now();
        Self {
            run_id: None,
            trigger,
            started_at: now,
            finished_at: now,
            ingested: 0,
            matched: 0,
            notified: 0,
            errors: Vec::new(),
        }
    }

    /// True when acquisition or storage failed for the cycle as a whole.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.errors.iter().any(CycleError::is_cycle_level)
    }

    fn totals(&self) -> CycleTotals {
        CycleTotals {
            records_ingested: self.ingested,
            alerts_matched: self.matched,
            messages_sent: self.notified,
            error_count: self.errors.len(),
        }
    }
}

/// Result of handing every composed message to the notifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub failures: Vec<CycleError>,
}

/// Runs cycles against an explicitly supplied store and collaborators.
///
/// `run_cycle` itself does not guard against overlap; callers go through
/// [`crate::spawn_cycle_worker`], which runs cycles one at a time.
#[derive(Clone)]
pub struct CycleRunner {
    store: Store,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    settings: CycleSettings,
}

impl CycleRunner {
    #[must_use]
    pub fn new(
        store: Store,
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            store,
            source,
            notifier,
            settings,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Acquire, ingest, match, aggregate and dispatch.
    ///
    /// Never fails: every problem is recorded in [`CycleReport::errors`].
    /// An acquisition failure skips ingestion only; matching still runs
    /// against whatever was stored before.
    pub async fn run_cycle(&self, trigger: TriggerSource) -> CycleReport {
        let mut report = CycleReport::new(trigger);

        match self.store.start_cycle_run(trigger.as_str()).await {
            Ok(run) => report.run_id = Some(run.id),
            Err(e) => {
                tracing::error!(error = %e, "could not record cycle start");
                report.errors.push(CycleError::Storage {
                    message: e.to_string(),
                });
            }
        }
        tracing::info!(%trigger, run_id = ?report.run_id, "cycle started");

        self.acquire_and_ingest(&mut report).await;
        self.match_and_notify(&mut report).await;

        report.finished_at = Utc::now();
        self.finish_ledger(&report).await;

        tracing::info!(
            %trigger,
            run_id = ?report.run_id,
            ingested = report.ingested,
            matched = report.matched,
            notified = report.notified,
            errors = report.errors.len(),
            "cycle finished"
        );
        report
    }

    async fn acquire_and_ingest(&self, report: &mut CycleReport) {
        let observed_at = Utc::now();
        let records = match self.acquire().await {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(error = %e, "price acquisition failed");
                report.errors.push(CycleError::Acquisition {
                    message: e.to_string(),
                });
                return;
            }
        };

        match self.store.ingest(&records, observed_at).await {
            Ok(summary) => {
                report.ingested = summary.written;
                report
                    .errors
                    .extend(summary.rejected.into_iter().map(|r| CycleError::Validation {
                        grade: r.grade,
                        station: r.station,
                        message: r.reason,
                    }));
            }
            Err(e) => {
                tracing::error!(error = %e, "price ingestion failed");
                report.errors.push(CycleError::Storage {
                    message: e.to_string(),
                });
            }
        }
    }

    async fn acquire(&self) -> Result<Vec<fuelwatch_core::RawPriceRecord>, AcquisitionError> {
        let limit = self.settings.acquisition_timeout();
        let records = tokio::time::timeout(limit, self.source.fetch_raw_prices())
            .await
            .map_err(|_| AcquisitionError::TimedOut {
                secs: limit.as_secs(),
            })??;
        if records.is_empty() {
            return Err(AcquisitionError::Empty);
        }
        Ok(records)
    }

    async fn match_and_notify(&self, report: &mut CycleReport) {
        let snapshot = match self.store.snapshot(self.settings.top_k).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "could not read cycle snapshot");
                report.errors.push(CycleError::Storage {
                    message: e.to_string(),
                });
                return;
            }
        };

        let candidates = match_subscriptions(&snapshot.subscriptions, &snapshot.top_k_by_grade);
        report.matched = candidates.len();
        let messages = aggregate_alerts(&candidates);
        tracing::debug!(
            subscriptions = snapshot.subscriptions.len(),
            candidates = candidates.len(),
            messages = messages.len(),
            "alerts aggregated"
        );

        let outcome = self.dispatch(messages).await;
        report.notified = outcome.sent;
        report.errors.extend(outcome.failures);
    }

    /// Sends every message, at most `max_concurrent_deliveries` at a time.
    ///
    /// A failed or timed-out recipient is recorded and does not stop the
    /// others.
    pub async fn dispatch(&self, messages: Vec<ComposedMessage>) -> DispatchOutcome {
        let limit = self.settings.delivery_timeout();
        let concurrency = self.settings.max_concurrent_deliveries.max(1);

        let results: Vec<(String, Result<(), DeliveryError>)> = stream::iter(messages)
            .map(|message| {
                let notifier = Arc::clone(&self.notifier);
                async move {
                    let result = send_with_timeout(notifier.as_ref(), &message, limit).await;
                    (message.recipient, result)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut outcome = DispatchOutcome::default();
        for (recipient, result) in results {
            match result {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    tracing::error!(recipient = %recipient, error = %e, "alert delivery failed");
                    outcome.failures.push(CycleError::Delivery {
                        recipient,
                        message: e.to_string(),
                    });
                }
            }
        }
        outcome
    }

    async fn finish_ledger(&self, report: &CycleReport) {
        let Some(id) = report.run_id else {
            return;
        };
        let totals = report.totals();
        let result = if report.is_failure() {
            let summary = report
                .errors
                .iter()
                .filter(|e| e.is_cycle_level())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            self.store.fail_cycle_run(id, totals, &summary).await
        } else {
            self.store.complete_cycle_run(id, totals).await
        };
        if let Err(e) = result {
            tracing::error!(run_id = id, error = %e, "could not record cycle outcome");
        }
    }
}

async fn send_with_timeout(
    notifier: &dyn Notifier,
    message: &ComposedMessage,
    limit: Duration,
) -> Result<(), DeliveryError> {
    tokio::time::timeout(
        limit,
        notifier.send(&message.recipient, &message.subject, &message.body),
    )
    .await
    .map_err(|_| DeliveryError::TimedOut {
        secs: limit.as_secs(),
    })?
}
