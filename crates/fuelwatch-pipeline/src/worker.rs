//! Single-consumer cycle worker.
//!
//! Every trigger (cron tick, HTTP, CLI) is a message on one bounded queue
//! drained by one task, so cycles never overlap. The queue holds a single
//! pending request: a trigger that arrives while a cycle runs is queued
//! once, and any further trigger before that one starts is dropped.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::task::JoinHandle;

use crate::cycle::{CycleReport, CycleRunner, TriggerSource};
use crate::error::SchedulerError;

const QUEUE_CAPACITY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Queued,
    /// A request was already waiting; this one was discarded.
    Dropped,
}

/// Snapshot published by the worker after every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub current_trigger: Option<TriggerSource>,
    pub cycles_completed: u64,
    pub last_report: Option<CycleReport>,
}

struct CycleRequest {
    trigger: TriggerSource,
    reply: Option<oneshot::Sender<CycleReport>>,
}

/// Cloneable sender side of the worker.
#[derive(Clone)]
pub struct CycleHandle {
    tx: mpsc::Sender<CycleRequest>,
    status: watch::Receiver<WorkerStatus>,
    shutdown: Arc<Notify>,
}

impl CycleHandle {
    /// Enqueues a cycle without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::WorkerStopped`] if the worker has exited.
    pub fn trigger(&self, trigger: TriggerSource) -> Result<TriggerOutcome, SchedulerError> {
        match self.tx.try_send(CycleRequest {
            trigger,
            reply: None,
        }) {
            Ok(()) => {
                tracing::debug!(%trigger, "cycle queued");
                Ok(TriggerOutcome::Queued)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::info!(%trigger, "cycle already queued, dropping trigger");
                Ok(TriggerOutcome::Dropped)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SchedulerError::WorkerStopped),
        }
    }

    /// Enqueues a cycle and waits for its report.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyQueued`] if another request is
    /// already waiting, or [`SchedulerError::WorkerStopped`] if the worker
    /// exits before replying.
    pub async fn run_and_wait(&self, trigger: TriggerSource) -> Result<CycleReport, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .try_send(CycleRequest {
                trigger,
                reply: Some(reply_tx),
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SchedulerError::AlreadyQueued,
                mpsc::error::TrySendError::Closed(_) => SchedulerError::WorkerStopped,
            })?;
        reply_rx.await.map_err(|_| SchedulerError::WorkerStopped)
    }

    #[must_use]
    pub fn status(&self) -> WorkerStatus {
        self.status.borrow().clone()
    }

    /// A receiver that observes every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.clone()
    }

    /// Asks the worker to exit once the cycle in flight, if any, completes.
    /// Requests still queued are discarded.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

/// Spawns the worker task that owns `runner`.
pub fn spawn_cycle_worker(runner: CycleRunner) -> (CycleHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let (status_tx, status_rx) = watch::channel(WorkerStatus {
        state: WorkerState::Idle,
        current_trigger: None,
        cycles_completed: 0,
        last_report: None,
    });
    let shutdown = Arc::new(Notify::new());

    let task = tokio::spawn(run_worker(runner, rx, status_tx, Arc::clone(&shutdown)));
    let handle = CycleHandle {
        tx,
        status: status_rx,
        shutdown,
    };
    (handle, task)
}

async fn run_worker(
    runner: CycleRunner,
    mut rx: mpsc::Receiver<CycleRequest>,
    status: watch::Sender<WorkerStatus>,
    shutdown: Arc<Notify>,
) {
    loop {
        let request = tokio::select! {
            biased;
            () = shutdown.notified() => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        status.send_modify(|s| {
            s.state = WorkerState::Running;
            s.current_trigger = Some(request.trigger);
        });

        let report = runner.run_cycle(request.trigger).await;

        status.send_modify(|s| {
            s.state = WorkerState::Idle;
            s.current_trigger = None;
            s.cycles_completed += 1;
            s.last_report = Some(report.clone());
        });

        if let Some(reply) = request.reply {
            // The requester may have given up waiting; that is fine.
            let _ = reply.send(report);
        }
    }
    tracing::info!("cycle worker stopped");
}
