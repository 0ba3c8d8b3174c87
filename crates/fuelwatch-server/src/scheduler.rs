//! Recurring cycle trigger.
//!
//! The cron job never runs a cycle itself; it only enqueues a `Schedule`
//! request on the worker, which drops it if one is already waiting.

use fuelwatch_pipeline::{CycleHandle, TriggerSource};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the scheduler with the cycle job registered.
///
/// The returned [`JobScheduler`] must be kept alive for as long as jobs
/// should fire.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if `schedule` is not a valid cron
/// expression or the scheduler fails to start.
pub async fn build_scheduler(
    handle: CycleHandle,
    schedule: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_cycle_job(&scheduler, handle, schedule).await?;
    scheduler.start().await?;
    tracing::info!(schedule, "scheduler: cycle job registered");
    Ok(scheduler)
}

async fn register_cycle_job(
    scheduler: &JobScheduler,
    handle: CycleHandle,
    schedule: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let handle = handle.clone();
        Box::pin(async move {
            match handle.trigger(TriggerSource::Schedule) {
                Ok(outcome) => tracing::info!(?outcome, "scheduler: cycle trigger sent"),
                Err(e) => tracing::error!(error = %e, "scheduler: could not trigger cycle"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
