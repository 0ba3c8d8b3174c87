use axum::{
    extract::{Query, State},
    Extension, Json,
};
use fuelwatch_db::CycleRunRow;
use fuelwatch_pipeline::{CycleReport, SchedulerError, TriggerSource, WorkerStatus};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CyclesQuery {
    pub limit: Option<usize>,
}

/// POST /api/v1/cycles: run a cycle now and wait for its report.
pub(super) async fn trigger_cycle(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<CycleReport>>, ApiError> {
    let report = state
        .cycles
        .run_and_wait(TriggerSource::Manual)
        .await
        .map_err(|e| match e {
            SchedulerError::AlreadyQueued => ApiError::new(&req_id.0, "conflict", e.to_string()),
            SchedulerError::WorkerStopped => {
                ApiError::new(&req_id.0, "unavailable", e.to_string())
            }
        })?;
    Ok(ApiResponse::new(report, req_id.0))
}

/// GET /api/v1/cycles: most recent runs first.
pub(super) async fn list_cycles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CyclesQuery>,
) -> Result<Json<ApiResponse<Vec<CycleRunRow>>>, ApiError> {
    let limit = normalize_limit(query.limit, 20, 200);
    let runs = state
        .store
        .list_cycle_runs(i64::try_from(limit).unwrap_or(200))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(runs, req_id.0))
}

pub(super) async fn cycle_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<WorkerStatus>> {
    ApiResponse::new(state.cycles.status(), req_id.0)
}
