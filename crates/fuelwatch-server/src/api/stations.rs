use axum::{
    extract::{Path, State},
    Extension, Json,
};
use fuelwatch_core::{Coordinates, Station};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

/// Both coordinates or neither; neither clears a stored location.
#[derive(Debug, Deserialize)]
pub(super) struct UpsertStationRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub(super) async fn list_stations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Station>>>, ApiError> {
    let stations = state
        .store
        .list_stations()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(stations, req_id.0))
}

/// PUT /api/v1/stations/{name}: register a station or move it.
pub(super) async fn upsert_station(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(name): Path<String>,
    Json(body): Json<UpsertStationRequest>,
) -> Result<Json<ApiResponse<Station>>, ApiError> {
    let rid = &req_id.0;
    let location = match (body.latitude, body.longitude) {
        (Some(lat), Some(lon)) => Some(
            Coordinates::new(lat, lon)
                .map_err(|e| ApiError::new(rid, "validation_error", e.to_string()))?,
        ),
        (None, None) => None,
        _ => {
            return Err(ApiError::new(
                rid,
                "validation_error",
                "latitude and longitude must be given together",
            ))
        }
    };

    let station = state
        .store
        .upsert_station(&name, location)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    Ok(ApiResponse::new(station, req_id.0))
}
