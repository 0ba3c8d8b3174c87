use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use fuelwatch_core::FuelGrade;
use fuelwatch_pipeline::GradeListing;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub(super) struct PricesQuery {
    /// Subscriber whose stored location decorates the listing.
    pub email: Option<String>,
    pub limit: Option<usize>,
}

impl PricesQuery {
    fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }
}

/// GET /api/v1/prices: the cheapest stations for every grade.
pub(super) async fn list_prices(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<ApiResponse<Vec<GradeListing>>>, ApiError> {
    let k = normalize_limit(query.limit, state.top_k, MAX_LIMIT);
    let listings = state
        .query
        .for_subscriber(query.email(), k)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(listings, req_id.0))
}

/// GET /api/v1/prices/{grade}
pub(super) async fn grade_prices(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(grade): Path<String>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<ApiResponse<GradeListing>>, ApiError> {
    let grade = grade
        .parse::<FuelGrade>()
        .map_err(|e| ApiError::new(&req_id.0, "validation_error", e.to_string()))?;
    let k = normalize_limit(query.limit, state.top_k, MAX_LIMIT);

    let listing = state
        .query
        .for_grade(grade, query.email(), k)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(listing, req_id.0))
}
