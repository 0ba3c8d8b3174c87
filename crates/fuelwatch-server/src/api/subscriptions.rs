use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use fuelwatch_core::{NewSubscription, Subscription};
use fuelwatch_pipeline::{GeocodeError, RegistryError, SubscribeOutcome};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateSubscriptionRequest {
    pub email: Option<String>,
    pub threshold: Option<Decimal>,
    pub grade: Option<String>,
    /// Free-text address; geocoded on a best-effort basis.
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SetLocationRequest {
    pub address: String,
}

fn map_registry_error(req_id: &str, error: &RegistryError) -> ApiError {
    match error {
        RegistryError::Validation(e) => ApiError::new(req_id, "validation_error", e.to_string()),
        RegistryError::NotFound { .. } => ApiError::new(req_id, "not_found", error.to_string()),
        RegistryError::Geocode(GeocodeError::NotFound { .. }) => {
            ApiError::new(req_id, "validation_error", error.to_string())
        }
        RegistryError::Geocode(e) => {
            tracing::warn!(error = %e, "geocoding failed");
            ApiError::new(req_id, "upstream_error", "address lookup failed")
        }
        RegistryError::Storage(e) => map_db_error(req_id.to_owned(), e),
    }
}

/// GET /api/v1/subscriptions
pub(super) async fn list_subscriptions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<Subscription>>>, ApiError> {
    let subscriptions = state
        .store
        .list_subscriptions()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(subscriptions, req_id.0))
}

/// POST /api/v1/subscriptions: create or wholly replace the subscription
/// for an email.
pub(super) async fn create_subscription(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SubscribeOutcome>>), ApiError> {
    let rid = &req_id.0;
    let new = NewSubscription::from_input(
        body.email.as_deref(),
        body.threshold,
        body.grade.as_deref(),
    )
    .map_err(|e| ApiError::new(rid, "validation_error", e.to_string()))?;
    let address = body.address.as_deref().map(str::trim).filter(|a| !a.is_empty());

    let outcome = state
        .registry
        .subscribe(&new, address)
        .await
        .map_err(|e| map_registry_error(rid, &e))?;

    Ok((StatusCode::CREATED, ApiResponse::new(outcome, req_id.0)))
}

/// DELETE /api/v1/subscriptions/{email}
pub(super) async fn delete_subscription(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(email): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .registry
        .unsubscribe(&email)
        .await
        .map_err(|e| map_registry_error(&req_id.0, &e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/subscriptions/{email}/location
pub(super) async fn set_location(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(email): Path<String>,
    Json(body): Json<SetLocationRequest>,
) -> Result<Json<ApiResponse<Subscription>>, ApiError> {
    let subscription = state
        .registry
        .set_location(&email, &body.address)
        .await
        .map_err(|e| map_registry_error(&req_id.0, &e))?;
    Ok(ApiResponse::new(subscription, req_id.0))
}
