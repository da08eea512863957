//! Station dataset endpoints.

use crate::error::ApiError;
use crate::stations::{StationDataset, StationRecord};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const STATIONS_TAG: &str = "Stations API";

#[derive(Clone)]
pub struct StationAppState {
    pub dataset: Arc<StationDataset>,
}

#[derive(Deserialize, IntoParams, Debug)]
pub struct StationParams {
    /// Station name, matched case-insensitively.
    pub name: Option<String>,
}

#[tracing::instrument(skip(state))]
pub fn router(state: StationAppState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_stations))
        .routes(routes!(station_analysis))
        .with_state(state)
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/stations",
    tag = STATIONS_TAG,
    operation_id = "List Stations",
    responses(
        (status = 200, description = "Sorted unique station names", body = [String]),
        (status = 500, description = "Dataset not loaded", content_type = "application/json")
    )
)]
async fn list_stations(State(state): State<StationAppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.dataset.stations()?))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/station_analysis",
    params(StationParams),
    tag = STATIONS_TAG,
    operation_id = "Station Analysis",
    responses(
        (status = 200, description = "All dataset rows for the station", content_type = "application/json"),
        (status = 400, description = "Missing name parameter", content_type = "application/json"),
        (status = 404, description = "Unknown station", content_type = "application/json")
    )
)]
async fn station_analysis(
    Query(params): Query<StationParams>,
    State(state): State<StationAppState>,
) -> Result<Json<Vec<StationRecord>>, ApiError> {
    let name = params.name.unwrap_or_default();
    if name.is_empty() {
        return Err(ApiError::BadRequest(
            "A 'name' parameter is required.".into(),
        ));
    }

    let rows = state.dataset.analysis(&name)?;
    if rows.is_empty() {
        return Err(ApiError::NotFound(format!("Station '{name}' not found.")));
    }
    Ok(Json(rows.into_iter().cloned().collect()))
}
