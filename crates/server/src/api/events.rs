//! Event log endpoints.

use crate::AppResources;
use crate::entity::event;
use crate::error::ApiError;
use crate::events::{list_events, log_event};
use axum::{Extension, Json, extract::Query};
use hyper::StatusCode;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const EVENTS_TAG: &str = "Events API";

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogEventRequest {
    pub username: String,
    /// Event kind, e.g. `login` or `SOS`.
    pub event: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EventFilter {
    pub username: Option<String>,
}

#[tracing::instrument]
pub fn router() -> OpenApiRouter {
    OpenApiRouter::new().routes(routes!(create_event, get_events))
}

#[tracing::instrument(skip(resources), fields(username = %payload.username, event = %payload.event))]
#[utoipa::path(
    post,
    path = "/api/events",
    tag = EVENTS_TAG,
    operation_id = "Log Event",
    request_body = LogEventRequest,
    responses(
        (status = 201, description = "Event stored", body = event::Model),
        (status = 400, description = "Missing username or event", content_type = "application/json"),
        (status = 500, description = "Database error", content_type = "application/json")
    )
)]
async fn create_event(
    Extension(resources): Extension<AppResources>,
    Json(payload): Json<LogEventRequest>,
) -> Result<(StatusCode, Json<event::Model>), ApiError> {
    let username = payload.username.trim();
    let kind = payload.event.trim();
    if username.is_empty() || kind.is_empty() {
        return Err(ApiError::BadRequest("username and event are required".into()));
    }
    let stored = log_event(&resources.db, username, kind).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/api/events",
    params(EventFilter),
    tag = EVENTS_TAG,
    operation_id = "List Events",
    responses(
        (status = 200, description = "Events, newest first", body = [event::Model]),
        (status = 500, description = "Database error", content_type = "application/json")
    )
)]
async fn get_events(
    Extension(resources): Extension<AppResources>,
    Query(filter): Query<EventFilter>,
) -> Result<Json<Vec<event::Model>>, ApiError> {
    let username = filter.username.as_deref().filter(|u| !u.is_empty());
    Ok(Json(list_events(&resources.db, username).await?))
}
