//! Feedback CRUD endpoints.
//!
//! - `POST /feedback` - submit
//! - `GET /feedback` - list in submission order
//! - `GET /feedback/{id}` - fetch one
//! - `DELETE /feedback/{id}` - remove (idempotent)

use crate::error::ApiError;
use crate::feedback::{Feedback, FeedbackStore};
use axum::{
    Json,
    extract::{Path, State},
};
use hyper::StatusCode;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

/// Tag for OpenAPI documentation.
pub const FEEDBACK_TAG: &str = "Feedback API";

#[tracing::instrument(skip(store))]
pub fn router(store: FeedbackStore) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(submit_feedback, list_feedback))
        .routes(routes!(get_feedback, delete_feedback))
        .with_state(store)
}

#[tracing::instrument(skip(store))]
#[utoipa::path(
    post,
    path = "/feedback",
    tag = FEEDBACK_TAG,
    operation_id = "Submit Feedback",
    request_body = Feedback,
    responses(
        (status = 201, description = "Feedback stored", body = Feedback),
        (status = 422, description = "Unknown feedback type")
    )
)]
async fn submit_feedback(
    State(store): State<FeedbackStore>,
    Json(feedback): Json<Feedback>,
) -> (StatusCode, Json<Feedback>) {
    let stored = store.submit(feedback).await;
    (StatusCode::CREATED, Json(stored))
}

#[tracing::instrument(skip(store))]
#[utoipa::path(
    get,
    path = "/feedback",
    tag = FEEDBACK_TAG,
    operation_id = "List Feedback",
    responses((status = 200, description = "All feedback", body = [Feedback]))
)]
async fn list_feedback(State(store): State<FeedbackStore>) -> Json<Vec<Feedback>> {
    Json(store.list().await)
}

#[tracing::instrument(skip(store))]
#[utoipa::path(
    get,
    path = "/feedback/{id}",
    tag = FEEDBACK_TAG,
    operation_id = "Get Feedback",
    params(("id" = Uuid, Path, description = "Feedback id")),
    responses(
        (status = 200, description = "The feedback", body = Feedback),
        (status = 404, description = "Feedback not found")
    )
)]
async fn get_feedback(
    State(store): State<FeedbackStore>,
    Path(id): Path<Uuid>,
) -> Result<Json<Feedback>, ApiError> {
    store
        .get(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Feedback not found".into()))
}

#[tracing::instrument(skip(store))]
#[utoipa::path(
    delete,
    path = "/feedback/{id}",
    tag = FEEDBACK_TAG,
    operation_id = "Delete Feedback",
    params(("id" = Uuid, Path, description = "Feedback id")),
    responses((status = 204, description = "Deleted, or never existed"))
)]
async fn delete_feedback(State(store): State<FeedbackStore>, Path(id): Path<Uuid>) -> StatusCode {
    let removed = store.delete(id).await;
    tracing::debug!(removed, "Feedback deleted");
    StatusCode::NO_CONTENT
}
