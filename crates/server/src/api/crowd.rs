//! Crowd analysis endpoints.
//!
//! - `POST /analyze` - classify an uploaded compartment photo
//! - `GET /alerts` - every recorded alert, newest first
//! - `GET /uploads/{filename}` - a stored upload

use crate::crowd::uploads::content_type_for;
use crate::crowd::{Alert, AnalyzeMetadata, CrowdAnalyzer, Decision, ImageUpload};
use crate::error::{AnalyzeError, ApiError};
use axum::{
    Json,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartRejection},
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Tag for OpenAPI documentation.
pub const CROWD_TAG: &str = "Crowd Analysis API";

/// Shared state for the crowd endpoints.
#[derive(Clone)]
pub struct CrowdAppState {
    pub analyzer: Arc<CrowdAnalyzer>,
}

/// Multipart body accepted by `/analyze` (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
struct AnalyzeForm {
    /// Compartment photo.
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
    train: Option<String>,
    compartment: Option<String>,
    /// Free text, stored as given.
    lat: Option<String>,
    /// Free text, stored as given.
    lon: Option<String>,
}

/// Creates the crowd analysis router.
#[tracing::instrument(skip(state))]
pub fn router(state: CrowdAppState, max_upload_bytes: usize) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(analyze))
        .routes(routes!(list_alerts))
        .routes(routes!(fetch_upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

fn bad_multipart(e: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(format!("Malformed multipart body: {e}"))
}

/// Pulls the image and optional metadata out of the form. Unknown fields are ignored.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(Option<ImageUpload>, AnalyzeMetadata), ApiError> {
    let mut image = None;
    let mut meta = AnalyzeMetadata::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                // an empty file input still submits a nameless, empty part
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                image = Some(ImageUpload {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            "train" | "compartment" | "lat" | "lon" => {
                let value = field.text().await.map_err(bad_multipart)?;
                let slot = match name.as_str() {
                    "train" => &mut meta.train,
                    "compartment" => &mut meta.compartment,
                    "lat" => &mut meta.lat,
                    _ => &mut meta.lon,
                };
                *slot = Some(value);
            }
            _ => {}
        }
    }
    Ok((image, meta))
}

#[tracing::instrument(skip(state, multipart))]
#[utoipa::path(
    post,
    path = "/analyze",
    tag = CROWD_TAG,
    operation_id = "Analyze Compartment Image",
    summary = "Count people in a photo and classify the compartment",
    description = "Stores the upload, runs the person detector and applies fixed thresholds:\n\n\
                   - fewer than 5 people: `unsafe`, constable dispatched\n\
                   - 5 to 10 people: `unsafe`, constable requested\n\
                   - more than 10 people: `reject`\n\n\
                   Every successful call is recorded as an alert.",
    request_body(content = AnalyzeForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Classification result", body = Decision, content_type = "application/json"),
        (status = 400, description = "No image uploaded", content_type = "application/json", example = json!({"error": "No image uploaded"})),
        (status = 502, description = "Detector failed", content_type = "application/json"),
        (status = 500, description = "Internal server error", content_type = "application/json")
    )
)]
async fn analyze(
    State(state): State<CrowdAppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Decision>, ApiError> {
    let (image, meta) = match multipart {
        Ok(multipart) => read_form(multipart).await?,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Request to /analyze is not multipart");
            return Err(AnalyzeError::MissingInput.into());
        }
    };

    let decision = state.analyzer.analyze(image, meta).await?;
    Ok(Json(decision))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/alerts",
    tag = CROWD_TAG,
    operation_id = "List Alerts",
    summary = "All recorded alerts, newest first",
    responses(
        (status = 200, description = "Alert history", body = [Alert], content_type = "application/json"),
        (status = 500, description = "Alert log unreadable", content_type = "application/json")
    )
)]
async fn list_alerts(State(state): State<CrowdAppState>) -> Result<Json<Vec<Alert>>, ApiError> {
    Ok(Json(state.analyzer.list_alerts().await?))
}

#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/uploads/{filename}",
    tag = CROWD_TAG,
    operation_id = "Fetch Upload",
    params(("filename" = String, Path, description = "Stored name from an alert's `image` field")),
    responses(
        (status = 200, description = "Raw image bytes", content_type = "application/octet-stream"),
        (status = 404, description = "No such upload", content_type = "application/json")
    )
)]
async fn fetch_upload(
    State(state): State<CrowdAppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.analyzer.fetch_image(&filename).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&filename))], bytes))
}
