//! OpenAPI/Utoipa configuration.

use crate::api::{
    crowd::CROWD_TAG, events::EVENTS_TAG, feedback::FEEDBACK_TAG, health::MISC_TAG,
    stations::STATIONS_TAG,
};
use utoipa::OpenApi;

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SafarGuard API",
        version = "1.0.0",
        description = "Crowd safety classification, station crowd data, feedback and event logging."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = CROWD_TAG, description = "Compartment crowd analysis and alerts"),
        (name = STATIONS_TAG, description = "Station crowd and safety dataset"),
        (name = FEEDBACK_TAG, description = "Commuter feedback"),
        (name = EVENTS_TAG, description = "Commuter event log")
    )
)]
pub struct ApiDoc;
