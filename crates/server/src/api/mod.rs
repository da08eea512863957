//! HTTP surface.
//!
//! - `crowd` - `/analyze`, `/alerts`, `/uploads/{filename}`
//! - `stations` - `/api/stations`, `/api/station_analysis`
//! - `feedback` - `/feedback`, `/feedback/{id}`
//! - `events` - `/api/events`
//! - `health` - `/healthz`
//! - `openapi` - OpenAPI/Utoipa configuration, rendered at `/api-docs`

pub mod crowd;
pub mod events;
pub mod feedback;
pub mod health;
pub mod openapi;
pub mod stations;

pub use crowd::CrowdAppState;
pub use stations::StationAppState;

use crate::AppResources;
use crate::feedback::FeedbackStore;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Everything the router needs, built once at startup.
#[derive(Clone)]
pub struct ApiState {
    pub crowd: CrowdAppState,
    pub stations: StationAppState,
    pub feedback: FeedbackStore,
    pub resources: AppResources,
}

/// Assembles the full application router.
#[tracing::instrument(skip(state))]
pub fn build_router(state: ApiState) -> axum::Router {
    let config = state.resources.config.clone();

    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(crowd::router(
            state.crowd,
            config.storage.max_upload_bytes,
        ))
        .merge(stations::router(state.stations))
        .merge(feedback::router(state.feedback))
        .merge(events::router())
        .routes(routes!(health::health))
        .layer(axum::Extension(state.resources))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    let mut router = router.merge(Redoc::with_url("/api-docs", api));

    if let Some(dir) = config.static_dir.as_ref() {
        tracing::info!(dir = %dir.display(), "Serving UI pages");
        router = router
            .route_service("/admin", ServeFile::new(dir.join("admin.html")))
            .fallback_service(ServeDir::new(dir));
    }

    router
}

/// Binds the configured address and serves until the process exits.
#[tracing::instrument(skip(state))]
pub async fn start_webserver(state: ApiState) -> color_eyre::Result<()> {
    let addr = state.resources.config.bind_addr;
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
