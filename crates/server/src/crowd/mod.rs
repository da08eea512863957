//! Crowd safety classification.
//!
//! An upload is saved, handed to the detector, the people in it are counted
//! and the count is classified. Every successful analysis leaves an [`Alert`]
//! in the [`AlertLog`].

pub mod alert_log;
pub mod classifier;
pub mod detector;
pub mod uploads;

pub use alert_log::{Alert, AlertLog};
pub use classifier::{SafetyTier, classify, count_people};
pub use detector::{Detection, Detector};
pub use uploads::UploadStore;

use crate::error::{AlertLogError, AnalyzeError, StorageError};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Optional metadata sent alongside an image. Stored verbatim.
#[derive(Clone, Debug, Default)]
pub struct AnalyzeMetadata {
    pub train: Option<String>,
    pub compartment: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
}

/// The image part of an analysis request.
#[derive(Clone, Debug)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// What `/analyze` answers with.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Decision {
    pub people_count: u32,
    /// `"unsafe"` or `"reject"`.
    pub status: String,
    pub message: String,
    pub alert_id: i64,
}

impl From<&Alert> for Decision {
    fn from(alert: &Alert) -> Self {
        Self {
            people_count: alert.people_count,
            status: alert.status.clone(),
            message: alert.message.clone(),
            alert_id: alert.id,
        }
    }
}

/// Source of request timestamps. Swappable so tests can pin time.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| OffsetDateTime::now_utc().unix_timestamp())
}

pub struct CrowdAnalyzer {
    uploads: UploadStore,
    alerts: AlertLog,
    detector: Arc<dyn Detector>,
    treat_failure_as_empty: bool,
    clock: Clock,
}

impl CrowdAnalyzer {
    pub fn new(
        uploads: UploadStore,
        alerts: AlertLog,
        detector: Arc<dyn Detector>,
        treat_failure_as_empty: bool,
    ) -> Self {
        Self {
            uploads,
            alerts,
            detector,
            treat_failure_as_empty,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Prepares the upload directory and the alert log.
    pub async fn init(&self) -> Result<(), AnalyzeError> {
        self.uploads.init().await?;
        self.alerts.init().await?;
        Ok(())
    }

    /// Saves the image, counts people in it, classifies and records the result.
    #[tracing::instrument(
        skip(self, image, meta),
        fields(
            detector = self.detector.kind(),
            people_count = tracing::field::Empty,
            status = tracing::field::Empty
        )
    )]
    pub async fn analyze(
        &self,
        image: Option<ImageUpload>,
        meta: AnalyzeMetadata,
    ) -> Result<Decision, AnalyzeError> {
        let image = image.ok_or(AnalyzeError::MissingInput)?;

        let ts = (self.clock)();
        let (stored, path) = self.uploads.save(ts, &image.filename, &image.bytes).await?;

        let detections = match self.detector.detect(&path).await {
            Ok(d) => d,
            Err(e) if self.treat_failure_as_empty => {
                tracing::warn!(
                    name = "crowd.analyze.detector_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = %e,
                    retryable = e.is_retryable(),
                    message = "Detector failed; counting zero people"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::error!(
                    name = "crowd.analyze.detector_failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = %e,
                    retryable = e.is_retryable(),
                    stored = %stored,
                    message = "Detector failed"
                );
                // no alert will reference it
                if let Err(cleanup) = self.uploads.remove(&stored).await {
                    tracing::warn!(
                        error = %cleanup,
                        stored = %stored,
                        "Failed to remove orphaned upload"
                    );
                }
                return Err(e.into());
            }
        };

        let people_count = count_people(detections.iter().map(|d| d.label.as_str()));
        let tier = classify(people_count);

        let alert = Alert {
            id: ts,
            time: ts,
            train: meta.train.unwrap_or_default(),
            compartment: meta.compartment.unwrap_or_default(),
            lat: meta.lat.unwrap_or_default(),
            lon: meta.lon.unwrap_or_default(),
            people_count,
            status: tier.status().to_string(),
            tier: Some(tier),
            message: tier.message(people_count),
            image: stored,
        };
        self.alerts.append(&alert).await?;

        let span = tracing::Span::current();
        span.record("people_count", people_count);
        span.record("status", alert.status.as_str());
        tracing::info!(
            alert_id = alert.id,
            tier = ?tier,
            detections = detections.len(),
            "Crowd analysis complete"
        );

        Ok(Decision::from(&alert))
    }

    /// Every recorded alert, newest first.
    pub async fn list_alerts(&self) -> Result<Vec<Alert>, AlertLogError> {
        self.alerts.list().await
    }

    /// Bytes of a stored upload.
    pub async fn fetch_image(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.uploads.fetch(name).await
    }
}
