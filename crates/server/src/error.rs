use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the object-detection collaborator.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Detector timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Failed to launch detector `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Detector exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },
    #[error("Detector network error: {0}")]
    Network(String),
    #[error("Detector returned HTTP {0}")]
    Http(hyper::StatusCode),
    #[error("Malformed detector output: {0}")]
    MalformedOutput(String),
    #[error("Invalid detector URL: {0}")]
    InvalidUrl(String),
}

impl DetectorError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DetectorError::Timeout(_) | DetectorError::Network(_) | DetectorError::Http(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Stored file not found: {0}")]
    NotFound(String),
    #[error("Invalid stored file name: {0}")]
    InvalidName(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum AlertLogError {
    #[error("I/O error on alert log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupt alert log {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to encode alert: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("No image uploaded")]
    MissingInput,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    AlertLog(#[from] AlertLogError),
}

#[derive(Debug, Error)]
pub enum StationError {
    #[error("Dataset not loaded")]
    NotLoaded,
    #[error("Failed to read station dataset {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Invalid time value '{0}' in station dataset")]
    InvalidTime(String),
    #[error("Station dataset is missing the '{0}' column")]
    MissingColumn(&'static str),
}

/// Error type returned by HTTP handlers. Renders as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadGateway(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<AnalyzeError> for ApiError {
    fn from(err: AnalyzeError) -> Self {
        match err {
            AnalyzeError::MissingInput => ApiError::BadRequest(err.to_string()),
            AnalyzeError::Detector(e) => ApiError::BadGateway(e.to_string()),
            AnalyzeError::Storage(StorageError::InvalidName(name)) => {
                ApiError::BadRequest(format!("Invalid file name: {name}"))
            }
            other => {
                tracing::error!(
                    name = "api.analyze.failed",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = %other,
                    message = "Crowd analysis failed"
                );
                ApiError::Internal("Internal server error".into())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) | StorageError::InvalidName(_) => {
                ApiError::NotFound("File not found".into())
            }
            StorageError::Io { .. } => {
                tracing::error!(error = %err, "Failed to read stored upload");
                ApiError::Internal("Internal server error".into())
            }
        }
    }
}

impl From<AlertLogError> for ApiError {
    fn from(err: AlertLogError) -> Self {
        tracing::error!(error = %err, "Failed to read alert log");
        ApiError::Internal("Internal server error".into())
    }
}

impl From<StationError> for ApiError {
    fn from(err: StationError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        tracing::error!(error = %err, "Database error");
        ApiError::Internal("Internal server error".into())
    }
}
