//! The object-detection collaborator.
//!
//! Detection itself happens outside this process: either a local program
//! (for example a YOLO wrapper script) or a detection service reachable over
//! plain HTTP. Both must answer with a JSON array of detections, or an object
//! with a `detections` array:
//!
//! ```json
//! [{"label": "person", "bbox": [12.0, 40.5, 88.0, 210.0], "confidence": 0.91}]
//! ```
//!
//! Only the label is used for classification.

use crate::config::{DetectorConfig, DetectorKind};
use crate::error::DetectorError;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Uri};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};

const MAX_STDERR_CHARS: usize = 512;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(alias = "class_label", alias = "class", alias = "name")]
    pub label: String,
    /// Usually `[x1, y1, x2, y2]` in image pixels. Not used for counting, so
    /// any shape (or none) is accepted.
    #[serde(default, alias = "box", alias = "bounding_box")]
    pub bbox: Option<Vec<f32>>,
    #[serde(default, alias = "score", alias = "conf")]
    pub confidence: Option<f32>,
}

impl Detection {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bbox: None,
            confidence: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectorOutput {
    List(Vec<Detection>),
    Wrapped { detections: Vec<Detection> },
}

/// Parses detector output in either accepted shape.
pub fn parse_detections(raw: &[u8]) -> Result<Vec<Detection>, DetectorError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| DetectorError::MalformedOutput(format!("output is not UTF-8: {e}")))?;
    if text.trim().is_empty() {
        return Err(DetectorError::MalformedOutput("empty output".into()));
    }
    match serde_json::from_str::<DetectorOutput>(text.trim()) {
        Ok(DetectorOutput::List(d)) | Ok(DetectorOutput::Wrapped { detections: d }) => Ok(d),
        Err(e) => Err(DetectorError::MalformedOutput(e.to_string())),
    }
}

#[async_trait]
pub trait Detector: Send + Sync {
    /// Runs detection on an image already written to disk.
    async fn detect(&self, image: &Path) -> Result<Vec<Detection>, DetectorError>;

    /// Short name for logs.
    fn kind(&self) -> &'static str;
}

/// Runs `program args... <image path>` and reads detections from stdout.
#[derive(Clone, Debug)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

#[async_trait]
impl Detector for CommandDetector {
    #[tracing::instrument(name = "detector.command", skip(self), fields(program = %self.program))]
    async fn detect(&self, image: &Path) -> Result<Vec<Detection>, DetectorError> {
        let child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DetectorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DetectorError::Timeout(self.timeout))?
            .map_err(|source| DetectorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr: String = String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();
            return Err(DetectorError::ExitStatus {
                status: output.status.to_string(),
                stderr,
            });
        }

        let detections = parse_detections(&output.stdout)?;
        tracing::debug!(count = detections.len(), "Detector finished");
        Ok(detections)
    }

    fn kind(&self) -> &'static str {
        "command"
    }
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    path: &'a str,
}

/// POSTs `{"path": "<image>"}` to a detection service over plain HTTP/1.1.
#[derive(Clone, Debug)]
pub struct HttpDetector {
    uri: Uri,
    addr: String,
    host_header: String,
    timeout: Duration,
}

impl HttpDetector {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, DetectorError> {
        let uri: Uri = url
            .parse()
            .map_err(|e| DetectorError::InvalidUrl(format!("{url}: {e}")))?;
        if uri.scheme_str() != Some("http") {
            return Err(DetectorError::InvalidUrl(format!(
                "{url}: only http:// is supported"
            )));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| DetectorError::InvalidUrl(format!("{url}: missing host")))?;
        let port = authority.port_u16().unwrap_or(80);
        let addr = format!("{}:{port}", authority.host());
        let host_header = authority.as_str().to_string();
        Ok(Self {
            uri,
            addr,
            host_header,
            timeout,
        })
    }

    async fn post(&self, image: &Path) -> Result<Vec<Detection>, DetectorError> {
        let path = image.to_string_lossy();
        let body = serde_json::to_vec(&DetectRequest { path: &path })
            .map_err(|e| DetectorError::MalformedOutput(e.to_string()))?;

        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;
        tokio::task::spawn(async move {
            if let Err(err) = conn.await {
                tracing::debug!(
                    name = "detector.http.connection_ended",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = ?err,
                    message = "Detector connection task ended"
                );
            }
        });

        let path_and_query = self
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        let req = Request::post(path_and_query)
            .header(hyper::header::HOST, &self.host_header)
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .header(hyper::header::USER_AGENT, "safarguard/0.1")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| DetectorError::Network(e.to_string()))?;

        let response = sender
            .send_request(req)
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| DetectorError::Network(e.to_string()))?
            .to_bytes();

        if !status.is_success() {
            return Err(DetectorError::Http(status));
        }
        parse_detections(&bytes)
    }
}

#[async_trait]
impl Detector for HttpDetector {
    #[tracing::instrument(name = "detector.http", skip(self), fields(addr = %self.addr))]
    async fn detect(&self, image: &Path) -> Result<Vec<Detection>, DetectorError> {
        let detections = timeout(self.timeout, self.post(image))
            .await
            .map_err(|_| DetectorError::Timeout(self.timeout))??;
        tracing::debug!(count = detections.len(), "Detector finished");
        Ok(detections)
    }

    fn kind(&self) -> &'static str {
        "http"
    }
}

/// Builds the configured detector.
pub fn build_detector(config: &DetectorConfig) -> Result<Arc<dyn Detector>, DetectorError> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.kind {
        DetectorKind::Command => Ok(Arc::new(CommandDetector::new(
            config.command.clone(),
            config.args.clone(),
            timeout,
        ))),
        DetectorKind::Http => {
            let url = config
                .url
                .as_deref()
                .ok_or_else(|| DetectorError::InvalidUrl("detector.url is not set".into()))?;
            Ok(Arc::new(HttpDetector::new(url, timeout)?))
        }
    }
}
