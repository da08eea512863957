//! Append-only alert log.
//!
//! One JSON object per line, oldest first. Writers are serialized by a single
//! lock; readers never take it and reverse the file on the way out so callers
//! always see newest first. A trailing line without a newline is a write in
//! progress and is skipped; the next append cuts it off before writing.
//!
//! Files in the older format (one JSON array, newest first) are still read,
//! and are rewritten as JSON lines the first time something is appended.

use crate::crowd::classifier::SafetyTier;
use crate::error::AlertLogError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use utoipa::ToSchema;

/// A persisted crowd-analysis decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    /// Unix timestamp (seconds) of the request; doubles as the id.
    pub id: i64,
    pub time: i64,
    #[serde(default)]
    pub train: String,
    #[serde(default)]
    pub compartment: String,
    /// Stored exactly as submitted.
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lon: String,
    pub people_count: u32,
    /// `"unsafe"` or `"reject"`.
    pub status: String,
    /// Distinguishes the two unsafe tiers. Absent in records from older logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<SafetyTier>,
    pub message: String,
    /// Stored upload name, fetchable from `/uploads/{image}`.
    pub image: String,
}

#[derive(Debug)]
pub struct AlertLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

enum Layout {
    Empty,
    Lines,
    LegacyArray,
}

fn layout_of(raw: &[u8]) -> Layout {
    match raw.iter().find(|b| !b.is_ascii_whitespace()) {
        None => Layout::Empty,
        Some(b'[') => Layout::LegacyArray,
        Some(_) => Layout::Lines,
    }
}

impl AlertLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn io_err(&self, source: std::io::Error) -> AlertLogError {
        AlertLogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Creates the parent directory and an empty log if none exists.
    pub async fn init(&self) -> Result<(), AlertLogError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_err(e))?;
        }
        tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        Ok(())
    }

    async fn read_raw(&self) -> Result<Vec<u8>, AlertLogError> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(self.io_err(e)),
        }
    }

    /// Parses a log image into records in file order (oldest first).
    fn parse(&self, raw: &[u8]) -> Result<Vec<Alert>, AlertLogError> {
        match layout_of(raw) {
            Layout::Empty => Ok(Vec::new()),
            Layout::LegacyArray => {
                let mut alerts: Vec<Alert> =
                    serde_json::from_slice(raw).map_err(|source| AlertLogError::Corrupt {
                        path: self.path.clone(),
                        source,
                    })?;
                alerts.reverse();
                Ok(alerts)
            }
            Layout::Lines => {
                let complete = raw.ends_with(b"\n");
                let lines: Vec<&[u8]> = raw.split(|b| *b == b'\n').collect();
                let last = lines.len() - 1;
                let mut alerts = Vec::with_capacity(lines.len());
                for (i, line) in lines.into_iter().enumerate() {
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    match serde_json::from_slice::<Alert>(line) {
                        Ok(alert) => alerts.push(alert),
                        Err(_) if i == last && !complete => {
                            tracing::debug!(
                                path = %self.path.display(),
                                "Skipping partially written alert record"
                            );
                        }
                        Err(source) => {
                            return Err(AlertLogError::Corrupt {
                                path: self.path.clone(),
                                source,
                            });
                        }
                    }
                }
                Ok(alerts)
            }
        }
    }

    /// All alerts, newest first.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn list(&self) -> Result<Vec<Alert>, AlertLogError> {
        let raw = self.read_raw().await?;
        let mut alerts = self.parse(&raw)?;
        alerts.reverse();
        Ok(alerts)
    }

    /// Rewrites an array-format log as JSON lines. Caller holds the write lock.
    async fn migrate_legacy(&self, raw: &[u8]) -> Result<(), AlertLogError> {
        let alerts = self.parse(raw)?;
        let mut out = Vec::with_capacity(raw.len());
        for alert in &alerts {
            serde_json::to_writer(&mut out, alert)?;
            out.push(b'\n');
        }
        let tmp = self.path.with_extension("jsonl.tmp");
        tokio::fs::write(&tmp, &out)
            .await
            .map_err(|e| self.io_err(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        tracing::info!(
            path = %self.path.display(),
            records = alerts.len(),
            "Converted alert log to line format"
        );
        Ok(())
    }

    /// Cuts a partially written last record so the next append starts on a
    /// line boundary. Caller holds the write lock.
    async fn drop_torn_tail(&self, raw: &[u8]) -> Result<(), AlertLogError> {
        let keep = raw
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |i| i + 1);
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        file.set_len(keep as u64).await.map_err(|e| self.io_err(e))?;
        tracing::warn!(
            path = %self.path.display(),
            dropped_bytes = raw.len() - keep,
            "Discarded partially written alert record"
        );
        Ok(())
    }

    /// Records one alert. Appends are serialized; nothing already written is rewritten.
    #[tracing::instrument(skip(self, alert), fields(alert_id = alert.id))]
    pub async fn append(&self, alert: &Alert) -> Result<(), AlertLogError> {
        let mut line = serde_json::to_vec(alert)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;

        let raw = self.read_raw().await?;
        match layout_of(&raw) {
            Layout::LegacyArray => self.migrate_legacy(&raw).await?,
            Layout::Lines if !raw.ends_with(b"\n") => self.drop_torn_tail(&raw).await?,
            _ => {}
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_err(e))?;
        file.write_all(&line).await.map_err(|e| self.io_err(e))?;
        file.flush().await.map_err(|e| self.io_err(e))?;
        Ok(())
    }
}
