use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Where uploads and the alert log live on disk.
#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_alerts_file")]
    pub alerts_file: PathBuf,
    /// Upper bound for a multipart `/analyze` body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            alerts_file: default_alerts_file(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Spawn a local program per image and read detections from stdout.
    #[default]
    Command,
    /// POST the image path to a detection service.
    Http,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub kind: DetectorKind,
    /// Program to run for [`DetectorKind::Command`]. The image path is appended to `args`.
    #[serde(default = "default_detector_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Endpoint for [`DetectorKind::Http`], e.g. `http://127.0.0.1:9000/detect`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_detector_timeout_secs")]
    pub timeout_secs: u64,
    /// Legacy behaviour: count a failed detector call as zero people instead of failing the request.
    #[serde(default)]
    pub treat_failure_as_empty: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: DetectorKind::default(),
            command: default_detector_command(),
            args: Vec::new(),
            url: None,
            timeout_secs: default_detector_timeout_secs(),
            treat_failure_as_empty: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StationsConfig {
    #[serde(default = "default_station_csv")]
    pub csv_path: PathBuf,
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            csv_path: default_station_csv(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    pub database_url: String,
    /// Apply pending event-log migrations on startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    /// Directory with the UI shell pages. Served as a fallback when set.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_true() -> bool {
    true
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_alerts_file() -> PathBuf {
    PathBuf::from("alerts.json")
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_detector_command() -> String {
    "yolo-detect".to_string()
}

fn default_detector_timeout_secs() -> u64 {
    30
}

fn default_station_csv() -> PathBuf {
    PathBuf::from("mumbai_local.csv")
}

impl AppConfig {
    /// Checks invariants the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database_url must not be empty".into(),
            ));
        }
        if self.detector.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "detector.timeout_secs must be > 0".into(),
            ));
        }
        match self.detector.kind {
            DetectorKind::Command if self.detector.command.trim().is_empty() => {
                return Err(ConfigError::Validation(
                    "detector.command is required for the command detector".into(),
                ));
            }
            DetectorKind::Http => {
                let Some(url) = self.detector.url.as_deref() else {
                    return Err(ConfigError::Validation(
                        "detector.url is required for the http detector".into(),
                    ));
                };
                if !url.starts_with("http://") {
                    return Err(ConfigError::Validation(format!(
                        "detector.url must be a plain http:// URL, got {url}"
                    )));
                }
            }
            _ => {}
        }
        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "storage.max_upload_bytes must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any variable matching the key path separated by double underscores
/// (e.g. `DETECTOR__TIMEOUT_SECS`) overrides the file value. `DATABASE_URL`
/// works as-is, so connection strings never have to live in the file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from("config.yaml")
}

/// Same as [`load_config`] but with an explicit file path. The file is optional.
pub fn load_config_from(path: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::default().separator("__").try_parsing(true))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
