//! HTTP handler tests for API endpoints.
//!
//! Drives the full router the binary serves, with a fake detector, a
//! temporary storage directory and an in-memory SQLite event log.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use migration::{Migrator, MigratorTrait};
use safarguard::{
    AppResources,
    api::{ApiState, CrowdAppState, StationAppState, build_router},
    config::{AppConfig, DetectorConfig, StationsConfig, StorageConfig},
    crowd::{AlertLog, CrowdAnalyzer, Detection, Detector, UploadStore},
    error::DetectorError,
    feedback::FeedbackStore,
    stations::StationDataset,
};
use sea_orm::Database;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tempfile::TempDir;

const STATIONS_CSV: &str = "\
Station,Time,Crowd_Level,Safety_Rating
Dadar,08:30,9,2.5
Andheri,09:15,8,3
Dadar,18:45,10,2
Churchgate,07:00,4,4.5
";

enum Behaviour {
    People(usize),
    Fail,
}

struct FakeDetector(Behaviour);

#[async_trait]
impl Detector for FakeDetector {
    async fn detect(&self, _image: &Path) -> Result<Vec<Detection>, DetectorError> {
        match self.0 {
            Behaviour::People(n) => Ok((0..n).map(|_| Detection::new("person")).collect()),
            Behaviour::Fail => Err(DetectorError::Timeout(std::time::Duration::from_secs(30))),
        }
    }

    fn kind(&self) -> &'static str {
        "fake"
    }
}

fn test_config(dir: &Path, static_dir: Option<PathBuf>) -> AppConfig {
    AppConfig {
        bind_addr: "127.0.0.1:0".parse().expect("addr"),
        database_url: "sqlite::memory:".into(),
        run_migrations: true,
        storage: StorageConfig {
            upload_dir: dir.join("uploads"),
            alerts_file: dir.join("alerts.json"),
            max_upload_bytes: 1024 * 1024,
        },
        detector: DetectorConfig::default(),
        stations: StationsConfig {
            csv_path: dir.join("stations.csv"),
        },
        static_dir,
    }
}

struct Harness {
    server: TestServer,
    _dir: TempDir,
}

async fn harness_with(behaviour: Behaviour, with_stations: bool, with_static: bool) -> Harness {
    let dir = TempDir::new().expect("tempdir");

    let static_dir = if with_static {
        let web = dir.path().join("web");
        std::fs::create_dir_all(&web).expect("create web dir");
        std::fs::write(web.join("index.html"), "<h1>SafarGuard</h1>").expect("write index");
        std::fs::write(web.join("admin.html"), "<h1>Admin</h1>").expect("write admin");
        Some(web)
    } else {
        None
    };
    let config = Arc::new(test_config(dir.path(), static_dir));

    if with_stations {
        std::fs::write(&config.stations.csv_path, STATIONS_CSV).expect("write csv");
    }
    let dataset = StationDataset::load(&config.stations.csv_path).expect("load stations");

    let db = Database::connect(&config.database_url).await.expect("connect");
    Migrator::up(&db, None).await.expect("migrate");

    let next = Arc::new(AtomicI64::new(1_700_000_000));
    let analyzer = CrowdAnalyzer::new(
        UploadStore::new(&config.storage.upload_dir),
        AlertLog::new(&config.storage.alerts_file),
        Arc::new(FakeDetector(behaviour)),
        false,
    )
    .with_clock(Arc::new(move || next.fetch_add(1, Ordering::SeqCst)));
    analyzer.init().await.expect("init analyzer");

    let state = ApiState {
        crowd: CrowdAppState {
            analyzer: Arc::new(analyzer),
        },
        stations: StationAppState {
            dataset: Arc::new(dataset),
        },
        feedback: FeedbackStore::new(),
        resources: AppResources {
            db: Arc::new(db),
            config,
        },
    };

    let server = TestServer::new(build_router(state)).expect("create test server");
    Harness { server, _dir: dir }
}

async fn harness(people: usize) -> Harness {
    harness_with(Behaviour::People(people), true, false).await
}

fn image_form(name: &str, bytes: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        "image",
        Part::bytes(bytes.to_vec())
            .file_name(name)
            .mime_type("image/jpeg"),
    )
}

// =============================================================================
// Health and docs
// =============================================================================

#[tokio::test]
async fn test_healthz() {
    let h = harness(1).await;
    let response = h.server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn test_api_docs_served() {
    let h = harness(1).await;
    let response = h.server.get("/api-docs").await;
    response.assert_status_ok();
    assert!(response.text().contains("redoc"));
}

// =============================================================================
// /analyze
// =============================================================================

#[tokio::test]
async fn test_analyze_classifies_upload() {
    let h = harness(3).await;

    let form = image_form("coach.jpg", b"\xff\xd8\xff").add_text("train", "Virar Fast");
    let response = h.server.post("/analyze").multipart(form).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["people_count"], 3);
    assert_eq!(body["status"], "unsafe");
    assert_eq!(
        body["message"],
        "🚨 Unsafe: Only 3 person(s). Constable dispatched."
    );
    assert_eq!(body["alert_id"], 1_700_000_000i64);
}

#[tokio::test]
async fn test_analyze_crowded_compartment_rejected() {
    let h = harness(11).await;
    let response = h
        .server
        .post("/analyze")
        .multipart(image_form("c.jpg", b"x"))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "reject");
    assert_eq!(body["message"], "❌ Crowded: 11 people. Request rejected.");
}

#[tokio::test]
async fn test_analyze_without_image_part() {
    let h = harness(3).await;
    let form = MultipartForm::new().add_text("train", "Virar Fast");
    let response = h.server.post("/analyze").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({"error": "No image uploaded"}));

    let alerts: Value = h.server.get("/alerts").await.json();
    assert_eq!(alerts, json!([]));
}

#[tokio::test]
async fn test_analyze_without_multipart_body() {
    let h = harness(3).await;
    let response = h.server.post("/analyze").json(&json!({"image": "x"})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({"error": "No image uploaded"}));
}

#[tokio::test]
async fn test_analyze_empty_file_input_counts_as_missing() {
    let h = harness(3).await;
    let form = MultipartForm::new().add_part("image", Part::bytes(Vec::new()).file_name(""));
    let response = h.server.post("/analyze").multipart(form).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_detector_failure_is_bad_gateway() {
    let h = harness_with(Behaviour::Fail, true, false).await;
    let response = h
        .server
        .post("/analyze")
        .multipart(image_form("a.jpg", b"x"))
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert!(body["error"].as_str().is_some());

    let alerts: Value = h.server.get("/alerts").await.json();
    assert_eq!(alerts, json!([]));
}

// =============================================================================
// /alerts and /uploads
// =============================================================================

#[tokio::test]
async fn test_alerts_newest_first_with_metadata() {
    let h = harness(7).await;

    for train in ["first", "second"] {
        let form = image_form("a.jpg", b"x")
            .add_text("train", train)
            .add_text("compartment", "D4")
            .add_text("lat", "19.07")
            .add_text("lon", "72.87");
        h.server.post("/analyze").multipart(form).await.assert_status_ok();
    }

    let response = h.server.get("/alerts").await;
    response.assert_status_ok();
    let alerts: Vec<Value> = response.json();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0]["train"], "second");
    assert_eq!(alerts[1]["train"], "first");
    assert_eq!(alerts[0]["compartment"], "D4");
    assert_eq!(alerts[0]["lat"], "19.07");
    assert_eq!(alerts[0]["lon"], "72.87");
    assert_eq!(alerts[0]["people_count"], 7);
    assert_eq!(alerts[0]["status"], "unsafe");
    assert_eq!(alerts[0]["id"], alerts[0]["time"]);
}

#[tokio::test]
async fn test_uploaded_image_can_be_fetched() {
    let h = harness(2).await;
    let bytes: Vec<u8> = (0..=255u8).collect();
    h.server
        .post("/analyze")
        .multipart(image_form("cam 1.png", &bytes))
        .await
        .assert_status_ok();

    let alerts: Vec<Value> = h.server.get("/alerts").await.json();
    let stored = alerts[0]["image"].as_str().expect("image name").to_string();
    assert!(stored.ends_with("_cam_1.png"));

    let response = h.server.get(&format!("/uploads/{stored}")).await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), bytes.as_slice());
    assert_eq!(response.header("content-type"), "image/png");
}

#[tokio::test]
async fn test_unknown_upload_is_not_found() {
    let h = harness(2).await;
    let response = h.server.get("/uploads/123_missing.jpg").await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({"error": "File not found"}));
}

#[tokio::test]
async fn test_upload_traversal_is_rejected() {
    let h = harness(2).await;
    let response = h.server.get("/uploads/..%2Falerts.json").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// Stations
// =============================================================================

#[tokio::test]
async fn test_list_stations_sorted_unique() {
    let h = harness(1).await;
    let response = h.server.get("/api/stations").await;
    response.assert_status_ok();
    response.assert_json(&json!(["Andheri", "Churchgate", "Dadar"]));
}

#[tokio::test]
async fn test_station_analysis_case_insensitive() {
    let h = harness(1).await;
    let response = h
        .server
        .get("/api/station_analysis")
        .add_query_param("name", "dAdAr")
        .await;
    response.assert_status_ok();
    let rows: Vec<Value> = response.json();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["station"], "Dadar");
    assert_eq!(rows[0]["hour"], 8);
    assert_eq!(rows[0]["Crowd_Level"], 9);
    assert_eq!(rows[0]["Safety_Rating"], 2.5);
    assert_eq!(rows[1]["hour"], 18);
}

#[tokio::test]
async fn test_station_analysis_requires_name() {
    let h = harness(1).await;
    let response = h.server.get("/api/station_analysis").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({"error": "A 'name' parameter is required."}));
}

#[tokio::test]
async fn test_station_analysis_unknown_station() {
    let h = harness(1).await;
    let response = h
        .server
        .get("/api/station_analysis")
        .add_query_param("name", "Atlantis")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({"error": "Station 'Atlantis' not found."}));
}

#[tokio::test]
async fn test_stations_without_dataset() {
    let h = harness_with(Behaviour::People(1), false, false).await;
    let response = h.server.get("/api/stations").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({"error": "Dataset not loaded"}));

    let response = h
        .server
        .get("/api/station_analysis")
        .add_query_param("name", "Dadar")
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// Feedback
// =============================================================================

#[tokio::test]
async fn test_feedback_crud() {
    let h = harness(1).await;

    let response = h
        .server
        .post("/feedback")
        .json(&json!({"type": "thumbs_up", "message": "clean coach"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Value = response.json();
    let id = created["id"].as_str().expect("id").to_string();
    assert_eq!(created["type"], "thumbs_up");

    let listed: Vec<Value> = h.server.get("/feedback").await.json();
    assert_eq!(listed.len(), 1);

    let fetched = h.server.get(&format!("/feedback/{id}")).await;
    fetched.assert_status_ok();
    fetched.assert_json(&created);

    h.server
        .delete(&format!("/feedback/{id}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    // deleting again is still fine
    h.server
        .delete(&format!("/feedback/{id}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let missing = h.server.get(&format!("/feedback/{id}")).await;
    missing.assert_status(StatusCode::NOT_FOUND);
    missing.assert_json(&json!({"error": "Feedback not found"}));
}

#[tokio::test]
async fn test_feedback_keeps_client_id() {
    let h = harness(1).await;
    let id = "6f1c2d7e-8a4b-4c3d-9e2f-1a2b3c4d5e6f";
    let response = h
        .server
        .post("/feedback")
        .json(&json!({"id": id, "type": "star"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["id"], id);
    assert_eq!(body["message"], Value::Null);
}

#[tokio::test]
async fn test_feedback_rejects_unknown_type() {
    let h = harness(1).await;
    let response = h
        .server
        .post("/feedback")
        .json(&json!({"type": "meh"}))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_events_logged_and_filtered() {
    let h = harness(1).await;

    for (user, event) in [("asha", "login"), ("ravi", "login"), ("asha", "SOS")] {
        let response = h
            .server
            .post("/api/events")
            .json(&json!({"username": user, "event": event}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["username"], user);
        assert_eq!(body["event"], event);
        assert!(body["timestamp"].as_str().is_some());
    }

    let all: Vec<Value> = h.server.get("/api/events").await.json();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0]["event"], "SOS");

    let asha: Vec<Value> = h
        .server
        .get("/api/events")
        .add_query_param("username", "asha")
        .await
        .json();
    assert_eq!(asha.len(), 2);
    assert!(asha.iter().all(|e| e["username"] == "asha"));
    assert_eq!(asha[0]["event"], "SOS");
    assert_eq!(asha[1]["event"], "login");
}

#[tokio::test]
async fn test_events_require_fields() {
    let h = harness(1).await;
    let response = h
        .server
        .post("/api/events")
        .json(&json!({"username": "  ", "event": "login"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({"error": "username and event are required"}));
}

// =============================================================================
// Static pages
// =============================================================================

#[tokio::test]
async fn test_static_pages_served_when_configured() {
    let h = harness_with(Behaviour::People(1), true, true).await;

    let index = h.server.get("/").await;
    index.assert_status_ok();
    assert!(index.text().contains("SafarGuard"));

    let admin = h.server.get("/admin").await;
    admin.assert_status_ok();
    assert!(admin.text().contains("Admin"));

    // API routes still win over the fallback
    h.server.get("/healthz").await.assert_text("ok");
}

#[tokio::test]
async fn test_no_static_pages_by_default() {
    let h = harness(1).await;
    h.server
        .get("/")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
