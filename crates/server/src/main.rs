use migration::{Migrator, MigratorTrait};
use safarguard::AppResources;
use safarguard::api::{ApiState, CrowdAppState, StationAppState, start_webserver};
use safarguard::config::load_config_or_panic;
use safarguard::crowd::detector::build_detector;
use safarguard::crowd::{AlertLog, CrowdAnalyzer, UploadStore};
use safarguard::feedback::FeedbackStore;
use safarguard::stations::StationDataset;
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "safarguard=info,tower_http=info,hyper=warn,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    initialize_tracing();

    let config = Arc::new(load_config_or_panic());

    // Event log database
    let db = Arc::new(Database::connect(&config.database_url).await?);
    if config.run_migrations {
        Migrator::up(db.as_ref(), None).await?;
        tracing::info!("Event log migrations applied");
    }

    // Crowd analysis
    let detector = build_detector(&config.detector)?;
    tracing::info!(
        kind = detector.kind(),
        timeout_secs = config.detector.timeout_secs,
        treat_failure_as_empty = config.detector.treat_failure_as_empty,
        "detector configuration"
    );
    let analyzer = CrowdAnalyzer::new(
        UploadStore::new(&config.storage.upload_dir),
        AlertLog::new(&config.storage.alerts_file),
        detector,
        config.detector.treat_failure_as_empty,
    );
    analyzer.init().await?;

    let dataset = StationDataset::load(&config.stations.csv_path)?;
    if dataset.is_loaded() && dataset.is_empty() {
        tracing::warn!(
            path = %config.stations.csv_path.display(),
            "Station dataset has no usable rows"
        );
    }

    let resources = AppResources {
        db,
        config: config.clone(),
    };

    let state = ApiState {
        crowd: CrowdAppState {
            analyzer: Arc::new(analyzer),
        },
        stations: StationAppState {
            dataset: Arc::new(dataset),
        },
        feedback: FeedbackStore::new(),
        resources,
    };

    start_webserver(state).await?;
    Ok(())
}
