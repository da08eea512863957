use goose::prelude::*;
use std::env;

async fn health_check(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/healthz").await?;
    Ok(())
}

async fn list_alerts(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/alerts").await?;
    Ok(())
}

async fn list_stations(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/api/stations").await?;
    Ok(())
}

async fn station_analysis(user: &mut GooseUser) -> TransactionResult {
    let station = env::var("STATION_NAME").unwrap_or_else(|_| "Dadar".to_string());
    let path = format!("/api/station_analysis?name={station}");
    let _goose_metrics = user.get(&path).await?;
    Ok(())
}

async fn submit_feedback(user: &mut GooseUser) -> TransactionResult {
    let body = serde_json::json!({"type": "thumbs_up", "message": "loadtest"});
    let _goose_metrics = user.post_json("/feedback", &body).await?;
    Ok(())
}

async fn list_feedback(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/feedback").await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    println!(
        "Station name for analysis calls: {}",
        env::var("STATION_NAME").unwrap_or_else(|_| "Dadar".to_string())
    );

    GooseAttack::initialize()?
        .register_scenario(
            scenario!("HealthCheck").register_transaction(transaction!(health_check)),
        )
        .register_scenario(
            scenario!("Dashboard")
                .register_transaction(transaction!(list_alerts))
                .register_transaction(transaction!(list_stations))
                .register_transaction(transaction!(station_analysis)),
        )
        .register_scenario(
            scenario!("Feedback")
                .register_transaction(transaction!(submit_feedback))
                .register_transaction(transaction!(list_feedback)),
        )
        .execute()
        .await?;

    Ok(())
}
