use config::{Config, Environment, File};
use sea_orm_migration::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    // DATABASE_URL wins; otherwise fall back to the server's config file.
    if env::var("DATABASE_URL").is_err() {
        let settings = Config::builder()
            .add_source(File::with_name("config.yaml").required(false))
            .add_source(Environment::default().separator("__"))
            .build()
            .expect("Failed to read migration configuration");
        match settings.get_string("database_url") {
            Ok(url) => env::set_var("DATABASE_URL", url),
            Err(_) => {
                eprintln!("No database_url configured; set DATABASE_URL or config.yaml");
                std::process::exit(1);
            }
        }
    }
    cli::run_cli(migration::Migrator).await;
}
