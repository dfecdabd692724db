use std::fs;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;

mod models;
mod repositories;
pub mod services;
pub mod settings;
pub mod utils;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "pulse.toml")]
    config: String,
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_logging(&args.log4rs).expect("Failed to initialize logging.");
    log::info!("Starting PulseConnect.");

    let config = settings::Settings::new(&args.config).expect("Could not load config file.");
    let conn = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .connect(&config.postgres.url)
        .await
        .expect("Could not connect to database.");

    sqlx::migrate!("./migrations")
        .run(&conn)
        .await
        .expect("Could not run database migrations.");

    log::info!("Starting services.");
    services::start_services(conn, config, &args.listen).await?;

    Ok(())
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
