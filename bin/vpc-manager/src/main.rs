use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vpc_core::{JsonFileStore, ManagerConfig, VpcManager};
use vpc_simulator::SimulatedCloud;

mod cli;

use cli::Cli;

const SNAPSHOT_FILE: &str = "cloud.json";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = ManagerConfig::from_env()?;
    let store = JsonFileStore::new(cli.state_dir.join(&config.table_name));
    info!(
        "Starting vpc-manager (table {} at {}, table region {}, default region {})",
        config.table_name,
        store.table_dir().display(),
        config.db_region,
        config.default_region
    );

    let snapshot = cli.state_dir.join(SNAPSHOT_FILE);
    let cloud = SimulatedCloud::load(&snapshot).await?;
    let manager = VpcManager::new(Arc::new(cloud.clone()), Arc::new(store))
        .with_retry_policy(config.retry.clone());

    let outcome = cli::run(&manager, &config, cli.command).await;

    // Provider-side state is kept even when the command failed part way
    if let Err(e) = cloud.save(&snapshot).await {
        warn!("Could not save simulator state: {}", e);
    }

    let output = outcome?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
