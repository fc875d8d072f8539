use anyhow::Result;
use clap::Parser;

use parcel_crawler_lib::cli::CliArgs;
use parcel_crawler_lib::infrastructure::config::{ConfigManager, ConfigSource};
use parcel_crawler_lib::infrastructure::logging::init_logging_with_config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let (mut config, source) = manager.load_or_create().await?;
    args.apply(&mut config);

    init_logging_with_config(&config.logging)?;
    match source {
        ConfigSource::Loaded => info!("Loaded configuration from: {:?}", manager.config_path()),
        ConfigSource::CreatedDefault => {
            info!("Configuration file not found, created default: {:?}", manager.config_path())
        }
    }

    parcel_crawler_lib::run(config).await?;
    Ok(())
}
