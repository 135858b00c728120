use log::{error, info, warn};
use std::sync::Arc;

use sensor_bridge::bluetooth::{advertisement_stream, open_adapter};
use sensor_bridge::{BridgeController, BridgeError, BridgeInfo, LogBridge, SensorConfiguration};

async fn run_bridge(controller: &BridgeController) -> Result<(), BridgeError> {
    let adapter = open_adapter().await?;
    let events = advertisement_stream(&adapter).await?;
    controller.run(events).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize logging, RUST_LOG overrides the default level
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration, an unreadable file means an empty allow-list
    let config_path = SensorConfiguration::path_from_env();
    let mut config = SensorConfiguration::load_or_default(&config_path);
    if let Err(e) = config.apply_env_overrides() {
        warn!("Ignoring environment overrides: {}", e);
    }

    let bridge = Arc::new(LogBridge::new(BridgeInfo::from(&config)));
    let controller = BridgeController::new(config, bridge);
    let watchdog = controller.spawn_watchdog();

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        let _ = tx.send(());
    });

    // Run the bridge or wait for shutdown signal
    let result = tokio::select! {
        result = run_bridge(&controller) => result,
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
            Ok(())
        }
    };

    watchdog.abort();

    if let Err(e) = result {
        error!("Fatal error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
