mod bluetooth;
mod config;
mod error;
mod models;
mod osc;
mod utils;

use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bluetooth::scanner::{self, MatchCriteria};
use bluetooth::telemetry;
use config::RelayConfig;
use error::RelayError;
use osc::client::OscClient;
use osc::relay::OscRelay;

async fn run_relay(config: RelayConfig, cancel: CancellationToken) -> Result<(), RelayError> {
    // Bring up the radio
    let session = bluer::Session::new().await?;
    let adapter = session
        .default_adapter()
        .await
        .map_err(|_| RelayError::NoAdapter)?;
    adapter.set_powered(true).await?;

    // Find the target sensor
    let criteria = MatchCriteria {
        address: config.device_address,
        name: config.device_name.clone(),
    };
    let found = scanner::discover(&adapter, &criteria, config.scan_timeout, &cancel).await?;
    let device = match found {
        Some(device) => device,
        None if cancel.is_cancelled() => return Ok(()),
        None => return Err(RelayError::DeviceNotFound),
    };

    info!("Device: {}", device.name);
    info!("Address: {}", device.address);

    let peripheral = telemetry::connect(&adapter, device.address).await?;
    info!("Connected!");

    let characteristic = telemetry::heart_rate_characteristic(&peripheral).await?;

    // Stream samples into the relay through a bounded channel
    let (tx, rx) = mpsc::channel(telemetry::SAMPLE_CHANNEL_CAPACITY);
    let stream_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = telemetry::stream_heart_rate(characteristic, tx, stream_cancel).await {
            error!("Heart-rate stream failed: {}", e);
        }
    });

    let client = OscClient::connect(config.osc_target).await?;
    let relay = OscRelay::new(client, config.min_hr, config.max_hr);

    info!("Sending OSC data to {}", config.osc_target);
    info!("Min HR: {}", config.min_hr);
    info!("Max HR: {}", config.max_hr);
    info!("Press Ctrl+C to exit");

    relay.run(rx, cancel).await;

    if let Err(e) = peripheral.disconnect().await {
        warn!("Failed to disconnect cleanly: {}", e);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match RelayConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // One cancellation signal shared by discovery, telemetry, and relay
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            signal_cancel.cancel();
        }
    });

    match run_relay(config, cancel).await {
        Ok(()) => {
            info!("Relay stopped");
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {}", e);
            Err(e.into())
        }
    }
}
