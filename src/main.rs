mod acquisition;
mod broadcast;
mod config;
mod error;
mod modbus;
mod models;
mod reporting;
mod state;
mod storage;
mod transport;
mod utils;

use log::{error, info};
use std::process::ExitCode;
use tokio::sync::watch;

use acquisition::{Acquisition, AcquisitionSettings};
use broadcast::UdpBroadcaster;
use config::SensorConfig;
use reporting::{announce_loop, report_loop};
use state::SharedState;
use storage::CsvLog;
use transport::open_transport;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match SensorConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Without the transport no reading can ever be produced
    let transport = match open_transport(&config) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Fatal: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let state = SharedState::new(config.window_capacity);
    let broadcaster = UdpBroadcaster::new(config.udp_target);
    let csv_log = CsvLog::new(&config.csv_path, config.rotation, config.csv_header);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    info!(
        "Starting water quality relay: device {} -> {}, logging to {}",
        config.device_address,
        config.udp_target,
        config.csv_path.display()
    );

    let mut acquisition = Acquisition::new(
        transport,
        AcquisitionSettings::from(&config),
        state.clone(),
    );
    let acquisition_rx = shutdown_rx.clone();
    let mut acquisition_task = tokio::spawn(async move { acquisition.run(acquisition_rx).await });

    let reporting_task = tokio::spawn(report_loop(
        state,
        broadcaster.clone(),
        csv_log,
        config.report_interval,
        shutdown_rx.clone(),
    ));

    let announce_task = config.announce_message.clone().map(|message| {
        tokio::spawn(announce_loop(
            broadcaster,
            message,
            config.announce_delay,
            config.announce_interval,
            shutdown_rx,
        ))
    });

    // Run until acquisition ends or the user interrupts
    let outcome = tokio::select! {
        result = &mut acquisition_task => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Program terminated by user. Exiting gracefully.");
            None
        }
    };

    let _ = shutdown_tx.send(true);
    let outcome = match outcome {
        Some(result) => result,
        None => acquisition_task.await,
    };

    let exit_code = match outcome {
        Ok(Ok(cycles)) => {
            info!("Data collection completed after {} cycles", cycles);
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Acquisition task failed: {}", e);
            ExitCode::FAILURE
        }
    };

    if let Err(e) = reporting_task.await {
        error!("Reporting task failed: {}", e);
    }
    if let Some(task) = announce_task {
        if let Err(e) = task.await {
            error!("Announcement task failed: {}", e);
        }
    }

    Ok(exit_code)
}
