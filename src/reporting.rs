/// Periodic broadcast and logging of the averaged readings
use log::{error, info};
use tokio::sync::watch;
use tokio::time::Duration;

use crate::broadcast::{format_status, UdpBroadcaster};
use crate::models::{LogRecord, Snapshot};
use crate::state::SharedState;
use crate::storage::{AppendOutcome, CsvLog};
use crate::utils::sleep_or_shutdown;

/// Snapshot the state once, then send and log it
///
/// The lock is released before any I/O. Send and log failures are logged
/// and never propagate.
pub async fn report_once(
    state: &SharedState,
    broadcaster: &UdpBroadcaster,
    log: &CsvLog,
) -> Snapshot {
    let snapshot = state.snapshot().await;

    let message = format_status(&snapshot);
    match broadcaster.send(&message).await {
        Ok(_) => info!("Data sent to {}: {}", broadcaster.target(), message),
        Err(e) => error!("{}", e),
    }

    match log.append(&LogRecord::from(&snapshot)).await {
        Ok(AppendOutcome::Appended) => info!("Data saved to {}", log.path().display()),
        Ok(AppendOutcome::Rotated { evicted }) => info!(
            "Evicted {} oldest records and appended to {}",
            evicted,
            log.path().display()
        ),
        Err(e) => error!("Error saving data: {}", e),
    }

    snapshot
}

/// Report immediately, then every `interval` until shutdown
pub async fn report_loop(
    state: SharedState,
    broadcaster: UdpBroadcaster,
    log: CsvLog,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let snapshot = report_once(&state, &broadcaster, &log).await;
        info!(
            "Averages over {} pH / {} ORP samples; {} cycles ok, {} failed ({} CRC)",
            snapshot.ph_samples,
            snapshot.orp_samples,
            snapshot.stats.succeeded,
            snapshot.stats.failed,
            snapshot.stats.crc_failures
        );

        if sleep_or_shutdown(interval, &mut shutdown).await {
            break;
        }
    }
    info!("Reporting stopped");
}

/// Send a fixed message after `delay`, then every `interval`
pub async fn announce_loop(
    broadcaster: UdpBroadcaster,
    message: String,
    delay: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    if sleep_or_shutdown(delay, &mut shutdown).await {
        return;
    }
    loop {
        match broadcaster.send(&message).await {
            Ok(_) => info!("Additional message sent: {}", message),
            Err(e) => error!("{}", e),
        }
        if sleep_or_shutdown(interval, &mut shutdown).await {
            break;
        }
    }
}
