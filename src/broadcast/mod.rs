pub mod udp;

pub use udp::UdpBroadcaster;

use crate::models::Snapshot;

/// Status line shown on the remote display
///
/// pH and ORP are the rolling means, everything else the latest reading.
pub fn format_status(snapshot: &Snapshot) -> String {
    let r = &snapshot.reading;
    format!(
        "EC: {:.2} mS/cm | TDS: {:.2} ppm | CF: {:.2} CF | pH: {:.2} pH | ORP: {:.1} mV | Humidity: {} % | Temp: {:.1} C",
        r.ec,
        r.tds,
        r.conductivity_factor,
        snapshot.average_ph,
        snapshot.average_orp,
        r.relative_value,
        r.temperature
    )
}
