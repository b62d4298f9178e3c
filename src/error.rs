use thiserror::Error;

use crate::modbus::CrcError;

/// Failures of the acquisition side
///
/// Only `TransportOpen` is fatal; every other variant costs a single cycle.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to open transport {port}: {reason}")]
    TransportOpen { port: String, reason: String },
    #[error("transport I/O error: {0}")]
    TransportIo(#[from] std::io::Error),
    #[error("no response within {0} ms")]
    Timeout(u64),
    #[error("invalid response: {0}")]
    Crc(#[from] CrcError),
}
