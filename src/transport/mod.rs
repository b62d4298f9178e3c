/// Byte transports carrying Modbus-RTU frames
pub mod serial;
pub mod simulator;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use log::info;

use crate::config::SensorConfig;
use crate::error::AcquisitionError;

pub use serial::SerialTransport;
pub use simulator::SimulatedSensor;

/// Duplex byte link to the instrument
#[async_trait]
pub trait Transport: Send {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), AcquisitionError>;

    /// Read whatever is available into `buf`, waiting at most the
    /// transport's read timeout
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AcquisitionError>;

    /// Drop any bytes received but not yet read
    fn discard_input(&mut self) -> Result<(), AcquisitionError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), AcquisitionError> {
        (**self).write_all(bytes).await
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AcquisitionError> {
        (**self).read(buf).await
    }

    fn discard_input(&mut self) -> Result<(), AcquisitionError> {
        (**self).discard_input()
    }
}

/// Open the transport selected by the configuration
pub fn open_transport(config: &SensorConfig) -> Result<Box<dyn Transport>, AcquisitionError> {
    if config.simulate_sensor {
        info!("Using simulated sensor at address {}", config.device_address);
        return Ok(Box::new(SimulatedSensor::new(config.device_address)));
    }

    let transport = SerialTransport::open(
        &config.serial_port,
        config.baud_rate,
        config.serial_timeout,
    )?;
    info!(
        "Opened serial port {} @ {} baud",
        config.serial_port, config.baud_rate
    );
    Ok(Box::new(transport))
}
