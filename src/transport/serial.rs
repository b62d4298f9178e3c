use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Duration;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use super::Transport;
use crate::error::AcquisitionError;

/// Serial line at 8N1 with a per-read timeout
pub struct SerialTransport {
    stream: SerialStream,
    read_timeout: Duration,
}

impl SerialTransport {
    pub fn open(
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self, AcquisitionError> {
        let stream = tokio_serial::new(port, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .timeout(read_timeout)
            .open_native_async()
            .map_err(|e| AcquisitionError::TransportOpen {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        Ok(SerialTransport {
            stream,
            read_timeout,
        })
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), AcquisitionError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AcquisitionError> {
        match tokio::time::timeout(self.read_timeout, self.stream.read(buf)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AcquisitionError::Timeout(self.read_timeout.as_millis() as u64)),
        }
    }

    fn discard_input(&mut self) -> Result<(), AcquisitionError> {
        self.stream
            .clear(ClearBuffer::Input)
            .map_err(|e| AcquisitionError::TransportIo(e.into()))
    }
}
