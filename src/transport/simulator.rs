/// Simulated water-quality probe for running without hardware
use std::collections::VecDeque;

use async_trait::async_trait;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Transport;
use crate::error::AcquisitionError;
use crate::modbus::crc::{append_crc, verify_crc};
use crate::modbus::frame::{FN_READ_HOLDING_REGISTERS, FN_WRITE_SINGLE_REGISTER};
use crate::models::ResponseFormat;

const FORMAT_REGISTER: [u8; 2] = [0x00, 0x05];
const RESPONSE_BYTE_COUNT: u8 = 0x0B;
const SILENCE_TIMEOUT_MS: u64 = 1000;

/// Answers read commands with random but plausible register values
///
/// Follows set-format commands like the real probe, and like the real probe
/// it stays silent on frames with a bad CRC or another slave address.
pub struct SimulatedSensor {
    address: u8,
    format: ResponseFormat,
    pending: VecDeque<u8>,
    rng: StdRng,
}

impl SimulatedSensor {
    pub fn new(address: u8) -> Self {
        Self::with_rng(address, StdRng::from_os_rng())
    }

    #[cfg(test)]
    pub fn with_seed(address: u8, seed: u64) -> Self {
        Self::with_rng(address, StdRng::seed_from_u64(seed))
    }

    fn with_rng(address: u8, rng: StdRng) -> Self {
        SimulatedSensor {
            address,
            format: ResponseFormat::Ph,
            pending: VecDeque::new(),
            rng,
        }
    }

    #[cfg(test)]
    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    fn handle_request(&mut self, request: &[u8]) {
        if let Err(e) = verify_crc(request) {
            debug!("Simulator ignoring request {:02X?}: {}", request, e);
            return;
        }
        if request.len() != 8 || request[0] != self.address {
            return;
        }

        match request[1] {
            FN_WRITE_SINGLE_REGISTER if request[2..4] == FORMAT_REGISTER => {
                self.format = if request[5] == 0x01 {
                    ResponseFormat::Orp
                } else {
                    ResponseFormat::Ph
                };
            }
            FN_READ_HOLDING_REGISTERS => {
                let response = self.build_response();
                self.pending.extend(response);
            }
            _ => {}
        }
    }

    fn build_response(&mut self) -> Vec<u8> {
        let cf: u16 = self.rng.random_range(0..=2000);
        let channel = match self.format {
            ResponseFormat::Ph => self.rng.random_range(600u16..=800).to_be_bytes(),
            ResponseFormat::Orp => {
                let orp: i32 = self.rng.random_range(-300..=300);
                let [hi, lo] = (orp.unsigned_abs() as u16 & 0x3FFF).to_be_bytes();
                [if orp < 0 { hi | 0x40 } else { hi }, lo]
            }
        };
        let relative: u16 = self.rng.random_range(30..=90);
        let temperature: u16 = self.rng.random_range(200..=320);

        let [cf_hi, cf_lo] = cf.to_be_bytes();
        let [re_hi, re_lo] = relative.to_be_bytes();
        let [t_hi, t_lo] = temperature.to_be_bytes();
        append_crc(vec![
            self.address,
            FN_READ_HOLDING_REGISTERS,
            RESPONSE_BYTE_COUNT,
            0x00,
            cf_hi,
            cf_lo,
            channel[0],
            channel[1],
            re_hi,
            re_lo,
            t_hi,
            t_lo,
            0x00,
            0x00,
        ])
    }
}

#[async_trait]
impl Transport for SimulatedSensor {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), AcquisitionError> {
        self.handle_request(bytes);
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, AcquisitionError> {
        if self.pending.is_empty() {
            return Err(AcquisitionError::Timeout(SILENCE_TIMEOUT_MS));
        }
        let count = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }

    fn discard_input(&mut self) -> Result<(), AcquisitionError> {
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::frame::{build_read_command, build_set_format_command};
    use crate::modbus::{decode, issue_read_data, issue_set_response_format};
    use crate::models::FormatValue;

    #[tokio::test]
    async fn answers_read_commands_with_valid_frames() {
        let mut sensor = SimulatedSensor::with_seed(0x01, 7);
        for _ in 0..20 {
            let response = issue_read_data(&mut sensor, 0x01).await.unwrap();
            let reading = decode(&response, ResponseFormat::Ph);

            assert!((0.0..=20.0).contains(&reading.conductivity_factor));
            assert!((30..=90).contains(&reading.relative_value));
            assert!((20.0..=32.0).contains(&reading.temperature));
            match reading.value {
                FormatValue::Ph(ph) => assert!((6.0..=8.0).contains(&ph)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn follows_format_switches() {
        let mut sensor = SimulatedSensor::with_seed(0x01, 11);
        issue_set_response_format(&mut sensor, 0x01, ResponseFormat::Orp)
            .await
            .unwrap();
        assert_eq!(sensor.format(), ResponseFormat::Orp);

        for _ in 0..20 {
            let response = issue_read_data(&mut sensor, 0x01).await.unwrap();
            match decode(&response, ResponseFormat::Orp).value {
                FormatValue::Orp(orp) => assert!((-300..=300).contains(&orp)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn ignores_corrupted_and_foreign_requests() {
        let mut sensor = SimulatedSensor::with_seed(0x01, 3);

        let mut corrupted = build_read_command(0x01);
        corrupted[7] ^= 0x01;
        sensor.write_all(&corrupted).await.unwrap();
        sensor.write_all(&build_read_command(0x02)).await.unwrap();
        sensor
            .write_all(&build_set_format_command(0x02, ResponseFormat::Orp))
            .await
            .unwrap();

        let mut buf = [0u8; 16];
        assert!(matches!(
            sensor.read(&mut buf).await,
            Err(AcquisitionError::Timeout(SILENCE_TIMEOUT_MS))
        ));
        assert_eq!(sensor.format(), ResponseFormat::Ph);
    }
}
