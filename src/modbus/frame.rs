/// Request framing and response exchange over a transport
use log::debug;
use std::io::ErrorKind;

use super::crc::{append_crc, verify_crc};
use super::decoder::RESPONSE_LEN;
use crate::error::AcquisitionError;
use crate::models::ResponseFormat;
use crate::transport::Transport;

pub const FN_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FN_WRITE_SINGLE_REGISTER: u8 = 0x06;

const DATA_START_REGISTER: u16 = 0x0000;
const DATA_REGISTER_COUNT: u16 = 4;
const FORMAT_REGISTER: u16 = 0x0005;

fn build_request(address: u8, function: u8, register: u16, value: u16) -> Vec<u8> {
    let [reg_hi, reg_lo] = register.to_be_bytes();
    let [val_hi, val_lo] = value.to_be_bytes();
    append_crc(vec![address, function, reg_hi, reg_lo, val_hi, val_lo])
}

/// Read four holding registers starting at 0x0000
pub fn build_read_command(address: u8) -> Vec<u8> {
    build_request(
        address,
        FN_READ_HOLDING_REGISTERS,
        DATA_START_REGISTER,
        DATA_REGISTER_COUNT,
    )
}

/// Select whether register 1 carries pH or ORP
pub fn build_set_format_command(address: u8, format: ResponseFormat) -> Vec<u8> {
    build_request(
        address,
        FN_WRITE_SINGLE_REGISTER,
        FORMAT_REGISTER,
        format.register_value(),
    )
}

/// Read until exactly `count` bytes have arrived
///
/// There is no timeout here; each underlying read is bounded by the
/// transport's own timeout and any error ends the exchange. A read of zero
/// bytes means the link reached end of file and fails the exchange too.
pub async fn read_exact(
    transport: &mut dyn Transport,
    count: usize,
) -> Result<Vec<u8>, AcquisitionError> {
    let mut data = vec![0u8; count];
    let mut received = 0;
    while received < count {
        let read = transport.read(&mut data[received..]).await?;
        if read == 0 {
            return Err(AcquisitionError::TransportIo(ErrorKind::UnexpectedEof.into()));
        }
        received += read;
    }
    Ok(data)
}

/// Request the data registers and return the CRC-checked response
pub async fn issue_read_data(
    transport: &mut dyn Transport,
    address: u8,
) -> Result<[u8; RESPONSE_LEN], AcquisitionError> {
    let command = build_read_command(address);
    transport.discard_input()?;
    transport.write_all(&command).await?;

    let bytes = read_exact(transport, RESPONSE_LEN).await?;
    debug!("Response: {:02X?}", bytes);
    verify_crc(&bytes)?;

    let mut response = [0u8; RESPONSE_LEN];
    response.copy_from_slice(&bytes);
    Ok(response)
}

/// Switch the response format; the instrument does not acknowledge this
pub async fn issue_set_response_format(
    transport: &mut dyn Transport,
    address: u8,
    format: ResponseFormat,
) -> Result<(), AcquisitionError> {
    let command = build_set_format_command(address, format);
    transport.discard_input()?;
    transport.write_all(&command).await?;
    debug!("Requested {:?} format: {:02X?}", format, command);
    Ok(())
}
