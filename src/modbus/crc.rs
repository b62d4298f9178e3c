/// Modbus-RTU CRC-16 computation and verification
use thiserror::Error;

const CRC_INIT: u16 = 0xFFFF;
const CRC_POLYNOMIAL: u16 = 0xA001; // 0x8005 reflected

/// Failure to validate the checksum trailing a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CrcError {
    /// `expected` is what the frame carries, `computed` what its bytes hash to
    #[error("CRC 0x{computed:04X} does not match 0x{expected:04X}")]
    Mismatch { expected: u16, computed: u16 },
    #[error("frame of {0} bytes is too short to carry a CRC")]
    TooShort(usize),
}

/// Compute the CRC-16/MODBUS of `count` bytes of `data` starting at `offset`
///
/// Bits are processed LSB first. The range is clamped to the end of `data`,
/// so an oversized `count` hashes whatever bytes are available.
pub fn compute_crc16(data: &[u8], offset: usize, count: usize) -> u16 {
    let end = offset.saturating_add(count).min(data.len());
    let start = offset.min(end);

    let mut crc = CRC_INIT;
    for byte in &data[start..end] {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Append the CRC of `frame` to it, low byte first
pub fn append_crc(mut frame: Vec<u8>) -> Vec<u8> {
    let crc = compute_crc16(&frame, 0, frame.len());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Check the trailing two bytes of `frame` against the CRC of the rest
pub fn verify_crc(frame: &[u8]) -> Result<(), CrcError> {
    if frame.len() < 2 {
        return Err(CrcError::TooShort(frame.len()));
    }

    let body_len = frame.len() - 2;
    let expected = u16::from_le_bytes([frame[body_len], frame[body_len + 1]]);
    let computed = compute_crc16(frame, 0, body_len);

    if expected != computed {
        return Err(CrcError::Mismatch { expected, computed });
    }
    Ok(())
}
