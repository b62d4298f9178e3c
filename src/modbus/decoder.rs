/// Register decoding for the water-quality probe
use crate::models::{FormatValue, PartialReading, ResponseFormat};

/// Length of a read-data response, CRC included
pub const RESPONSE_LEN: usize = 16;

const ORP_NEGATIVE_FLAG: u8 = 0x40;
const ORP_MAGNITUDE_MASK: u8 = 0x3F;

/// Decode a CRC-checked read-data response
///
/// The probe answers with four big-endian words at fixed offsets:
/// - Bytes 4-5: conductivity factor (1/100)
/// - Bytes 6-7: pH (1/100) or ORP, depending on the selected format
/// - Bytes 8-9: relative value, humidity channel (1)
/// - Bytes 10-11: temperature (1/10 °C)
///
/// ORP is sign-magnitude: bit 6 of byte 6 flags a negative value and the
/// low six bits of byte 6 together with byte 7 hold the magnitude in mV.
pub fn decode(response: &[u8; RESPONSE_LEN], format: ResponseFormat) -> PartialReading {
    let word = |at: usize| u16::from_be_bytes([response[at], response[at + 1]]);

    let value = match format {
        ResponseFormat::Ph => FormatValue::Ph(f64::from(word(6)) / 100.0),
        ResponseFormat::Orp => {
            let sign = if response[6] & ORP_NEGATIVE_FLAG != 0 { -1 } else { 1 };
            let magnitude =
                (i32::from(response[6] & ORP_MAGNITUDE_MASK) << 8) | i32::from(response[7]);
            FormatValue::Orp(sign * magnitude)
        }
    };

    PartialReading {
        conductivity_factor: f64::from(word(4)) / 100.0,
        relative_value: word(8),
        temperature: f64::from(word(10)) / 10.0,
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PH_RESPONSE: [u8; RESPONSE_LEN] = [
        0x01, 0x03, 0x0B, 0x00, 0x00, 0x64, 0x02, 0xBB, 0x00, 0x0A, 0x00, 0x64, 0x00, 0x00, 0x82,
        0x16,
    ];
    const NEGATIVE_ORP_RESPONSE: [u8; RESPONSE_LEN] = [
        0x01, 0x03, 0x0B, 0x00, 0x00, 0xC8, 0x40, 0x96, 0x00, 0x37, 0x00, 0xFA, 0x00, 0x00, 0x5B,
        0xD1,
    ];

    #[test]
    fn decodes_ph_response() {
        let reading = decode(&PH_RESPONSE, ResponseFormat::Ph);

        assert_eq!(reading.conductivity_factor, 1.0);
        assert_eq!(reading.value, FormatValue::Ph(6.99));
        assert_eq!(reading.relative_value, 10);
        assert_eq!(reading.temperature, 10.0);
    }

    #[test]
    fn decodes_negative_orp() {
        let reading = decode(&NEGATIVE_ORP_RESPONSE, ResponseFormat::Orp);

        assert_eq!(reading.conductivity_factor, 2.0);
        assert_eq!(reading.value, FormatValue::Orp(-150));
        assert_eq!(reading.relative_value, 55);
        assert_eq!(reading.temperature, 25.0);
    }

    #[test]
    fn decodes_positive_orp() {
        let mut response = NEGATIVE_ORP_RESPONSE;
        response[6] = 0x00;
        assert_eq!(
            decode(&response, ResponseFormat::Orp).value,
            FormatValue::Orp(150)
        );
    }

    #[test]
    fn orp_ignores_the_top_status_bit() {
        let mut response = NEGATIVE_ORP_RESPONSE;
        response[6] = 0xC1;
        assert_eq!(
            decode(&response, ResponseFormat::Orp).value,
            FormatValue::Orp(-((0x01 << 8) | 0x96))
        );
    }

    #[test]
    fn same_bytes_decode_differently_per_format() {
        let as_ph = decode(&NEGATIVE_ORP_RESPONSE, ResponseFormat::Ph);
        assert_eq!(as_ph.value, FormatValue::Ph(f64::from(0x4096u16) / 100.0));
        assert_eq!(
            decode(&PH_RESPONSE, ResponseFormat::Ph),
            decode(&PH_RESPONSE, ResponseFormat::Ph)
        );
    }
}
