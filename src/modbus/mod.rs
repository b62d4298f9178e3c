pub mod crc;
pub mod decoder;
pub mod frame;

pub use crc::CrcError;
pub use decoder::decode;
pub use frame::{issue_read_data, issue_set_response_format};
