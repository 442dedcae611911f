//! Stream framing
//!
//! ```text
//! [4 bytes: length (big-endian u32)][N bytes: payload]
//! ```
//!
//! Used unchanged for stream ingestion and stream delivery.

use crate::ContractError;

/// Length prefix size (4 bytes, big-endian u32)
pub const FRAME_HEADER_LEN: usize = 4;

/// Default maximum payload accepted on a stream connection (16MB)
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Largest payload a single UDP datagram can carry
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Encode the length prefix for a payload of `len` bytes.
#[inline]
pub fn encode_header(len: u32) -> [u8; FRAME_HEADER_LEN] {
    len.to_be_bytes()
}

/// Decode a length prefix.
#[inline]
pub fn decode_header(header: [u8; FRAME_HEADER_LEN]) -> u32 {
    u32::from_be_bytes(header)
}

/// Reject lengths above `max` before anything is allocated for them.
pub fn check_frame_len(len: u32, max: u32) -> Result<(), ContractError> {
    if len > max {
        return Err(ContractError::FrameTooLarge {
            len: u64::from(len),
            max: u64::from(max),
        });
    }
    Ok(())
}
