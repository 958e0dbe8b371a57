// src/common/checksum.rs

use super::error::Error;

/// Calculates the 8-bit additive checksum over a complete frame.
///
/// Both sensor families stamp their frames with the truncated sum of every
/// byte except the last, which is reserved for the checksum itself. The sum
/// always walks the full range; there is no early exit. This is resilience
/// against line noise, not a security primitive.
///
/// # Arguments
///
/// * `frame`: The complete frame buffer, including the trailing checksum
///   byte (which is excluded from the sum).
///
/// # Returns
///
/// The truncated 8-bit sum of `frame[..len - 1]`.
#[inline]
pub fn additive_checksum(frame: &[u8]) -> u8 {
    let data_len = frame.len().saturating_sub(1);
    frame[..data_len]
        .iter()
        .fold(0u8, |sum, b| sum.wrapping_add(*b))
}

/// Verifies the trailing additive checksum of a length-complete frame.
///
/// # Returns
///
/// * `Ok(())` if the trailing byte matches the computed sum.
/// * `Err(Error::ChecksumMismatch)` otherwise, carrying both values for
///   diagnostics.
pub fn verify_frame(frame: &[u8]) -> Result<(), Error> {
    let calculated = additive_checksum(frame);
    let expected = match frame.last() {
        Some(b) => *b,
        None => return Err(Error::ChecksumMismatch { expected: 0, calculated }),
    };

    if calculated == expected {
        Ok(())
    } else {
        Err(Error::ChecksumMismatch { expected, calculated })
    }
}
