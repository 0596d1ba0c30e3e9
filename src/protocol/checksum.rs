//! # Frame Checksum
//!
//! CRC-8 (polynomial `x^8 + x^2 + x + 1`, i.e. `0x07`, init 0, no reflection,
//! no final XOR) over the data payload of a frame.
//!
//! The printer validates this byte and silently drops frames that fail, so it
//! must be computed over the payload only. Header bytes are never included.
//!
//! ## Algorithm
//!
//! ```text
//! crc = 0
//! for byte in data:
//!     crc = TABLE[crc ^ byte]
//! ```

/// Generator polynomial (without the implicit x^8 term).
pub const POLYNOMIAL: u8 = 0x07;

/// 256-entry lookup table for [`POLYNOMIAL`], built at compile time.
pub const CRC8_TABLE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Compute the frame checksum of `data`.
///
/// ## Example
///
/// ```
/// use catprint::protocol::checksum::checksum;
///
/// assert_eq!(checksum(&[]), 0x00);
/// assert_eq!(checksum(b"123456789"), 0xF4);
/// ```
#[inline]
pub fn checksum(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}
