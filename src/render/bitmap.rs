//! # Bitmap Row Packing
//!
//! Converts one row of dithered greyscale pixels into the packed bytes carried
//! by a `DrawBitmap` frame.
//!
//! ## Bit Packing
//!
//! - 8 horizontal pixels per byte
//! - 1 = black (print dot), 0 = white (no dot); a pixel is black when its
//!   dithered value is exactly 0
//! - [`BitOrder::MsbFirst`]: bit 7 = leftmost pixel
//! - [`BitOrder::LsbFirst`]: bit 0 = leftmost pixel
//!
//! ```text
//! MsbFirst  0xF0 = 11110000 = ████░░░░
//! LsbFirst  0xF0 = 11110000 = ░░░░████
//! ```
//!
//! Rows whose width is not a multiple of 8 are padded with white pixels on
//! the right inside the last byte.

use serde::{Deserialize, Serialize};

/// Order of pixels inside a packed byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    /// Leftmost pixel in the most significant bit
    #[default]
    MsbFirst,
    /// Leftmost pixel in the least significant bit
    LsbFirst,
}

/// Pack `width` pixels of a greyscale row, most significant bit first.
///
/// ## Example
///
/// ```
/// use catprint::render::bitmap::pack_row;
///
/// let row = [0, 0, 0, 0, 255, 255, 255, 255];
/// assert_eq!(pack_row(&row, 8), vec![0xF0]);
///
/// // 12 pixels pack into 2 bytes (4 bits padding)
/// assert_eq!(pack_row(&[0; 12], 12), vec![0xFF, 0xF0]);
/// ```
pub fn pack_row(row: &[u8], width: usize) -> Vec<u8> {
    pack_row_with(row, width, BitOrder::MsbFirst)
}

/// Pack `width` pixels of a greyscale row in the given bit order.
///
/// Pixels past the end of `row` count as white.
pub fn pack_row_with(row: &[u8], width: usize, order: BitOrder) -> Vec<u8> {
    let mut bytes = vec![0u8; width.div_ceil(8)];

    for (i, &pixel) in row.iter().take(width).enumerate() {
        if pixel == 0 {
            let bit = match order {
                BitOrder::MsbFirst => 7 - (i % 8),
                BitOrder::LsbFirst => i % 8,
            };
            bytes[i / 8] |= 1 << bit;
        }
    }

    bytes
}
