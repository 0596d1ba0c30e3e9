//! # Floyd-Steinberg Error Diffusion
//!
//! Binarizes a greyscale buffer for the 1-bit print head while preserving
//! perceived tone.
//!
//! ## Algorithm
//!
//! Pixels are visited once, in strict row-major order. Each pixel is
//! thresholded at 128 and the quantization error is pushed onto the
//! neighbours that have not been visited yet:
//!
//! ```text
//!              ┌───────┬───────┐
//!              │   *   │ 7/16  │
//!      ┌───────┼───────┼───────┤
//!      │ 3/16  │ 5/16  │ 1/16  │
//!      └───────┴───────┴───────┘
//! ```
//!
//! Later pixels read error injected by earlier ones, so the pass is
//! inherently sequential. Accumulated values saturate at 0 and 255 after
//! every addition (rounding half to even), exactly like an 8-bit clamped
//! buffer.
//!
//! An already-binarized buffer (every pixel 0 or 255) has zero quantization
//! error everywhere, so dithering it again leaves it unchanged.

/// Values below this become black.
pub const THRESHOLD: u8 = 128;

/// Quantize one pixel to black (0) or white (255).
#[inline]
pub fn quantize(value: u8) -> u8 {
    if value < THRESHOLD { 0 } else { 255 }
}

/// Dither `pixels` (row-major, `width * height` bytes) in place.
///
/// ## Example
///
/// ```
/// use catprint::render::dither::floyd_steinberg;
///
/// let mut pixels = vec![100u8; 16 * 16];
/// floyd_steinberg(&mut pixels, 16, 16);
/// assert!(pixels.iter().all(|&p| p == 0 || p == 255));
/// ```
pub fn floyd_steinberg(pixels: &mut [u8], width: usize, height: usize) {
    debug_assert_eq!(pixels.len(), width * height);

    for y in 0..height {
        for x in 0..width {
            let index = y * width + x;
            let old = pixels[index];
            let new = quantize(old);
            pixels[index] = new;

            let error = old as i16 - new as i16;
            if error == 0 {
                continue;
            }

            let has_right = x + 1 < width;
            let has_below = y + 1 < height;

            if has_right {
                diffuse(pixels, index + 1, error, 7);
            }
            if has_below && x > 0 {
                diffuse(pixels, index + width - 1, error, 3);
            }
            if has_below {
                diffuse(pixels, index + width, error, 5);
            }
            if has_right && has_below {
                diffuse(pixels, index + width + 1, error, 1);
            }
        }
    }
}

#[inline]
fn diffuse(pixels: &mut [u8], index: usize, error: i16, weight: i16) {
    let value = pixels[index] as f32 + (error * weight) as f32 / 16.0;
    pixels[index] = value.round_ties_even().clamp(0.0, 255.0) as u8;
}

/// Whether every pixel is already pure black or pure white.
pub fn is_binary(pixels: &[u8]) -> bool {
    pixels.iter().all(|&p| p == 0 || p == 255)
}

// ============================================================================
// TESTS
// ============================================================================
