//! # Image Preparation
//!
//! Turns an arbitrary decoded image into a dithered raster exactly as wide as
//! the print head.
//!
//! ## Pipeline
//!
//! ```text
//! source ─► fit width ─► rotate 180° + greyscale ─► pad to width ─► dither
//! ```
//!
//! 1. **Downscale** (Lanczos3) images wider than the target to exactly the
//!    target width, height `round(h * target / w)`.
//! 2. **Upscale** images narrower than half the target by the largest whole
//!    multiple that still fits, with nearest-neighbour sampling so pixel art
//!    keeps hard edges.
//! 3. **Rotate 180°** (paper comes out upside-down relative to the source)
//!    and convert to single-channel greyscale. Transparent pixels are
//!    composited onto white first.
//! 4. **Pad** left and right with white to the exact target width; an odd
//!    remainder puts the extra pixel on the right.
//! 5. **Dither** with Floyd-Steinberg (see [`super::dither`]).
//!
//! Each step is a pure function; the only mutable state is the scratch buffer
//! the dither pass works on.

use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbaImage, imageops, imageops::FilterType};
use std::io::Cursor;

use super::dither::floyd_steinberg;
use crate::error::PrinterError;

/// A dithered raster ready for the job compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    /// Width in pixels (always the print width after [`prepare`])
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Row-major pixels, each 0 (black) or 255 (white)
    pub pixels: Vec<u8>,
    /// Integer upscale factor applied in step 2 (1 when not upscaled)
    pub scale: u32,
}

impl PreparedImage {
    /// Wrap an already-dithered buffer.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, PrinterError> {
        if pixels.len() != width as usize * height as usize {
            return Err(PrinterError::Image(format!(
                "pixel buffer holds {} bytes, expected {}x{}",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            scale: 1,
        })
    }

    /// Iterate rows top to bottom, in device orientation.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.pixels.chunks(self.width.max(1) as usize)
    }

    /// The raster as it reads on paper (rotation undone).
    pub fn to_preview(&self) -> Result<GrayImage, PrinterError> {
        let image = GrayImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| PrinterError::Image("pixel buffer does not match dimensions".into()))?;
        Ok(imageops::rotate180(&image))
    }

    /// PNG-encoded preview of the raster as it reads on paper.
    pub fn to_png(&self) -> Result<Vec<u8>, PrinterError> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(self.to_preview()?)
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| PrinterError::Image(format!("Failed to encode PNG: {}", e)))?;
        Ok(out.into_inner())
    }
}

/// Run the full pipeline for one image.
///
/// ## Example
///
/// ```
/// use catprint::render::prepare::prepare;
/// use image::{DynamicImage, GrayImage, Luma};
///
/// let source = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 20, Luma([0])));
/// let prepared = prepare(&source, 384).unwrap();
/// assert_eq!((prepared.width, prepared.height, prepared.scale), (384, 60, 3));
/// ```
pub fn prepare(image: &DynamicImage, target_width: u32) -> Result<PreparedImage, PrinterError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PrinterError::Image("image has no pixels".into()));
    }
    if target_width == 0 {
        return Err(PrinterError::Image("target width must be positive".into()));
    }

    let (fitted, scale) = fit_width(image, target_width);
    let grey = rotate_greyscale(&fitted);
    let padded = pad_to_width(grey, target_width);

    let (width, height) = padded.dimensions();
    let mut pixels = padded.into_raw();
    floyd_steinberg(&mut pixels, width as usize, height as usize);

    Ok(PreparedImage {
        width,
        height,
        pixels,
        scale,
    })
}

/// Steps 1-2: bring the width into `[target/2, target]`.
///
/// Returns the resized image and the integer upscale factor (1 when the
/// image was downscaled or left alone).
pub fn fit_width(image: &DynamicImage, target_width: u32) -> (DynamicImage, u32) {
    let (width, height) = (image.width(), image.height());

    if width > target_width {
        let scaled_height = (height as f64 * target_width as f64 / width as f64).round() as u32;
        let resized = image.resize_exact(target_width, scaled_height.max(1), FilterType::Lanczos3);
        return (resized, 1);
    }

    if width < target_width / 2 {
        let factor = target_width / width;
        let resized = image.resize_exact(width * factor, height * factor, FilterType::Nearest);
        return (resized, factor);
    }

    (image.clone(), 1)
}

/// Step 3: rotate 180° and flatten to greyscale over white.
pub fn rotate_greyscale(image: &DynamicImage) -> GrayImage {
    let mut rgba: RgbaImage = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            let over_white = |c: u8| ((c as u32 * a as u32 + 255 * (255 - a as u32)) / 255) as u8;
            pixel.0 = [over_white(r), over_white(g), over_white(b), 255];
        }
    }
    let grey = DynamicImage::ImageRgba8(rgba).to_luma8();
    imageops::rotate180(&grey)
}

/// Step 4: centre on a white canvas `target_width` wide.
///
/// Images already at least that wide are returned unchanged.
pub fn pad_to_width(image: GrayImage, target_width: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width >= target_width {
        return image;
    }

    let left = (target_width - width) / 2;
    let mut canvas = GrayImage::from_pixel(target_width, height, Luma([255]));
    imageops::replace(&mut canvas, &image, left as i64, 0);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn grey(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([value])))
    }

    #[test]
    fn test_downscale_wide_image() {
        let prepared = prepare(&grey(800, 600, 255), 384).unwrap();
        assert_eq!(prepared.width, 384);
        assert_eq!(prepared.height, 288);
        assert_eq!(prepared.scale, 1);
    }

    #[test]
    fn test_downscale_rounds_height() {
        // 333 * 384 / 1000 = 127.87 -> 128
        let (fitted, scale) = fit_width(&grey(1000, 333, 0), 384);
        assert_eq!((fitted.width(), fitted.height(), scale), (384, 128, 1));
    }

    #[test]
    fn test_upscale_small_image_nearest() {
        let (fitted, scale) = fit_width(&grey(100, 10, 0), 384);
        assert_eq!(scale, 3);
        assert_eq!((fitted.width(), fitted.height()), (300, 30));
    }

    #[test]
    fn test_upscale_keeps_hard_edges() {
        let mut img = GrayImage::from_pixel(2, 1, Luma([255]));
        img.put_pixel(0, 0, Luma([0]));
        let (fitted, scale) = fit_width(&DynamicImage::ImageLuma8(img), 16);
        assert_eq!(scale, 8);
        let fitted = fitted.to_luma8();
        for x in 0..8 {
            assert_eq!(fitted.get_pixel(x, 0)[0], 0);
        }
        for x in 8..16 {
            assert_eq!(fitted.get_pixel(x, 0)[0], 255);
        }
    }

    #[test]
    fn test_mid_width_untouched() {
        let (fitted, scale) = fit_width(&grey(200, 50, 0), 384);
        assert_eq!((fitted.width(), fitted.height(), scale), (200, 50, 1));
        // Exactly half is not upscaled
        let (fitted, scale) = fit_width(&grey(192, 50, 0), 384);
        assert_eq!((fitted.width(), scale), (192, 1));
    }

    #[test]
    fn test_pad_symmetric() {
        // 100 -> 300 after upscale, padded 42 + 42
        let prepared = prepare(&grey(100, 10, 0), 384).unwrap();
        assert_eq!(prepared.width, 384);
        assert_eq!(prepared.height, 30);
        for row in prepared.rows() {
            assert!(row[..42].iter().all(|&p| p == 255));
            assert!(row[42..342].iter().all(|&p| p == 0));
            assert!(row[342..].iter().all(|&p| p == 255));
        }
    }

    #[test]
    fn test_pad_odd_remainder_goes_right() {
        let padded = pad_to_width(GrayImage::from_pixel(3, 1, Luma([0])), 8);
        let row: Vec<u8> = padded.pixels().map(|p| p[0]).collect();
        // 5 spare pixels: 2 left, 3 right
        assert_eq!(row, vec![255, 255, 0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_rotation_180() {
        let mut img = GrayImage::from_pixel(4, 2, Luma([255]));
        img.put_pixel(0, 0, Luma([0]));
        let rotated = rotate_greyscale(&DynamicImage::ImageLuma8(img));
        assert_eq!(rotated.get_pixel(3, 1)[0], 0);
        assert_eq!(rotated.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_transparent_becomes_white() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        let grey = rotate_greyscale(&DynamicImage::ImageRgba8(img));
        assert!(grey.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_output_is_dithered() {
        let prepared = prepare(&grey(384, 50, 100), 384).unwrap();
        assert!(prepared.pixels.iter().all(|&p| p == 0 || p == 255));
        assert!(prepared.pixels.iter().any(|&p| p == 0));
        assert!(prepared.pixels.iter().any(|&p| p == 255));
    }

    #[test]
    fn test_empty_image_rejected() {
        assert!(prepare(&grey(0, 0, 0), 384).is_err());
    }

    #[test]
    fn test_preview_png() {
        let prepared = prepare(&grey(20, 4, 0), 384).unwrap();
        let png = prepared.to_png().unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn test_prepared_new_checks_length() {
        assert!(PreparedImage::new(8, 2, vec![0; 16]).is_ok());
        assert!(PreparedImage::new(8, 2, vec![0; 15]).is_err());
    }
}
