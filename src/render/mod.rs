//! # Rendering Module
//!
//! Everything between a source picture (or a string) and the packed rows
//! inside `DrawBitmap` frames.
//!
//! ## Modules
//!
//! - [`prepare`]: Fit, rotate, pad and dither a source image
//! - [`dither`]: Floyd-Steinberg error diffusion
//! - [`bitmap`]: Pack dithered rows into bytes
//! - [`text`]: Rasterize text with word wrapping
//!
//! ## Usage Example
//!
//! ```
//! use catprint::render::{bitmap::pack_row, prepare::prepare};
//! use image::{DynamicImage, GrayImage, Luma};
//!
//! let source = DynamicImage::ImageLuma8(GrayImage::from_pixel(800, 40, Luma([0])));
//! let prepared = prepare(&source, 384).unwrap();
//!
//! for row in prepared.rows() {
//!     assert_eq!(pack_row(row, 384), vec![0xFF; 48]);
//! }
//! ```

pub mod bitmap;
pub mod dither;
pub mod prepare;
pub mod text;
