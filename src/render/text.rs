//! # Text Rasterization
//!
//! Renders a text string into a greyscale raster the width of the print head,
//! ready for [`super::prepare::prepare`].
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────┐  ─┐
//! │                                      │   │ PADDING_Y (6)
//! │ ·Lorem ipsum dolor sit amet,         │  ─┤
//! │ ·consectetur adipiscing elit         │   │ line_height per line
//! │                                      │   │ PADDING_Y (6)
//! └──────────────────────────────────────┘  ─┘
//!   └ MARGIN_X (5)
//! ```
//!
//! Height is `lines * line_height + 2 * PADDING_Y`. Words wrap at spaces;
//! a word wider than the line is split character by character. Explicit
//! newlines start a new line.
//!
//! ## Fonts
//!
//! | Face | Source | Sizing |
//! |------|--------|--------|
//! | [`FontFace::Bitmap`] | Spleen 6x12, 8x16, 12x24 | base cell scaled by an integer |
//! | [`FontFace::TrueType`] | any TTF/OTF file | `ab_glyph`, anti-aliased |

use ab_glyph::{Font, FontArc, ScaleFont};
use image::{GrayImage, Luma};
use spleen_font::{FONT_6X12, FONT_8X16, FONT_12X24, PSF2Font};
use std::path::PathBuf;

use crate::error::PrinterError;
use crate::printer::config::PRINTER_WIDTH;

/// Left margin of every line, in pixels.
pub const MARGIN_X: u32 = 5;

/// Blank rows above the first and below the last line.
pub const PADDING_Y: u32 = 6;

/// Which glyph source to draw with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FontFace {
    /// Built-in Spleen monospace bitmap font
    #[default]
    Bitmap,
    /// A TrueType/OpenType font file
    TrueType(PathBuf),
}

/// Appearance of rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextStyle {
    pub font: FontFace,
    /// Requested glyph height in pixels
    pub font_size: u32,
    /// Vertical advance per line in pixels
    pub line_height: u32,
    /// Grey level of ink (0 = black)
    pub text_color: u8,
    /// Grey level of the canvas (255 = white)
    pub background_color: u8,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: FontFace::Bitmap,
            font_size: 40,
            line_height: 40,
            text_color: 0,
            background_color: 255,
        }
    }
}

/// Anything that can turn text into a greyscale raster.
pub trait TextRenderer {
    fn render_text(&self, text: &str, style: &TextStyle) -> Result<GrayImage, PrinterError>;
}

/// The default renderer: fixed-width canvas, wrapped lines.
#[derive(Debug, Clone, Copy)]
pub struct TextRasterizer {
    pub max_width: u32,
}

impl Default for TextRasterizer {
    fn default() -> Self {
        Self {
            max_width: PRINTER_WIDTH,
        }
    }
}

impl TextRasterizer {
    pub fn new(max_width: u32) -> Self {
        Self { max_width }
    }

    fn line_width(&self) -> usize {
        self.max_width.saturating_sub(MARGIN_X) as usize
    }
}

impl TextRenderer for TextRasterizer {
    fn render_text(&self, text: &str, style: &TextStyle) -> Result<GrayImage, PrinterError> {
        if style.font_size == 0 || style.line_height == 0 {
            return Err(PrinterError::Image(
                "font size and line height must be positive".into(),
            ));
        }

        let face = LoadedFace::load(&style.font, style.font_size)?;
        let lines = wrap_text(text, self.line_width(), |s| face.measure(s));

        let height = lines.len() as u32 * style.line_height + 2 * PADDING_Y;
        let mut canvas = GrayImage::from_pixel(self.max_width, height, Luma([style.background_color]));

        for (i, line) in lines.iter().enumerate() {
            let top = PADDING_Y + i as u32 * style.line_height;
            face.draw_line(&mut canvas, line, top, style);
        }

        Ok(canvas)
    }
}

// ============================================================================
// LINE WRAPPING
// ============================================================================

/// Break `text` into lines no wider than `max_width` according to `measure`.
///
/// Spaces separate words; a single word wider than the line is broken
/// between characters and its tail continues the next line. A character
/// wider than the whole line still gets a line of its own.
///
/// ```
/// use catprint::render::text::wrap_text;
///
/// let lines = wrap_text("aa bb cc", 5, |s| s.chars().count());
/// assert_eq!(lines, vec!["aa bb", "cc"]);
/// ```
pub fn wrap_text<F>(text: &str, max_width: usize, measure: F) -> Vec<String>
where
    F: Fn(&str) -> usize,
{
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let start = lines.len();
        let mut current = String::new();

        for word in paragraph.split(' ') {
            if measure(word) > max_width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let mut piece = String::new();
                for ch in word.chars() {
                    let mut candidate = piece.clone();
                    candidate.push(ch);
                    if measure(&candidate) > max_width && !piece.is_empty() {
                        lines.push(std::mem::replace(&mut piece, ch.to_string()));
                    } else {
                        piece = candidate;
                    }
                }
                current = piece;
            } else {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{} {}", current, word)
                };
                if measure(&candidate) > max_width {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                } else {
                    current = candidate;
                }
            }
        }

        if !current.is_empty() || lines.len() == start {
            lines.push(current);
        }
    }

    lines
}

// ============================================================================
// FONT FACES
// ============================================================================

enum LoadedFace {
    Bitmap(BitmapFace),
    TrueType { font: FontArc, px: f32 },
}

impl LoadedFace {
    fn load(face: &FontFace, font_size: u32) -> Result<Self, PrinterError> {
        match face {
            FontFace::Bitmap => Ok(Self::Bitmap(BitmapFace::for_size(font_size))),
            FontFace::TrueType(path) => {
                let data = std::fs::read(path).map_err(|e| {
                    PrinterError::Image(format!("Failed to read font {}: {}", path.display(), e))
                })?;
                let font = FontArc::try_from_vec(data).map_err(|e| {
                    PrinterError::Image(format!("Invalid font {}: {}", path.display(), e))
                })?;
                Ok(Self::TrueType {
                    font,
                    px: font_size as f32,
                })
            }
        }
    }

    fn measure(&self, text: &str) -> usize {
        match self {
            Self::Bitmap(face) => face.measure(text),
            Self::TrueType { font, px } => {
                let scaled = font.as_scaled(*px);
                let width: f32 = text.chars().map(|ch| scaled.h_advance(font.glyph_id(ch))).sum();
                width.ceil() as usize
            }
        }
    }

    fn draw_line(&self, canvas: &mut GrayImage, line: &str, top: u32, style: &TextStyle) {
        match self {
            Self::Bitmap(face) => face.draw_line(canvas, line, top, style),
            Self::TrueType { font, px } => draw_ttf_line(font, *px, canvas, line, top, style),
        }
    }
}

/// A Spleen cell size and the integer factor it is drawn at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BitmapFace {
    cell_width: u32,
    cell_height: u32,
    scale: u32,
}

impl BitmapFace {
    const CELLS: [(u32, u32); 3] = [(12, 24), (8, 16), (6, 12)];

    /// Pick the cell and scale whose drawn height is closest to `font_size`.
    /// Ties go to the larger cell.
    fn for_size(font_size: u32) -> Self {
        let mut best: Option<(u32, Self)> = None;
        for (cell_width, cell_height) in Self::CELLS {
            let scale = ((font_size + cell_height / 2) / cell_height).max(1);
            let distance = (cell_height * scale).abs_diff(font_size);
            let candidate = Self {
                cell_width,
                cell_height,
                scale,
            };
            if best.is_none_or(|(d, _)| distance < d) {
                best = Some((distance, candidate));
            }
        }
        best.map(|(_, face)| face).unwrap_or(Self {
            cell_width: 12,
            cell_height: 24,
            scale: 1,
        })
    }

    fn advance(&self) -> u32 {
        self.cell_width * self.scale
    }

    fn measure(&self, text: &str) -> usize {
        text.chars().count() * self.advance() as usize
    }

    fn font_data(&self) -> &'static [u8] {
        match self.cell_height {
            12 => FONT_6X12,
            16 => FONT_8X16,
            _ => FONT_12X24,
        }
    }

    fn draw_line(&self, canvas: &mut GrayImage, line: &str, top: u32, style: &TextStyle) {
        let Ok(mut font) = PSF2Font::new(self.font_data()) else {
            return;
        };
        let glyph_height = self.cell_height * self.scale;
        let top = top + style.line_height.saturating_sub(glyph_height) / 2;
        let mut cursor_x = MARGIN_X;

        for ch in line.chars() {
            let utf8 = ch.to_string();
            if let Some(glyph) = font.glyph_for_utf8(utf8.as_bytes()) {
                for (row_y, row) in glyph.enumerate() {
                    for (col_x, on) in row.enumerate() {
                        if on {
                            let x = cursor_x + col_x as u32 * self.scale;
                            let y = top + row_y as u32 * self.scale;
                            self.fill_dot(canvas, x, y, style.text_color);
                        }
                    }
                }
            }
            cursor_x += self.advance();
        }
    }

    /// Paint one font dot as a `scale` x `scale` block.
    fn fill_dot(&self, canvas: &mut GrayImage, x0: u32, y0: u32, value: u8) {
        let (width, height) = canvas.dimensions();
        for dy in 0..self.scale {
            for dx in 0..self.scale {
                let (x, y) = (x0 + dx, y0 + dy);
                if x < width && y < height {
                    canvas.put_pixel(x, y, Luma([value]));
                }
            }
        }
    }
}

fn draw_ttf_line(font: &FontArc, px: f32, canvas: &mut GrayImage, line: &str, top: u32, style: &TextStyle) {
    let scaled = font.as_scaled(px);
    let baseline = top as f32 + scaled.ascent();
    let (width, height) = canvas.dimensions();
    let mut caret_x = MARGIN_X as f32;

    for ch in line.chars() {
        let glyph_id = font.glyph_id(ch);
        let glyph = glyph_id.with_scale_and_position(px, ab_glyph::point(caret_x, baseline));
        caret_x += scaled.h_advance(glyph_id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = gx as i32 + bounds.min.x as i32;
                let y = gy as i32 + bounds.min.y as i32;
                if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                    let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                    let current = pixel[0] as f32;
                    let ink = style.text_color as f32;
                    let blended = current + (ink - current) * coverage.clamp(0.0, 1.0);
                    pixel[0] = blended.round() as u8;
                }
            });
        }
    }
}
