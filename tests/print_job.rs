//! # Print Job Tests
//!
//! End-to-end checks of the compiled byte stream: source picture or text in,
//! frame sequence out. Frames are decoded with `split_frames`, so every test
//! also validates magic, lengths and checksums of the whole stream.

use catprint::protocol::commands::{BLANK_SPEED, Command, FINISH_LATTICE, IMAGE_PRINT_SPEED, PRINT_LATTICE, QUALITY_STANDARD};
use catprint::protocol::frame::split_frames;
use catprint::render::bitmap::BitOrder;
use catprint::render::prepare::prepare;
use catprint::render::text::{TextRasterizer, TextRenderer, TextStyle};
use catprint::{JobCompiler, PreparedImage, PrinterConfig, PrinterError};
use image::{DynamicImage, GrayImage, Luma};
use pretty_assertions::assert_eq;

// ============================================================================
// HELPERS
// ============================================================================

const DRAW: u8 = Command::DrawBitmap.id();

fn solid(height: u32, value: u8) -> PreparedImage {
    PreparedImage::new(384, height, vec![value; 384 * height as usize]).unwrap()
}

fn frames(bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    split_frames(bytes).expect("compiled job must decode")
}

/// The six setup frames every image job starts with.
fn setup_frames() -> Vec<(u8, Vec<u8>)> {
    vec![
        (Command::GetDevState.id(), vec![0x00]),
        (Command::SetQuality.id(), vec![QUALITY_STANDARD]),
        (Command::ControlLattice.id(), PRINT_LATTICE.to_vec()),
        (Command::SetEnergy.id(), vec![0x5C, 0x44]),
        (Command::DrawingMode.id(), vec![0x00]),
        (Command::OtherFeedPaper.id(), vec![IMAGE_PRINT_SPEED]),
    ]
}

fn bitmap_rows(frames: &[(u8, Vec<u8>)]) -> Vec<Vec<u8>> {
    frames
        .iter()
        .filter(|(id, _)| *id == DRAW)
        .map(|(_, payload)| payload.clone())
        .collect()
}

// ============================================================================
// JOB STRUCTURE
// ============================================================================

#[test]
fn test_single_image_job_layout() {
    let compiler = JobCompiler::new(PrinterConfig::default());
    let bytes = compiler.compile(&[solid(3, 0)], 40).unwrap();

    let mut expected = setup_frames();
    for _ in 0..3 {
        expected.push((DRAW, vec![0xFF; 48]));
    }
    expected.push((Command::ControlLattice.id(), FINISH_LATTICE.to_vec()));
    expected.push((Command::OtherFeedPaper.id(), vec![BLANK_SPEED]));
    expected.push((Command::FeedPaper.id(), vec![40, 0]));

    assert_eq!(frames(&bytes), expected);
}

#[test]
fn test_setup_sent_once_for_many_images() {
    let compiler = JobCompiler::new(PrinterConfig::default());
    let bytes = compiler.compile(&[solid(2, 0), solid(2, 255), solid(2, 0)], 0).unwrap();
    let decoded = frames(&bytes);

    let count = |id: Command| decoded.iter().filter(|(frame, _)| *frame == id.id()).count();
    assert_eq!(count(Command::GetDevState), 1);
    assert_eq!(count(Command::SetEnergy), 1);
    assert_eq!(count(Command::ControlLattice), 2);
    assert_eq!(count(Command::DrawBitmap), 6);
    assert_eq!(count(Command::FeedPaper), 0);
}

#[test]
fn test_last_image_prints_first() {
    let compiler = JobCompiler::new(PrinterConfig::default());
    let black = solid(2, 0);
    let white = solid(3, 255);
    let rows = bitmap_rows(&frames(&compiler.compile(&[black, white], 0).unwrap()));

    assert_eq!(rows.len(), 5);
    assert!(rows[..3].iter().all(|row| row == &vec![0x00; 48]));
    assert!(rows[3..].iter().all(|row| row == &vec![0xFF; 48]));
}

#[test]
fn test_empty_job_still_frames_setup_and_teardown() {
    let compiler = JobCompiler::new(PrinterConfig::default());
    let decoded = frames(&compiler.compile(&[], 0).unwrap());

    let mut expected = setup_frames();
    expected.push((Command::ControlLattice.id(), FINISH_LATTICE.to_vec()));
    assert_eq!(decoded, expected);
}

#[test]
fn test_long_trailing_feed_is_chained() {
    let compiler = JobCompiler::new(PrinterConfig::default());
    let decoded = frames(&compiler.compile(&[solid(1, 255)], 600).unwrap());
    let feeds: Vec<Vec<u8>> = decoded
        .iter()
        .filter(|(id, _)| *id == Command::FeedPaper.id())
        .map(|(_, payload)| payload.clone())
        .collect();

    assert_eq!(feeds, vec![vec![255, 0], vec![255, 0], vec![90, 0]]);
}

#[test]
fn test_wrong_width_is_rejected() {
    let compiler = JobCompiler::new(PrinterConfig::default());
    let narrow = PreparedImage::new(200, 1, vec![0; 200]).unwrap();

    let err = compiler.compile(&[solid(1, 0), narrow], 0).unwrap_err();
    assert!(matches!(err, PrinterError::Protocol(_)));
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn test_lsb_first_packing() {
    let config = PrinterConfig {
        bit_order: BitOrder::LsbFirst,
        ..PrinterConfig::default()
    };
    let mut pixels = vec![255u8; 384];
    pixels[0] = 0;
    let image = PreparedImage::new(384, 1, pixels).unwrap();

    let rows = bitmap_rows(&frames(&JobCompiler::new(config).compile(&[image], 0).unwrap()));
    assert_eq!(rows[0][0], 0x01);
    assert!(rows[0][1..].iter().all(|&b| b == 0));
}

#[test]
fn test_header_and_scaled_feeds() {
    let config = PrinterConfig {
        header_lines: 10,
        scale_feed: true,
        ..PrinterConfig::default()
    };
    // 100 px wide sources are upscaled 3x
    let source = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 4, Luma([255])));
    let prepared = prepare(&source, 384).unwrap();
    assert_eq!(prepared.scale, 3);

    let decoded = frames(&JobCompiler::new(config).compile(&[prepared], 20).unwrap());

    // Header: blank feed of 30, then the print speed again before drawing
    assert_eq!(decoded[6], (Command::OtherFeedPaper.id(), vec![BLANK_SPEED]));
    assert_eq!(decoded[7], (Command::FeedPaper.id(), vec![30, 0]));
    assert_eq!(decoded[8], (Command::OtherFeedPaper.id(), vec![IMAGE_PRINT_SPEED]));
    assert_eq!(decoded[9].0, DRAW);

    assert_eq!(decoded.last(), Some(&(Command::FeedPaper.id(), vec![60, 0])));
}

// ============================================================================
// FULL PIPELINE
// ============================================================================

#[test]
fn test_text_pipeline() {
    let raster = TextRasterizer::default()
        .render_text("holi", &TextStyle::default())
        .unwrap();
    let prepared = prepare(&DynamicImage::ImageLuma8(raster), 384).unwrap();
    let height = prepared.height as usize;

    let bytes = JobCompiler::new(PrinterConfig::default()).compile(&[prepared], 40).unwrap();
    let rows = bitmap_rows(&frames(&bytes));

    assert_eq!(rows.len(), height);
    assert!(rows.iter().all(|row| row.len() == 48));
    // Some ink somewhere, but not a solid block
    assert!(rows.iter().any(|row| row.iter().any(|&b| b != 0)));
    assert!(rows.iter().any(|row| row.iter().all(|&b| b == 0)));
}

#[test]
fn test_photo_pipeline() {
    // A horizontal gradient, wider than the print head
    let source = DynamicImage::ImageLuma8(GrayImage::from_fn(768, 100, |x, _| Luma([(x / 3) as u8])));
    let prepared = prepare(&source, 384).unwrap();
    assert_eq!((prepared.width, prepared.height, prepared.scale), (384, 50, 1));
    assert!(prepared.pixels.iter().all(|&p| p == 0 || p == 255));

    let bytes = JobCompiler::new(PrinterConfig::default()).compile(&[prepared], 0).unwrap();
    let rows = bitmap_rows(&frames(&bytes));
    assert_eq!(rows.len(), 50);

    // Rotated 180°: the dark end of the gradient lands on the right
    let ink = |range: std::ops::Range<usize>, row: &Vec<u8>| -> u32 {
        row[range].iter().map(|b| b.count_ones()).sum()
    };
    let left: u32 = rows.iter().map(|row| ink(0..12, row)).sum();
    let right: u32 = rows.iter().map(|row| ink(36..48, row)).sum();
    assert!(right > left * 4, "left {} right {}", left, right);
}
