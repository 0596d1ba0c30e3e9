//! # Print Job Compiler
//!
//! Sequences command frames into one complete byte stream for a print job.
//!
//! ## Frame Order
//!
//! ```text
//! GetDevState [0]
//! SetQuality, ControlLattice(print), SetEnergy, DrawingMode(image), OtherFeedPaper(0x23)
//! [header feed]                   blank feed, then OtherFeedPaper(0x23) again
//! DrawBitmap × rows               last image first, each top to bottom
//! ControlLattice(finish)
//! [trailing feed]                 OtherFeedPaper(0x19) + FeedPaper chain
//! ```
//!
//! Setup and teardown are emitted once per job regardless of how many images
//! it holds. Images are drawn in reverse input order: the image queued last
//! leaves the print head first.
//!
//! `DrawingMode` is always image mode; text reaches this layer already
//! rasterized.

use tracing::debug;

use crate::error::PrinterError;
use crate::printer::PrinterConfig;
use crate::protocol::commands::{self, Command, DrawingMode, FINISH_LATTICE, IMAGE_PRINT_SPEED, PRINT_LATTICE};
use crate::protocol::frame::{OVERHEAD, push_frame};
use crate::render::bitmap::pack_row_with;
use crate::render::prepare::PreparedImage;

/// Compiles prepared images into a device byte stream.
#[derive(Debug, Clone)]
pub struct JobCompiler {
    config: PrinterConfig,
}

impl JobCompiler {
    pub fn new(config: PrinterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    /// Compile `images` followed by `blank_feed_after` lines of trailing feed.
    ///
    /// Every image must already be exactly `print_width` pixels wide (see
    /// [`crate::render::prepare::prepare`]); anything else is reported as
    /// [`PrinterError::Protocol`].
    pub fn compile(&self, images: &[PreparedImage], blank_feed_after: u32) -> Result<Vec<u8>, PrinterError> {
        let config = &self.config;
        let row_bytes = config.row_bytes();

        for (index, image) in images.iter().enumerate() {
            self.check_image(index, image)?;
        }

        let feed_scale = if config.scale_feed {
            images.iter().map(|image| image.scale).max().unwrap_or(1).max(1)
        } else {
            1
        };
        let header_lines = config.header_lines * feed_scale;
        let trailing_lines = blank_feed_after * feed_scale;

        let rows: usize = images.iter().map(|image| image.height as usize).sum();
        let mut out = Vec::with_capacity(rows * (row_bytes + OVERHEAD) + 128);

        out.extend(commands::get_dev_state());
        out.extend(commands::set_quality(config.quality));
        out.extend(commands::control_lattice(PRINT_LATTICE));
        out.extend(commands::set_energy(config.energy));
        out.extend(commands::drawing_mode(DrawingMode::Image));
        out.extend(commands::print_speed(IMAGE_PRINT_SPEED));

        if header_lines > 0 {
            out.extend(commands::blank_paper(header_lines));
            out.extend(commands::print_speed(IMAGE_PRINT_SPEED));
        }

        for image in images.iter().rev() {
            for row in image.rows() {
                let packed = pack_row_with(row, image.width as usize, config.bit_order);
                push_frame(&mut out, Command::DrawBitmap.id(), &packed)?;
            }
        }

        out.extend(commands::control_lattice(FINISH_LATTICE));
        out.extend(commands::blank_paper(trailing_lines));

        debug!(
            images = images.len(),
            rows,
            header_lines,
            trailing_lines,
            bytes = out.len(),
            "compiled print job"
        );

        Ok(out)
    }

    fn check_image(&self, index: usize, image: &PreparedImage) -> Result<(), PrinterError> {
        if image.width != self.config.print_width {
            return Err(PrinterError::Protocol(format!(
                "image {} is {} px wide, expected {}",
                index, image.width, self.config.print_width
            )));
        }
        let expected = image.width as usize * image.height as usize;
        if image.pixels.len() != expected {
            return Err(PrinterError::Protocol(format!(
                "image {} holds {} pixels, expected {}",
                index,
                image.pixels.len(),
                expected
            )));
        }
        Ok(())
    }
}

/// A standalone feed or retract job: no setup, just the step chain.
pub fn paper_motion(lines: u32, retract: bool) -> Vec<u8> {
    if retract {
        commands::retract_paper(lines)
    } else {
        commands::blank_paper(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands::{BLANK_SPEED, Energy};
    use crate::protocol::frame::split_frames;
    use pretty_assertions::assert_eq;

    fn solid(height: u32, value: u8) -> PreparedImage {
        PreparedImage::new(384, height, vec![value; 384 * height as usize]).unwrap()
    }

    fn frames(bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
        split_frames(bytes).unwrap()
    }

    fn setup() -> Vec<(u8, Vec<u8>)> {
        vec![
            (Command::GetDevState.id(), vec![0]),
            (Command::SetQuality.id(), vec![0x33]),
            (Command::ControlLattice.id(), PRINT_LATTICE.to_vec()),
            (Command::SetEnergy.id(), vec![0x5C, 0x44]),
            (Command::DrawingMode.id(), vec![0]),
            (Command::OtherFeedPaper.id(), vec![IMAGE_PRINT_SPEED]),
        ]
    }

    #[test]
    fn test_empty_job() {
        let compiler = JobCompiler::new(PrinterConfig::default());
        let out = compiler.compile(&[], 0).unwrap();
        let mut expected = setup();
        expected.push((Command::ControlLattice.id(), FINISH_LATTICE.to_vec()));
        assert_eq!(frames(&out), expected);
    }

    #[test]
    fn test_two_images_reverse_order() {
        let compiler = JobCompiler::new(PrinterConfig::default());
        let a = solid(2, 0);
        let b = solid(3, 255);
        let out = compiler.compile(&[a, b], 40).unwrap();
        let frames = frames(&out);

        assert_eq!(frames[..6].to_vec(), setup());

        let draws: Vec<&Vec<u8>> = frames
            .iter()
            .filter(|(cmd, _)| *cmd == Command::DrawBitmap.id())
            .map(|(_, data)| data)
            .collect();
        assert_eq!(draws.len(), 5);
        // B (white) first, then A (black)
        assert!(draws[..3].iter().all(|row| row.iter().all(|&b| b == 0x00)));
        assert!(draws[3..].iter().all(|row| row.iter().all(|&b| b == 0xFF)));
        assert!(draws.iter().all(|row| row.len() == 48));

        let tail = &frames[11..];
        assert_eq!(
            tail.to_vec(),
            vec![
                (Command::ControlLattice.id(), FINISH_LATTICE.to_vec()),
                (Command::OtherFeedPaper.id(), vec![BLANK_SPEED]),
                (Command::FeedPaper.id(), vec![40, 0]),
            ]
        );
    }

    #[test]
    fn test_setup_sent_once() {
        let compiler = JobCompiler::new(PrinterConfig::default());
        let out = compiler.compile(&[solid(1, 0), solid(1, 0), solid(1, 0)], 0).unwrap();
        let count = |id: u8| frames(&out).iter().filter(|(cmd, _)| *cmd == id).count();
        assert_eq!(count(Command::GetDevState.id()), 1);
        assert_eq!(count(Command::SetQuality.id()), 1);
        assert_eq!(count(Command::SetEnergy.id()), 1);
        assert_eq!(count(Command::ControlLattice.id()), 2);
    }

    #[test]
    fn test_long_trailing_feed_is_chunked() {
        let compiler = JobCompiler::new(PrinterConfig::default());
        let out = compiler.compile(&[], 600).unwrap();
        let feeds: Vec<u32> = frames(&out)
            .iter()
            .filter(|(cmd, _)| *cmd == Command::FeedPaper.id())
            .map(|(_, data)| u16::from_le_bytes([data[0], data[1]]) as u32)
            .collect();
        assert_eq!(feeds, vec![255, 255, 90]);
    }

    #[test]
    fn test_header_feed() {
        let config = PrinterConfig {
            header_lines: 10,
            ..PrinterConfig::default()
        };
        let out = JobCompiler::new(config).compile(&[solid(1, 0)], 0).unwrap();
        let frames = frames(&out);
        assert_eq!(
            frames[6..9].to_vec(),
            vec![
                (Command::OtherFeedPaper.id(), vec![BLANK_SPEED]),
                (Command::FeedPaper.id(), vec![10, 0]),
                (Command::OtherFeedPaper.id(), vec![IMAGE_PRINT_SPEED]),
            ]
        );
        assert_eq!(frames[9].0, Command::DrawBitmap.id());
    }

    #[test]
    fn test_scale_feed_uses_largest_upscale() {
        let config = PrinterConfig {
            header_lines: 2,
            scale_feed: true,
            ..PrinterConfig::default()
        };
        let mut small = solid(1, 255);
        small.scale = 3;
        let out = JobCompiler::new(config).compile(&[solid(1, 255), small], 10).unwrap();
        let feeds: Vec<u8> = frames(&out)
            .iter()
            .filter(|(cmd, _)| *cmd == Command::FeedPaper.id())
            .map(|(_, data)| data[0])
            .collect();
        assert_eq!(feeds, vec![6, 30]);
    }

    #[test]
    fn test_energy_from_config() {
        let config = PrinterConfig {
            energy: Energy::Low,
            ..PrinterConfig::default()
        };
        let out = JobCompiler::new(config).compile(&[], 0).unwrap();
        let energy = frames(&out)
            .into_iter()
            .find(|(cmd, _)| *cmd == Command::SetEnergy.id())
            .map(|(_, data)| data);
        assert_eq!(energy, Some(8000u16.to_le_bytes().to_vec()));
    }

    #[test]
    fn test_wrong_width_is_protocol_error() {
        let compiler = JobCompiler::new(PrinterConfig::default());
        let narrow = PreparedImage::new(200, 1, vec![0; 200]).unwrap();
        let err = compiler.compile(&[narrow], 0).unwrap_err();
        assert!(matches!(err, PrinterError::Protocol(_)));
    }

    #[test]
    fn test_pixel_count_mismatch_is_protocol_error() {
        let compiler = JobCompiler::new(PrinterConfig::default());
        let mut broken = solid(2, 0);
        broken.pixels.truncate(500);
        assert!(matches!(
            compiler.compile(&[broken], 0),
            Err(PrinterError::Protocol(_))
        ));
    }

    #[test]
    fn test_paper_motion() {
        assert_eq!(paper_motion(0, false), Vec::<u8>::new());
        let retract = frames(&paper_motion(300, true));
        assert_eq!(
            retract,
            vec![
                (Command::RetractPaper.id(), vec![255, 0]),
                (Command::RetractPaper.id(), vec![45, 0]),
            ]
        );
    }
}
