//! # Printer Configuration
//!
//! Every tunable of the print pipeline in one explicit struct, handed to the
//! job compiler, the packet writer and the session at construction.
//!
//! ## Defaults
//!
//! | Option | Default |
//! |--------|---------|
//! | `print_width` | 384 dots (48 bytes per row) |
//! | `packet_size` | 60 bytes |
//! | `packet_delay_ms` | 10 (`null` disables pacing) |
//! | `header_lines` / `feed_lines` | 0 / 60 |
//! | `blank_lines_after_print` | 40 |
//! | `energy` | `high` (17500); a preset index 0-2 also works |
//! | `poll_interval_ms` | 5000 |
//! | `scan_duration_ms` | 5000 |
//! | `allowed_names` | `["MX06"]` |
//!
//! ## Usage
//!
//! ```
//! use catprint::printer::PrinterConfig;
//!
//! let config = PrinterConfig::default();
//! assert_eq!(config.print_width, 384);
//! assert_eq!(config.row_bytes(), 48);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::PrinterError;
use crate::protocol::commands::{Energy, QUALITY_STANDARD};
use crate::render::bitmap::BitOrder;

/// Fixed print width of the MX06 print head, in dots.
pub const PRINTER_WIDTH: u32 = 384;

/// Fixed transport packet size, in bytes.
pub const PACKET_SIZE: usize = 60;

/// # Printer Configuration
///
/// Loaded from JSON with [`PrinterConfig::from_file`]; absent fields take
/// their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Print width in dots
    pub print_width: u32,

    /// Transport packet size in bytes
    pub packet_size: usize,

    /// Pause between packets; `None` sends back-to-back
    pub packet_delay_ms: Option<u64>,

    /// Blank lines fed before the first image
    pub header_lines: u32,

    /// Blank lines fed after a job by callers that don't pass their own count
    pub feed_lines: u32,

    /// Trailing blank feed used by `PrinterSession::print`
    pub blank_lines_after_print: u32,

    /// Multiply header/trailing feeds by the image upscale factor
    pub scale_feed: bool,

    /// Heating energy preset
    pub energy: Energy,

    /// `SetQuality` byte
    pub quality: u8,

    /// Connection monitor period
    pub poll_interval_ms: u64,

    /// How long a discovery scan listens
    pub scan_duration_ms: u64,

    /// Device names accepted during discovery (exact match)
    pub allowed_names: Vec<String>,

    /// Bit order of packed bitmap rows
    pub bit_order: BitOrder,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            print_width: PRINTER_WIDTH,
            packet_size: PACKET_SIZE,
            packet_delay_ms: Some(10),
            header_lines: 0,
            feed_lines: 60,
            blank_lines_after_print: 40,
            scale_feed: false,
            energy: Energy::High,
            quality: QUALITY_STANDARD,
            poll_interval_ms: 5000,
            scan_duration_ms: 5000,
            allowed_names: vec!["MX06".to_string()],
            bit_order: BitOrder::MsbFirst,
        }
    }
}

impl PrinterConfig {
    /// Load a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PrinterError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PrinterError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    /// Parse a JSON configuration string.
    pub fn from_json(text: &str) -> Result<Self, PrinterError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| PrinterError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), PrinterError> {
        if self.print_width == 0 {
            return Err(PrinterError::Config("print_width must be positive".into()));
        }
        if self.row_bytes() > crate::protocol::frame::MAX_PAYLOAD {
            return Err(PrinterError::Config(format!(
                "print_width {} does not fit in one DrawBitmap frame",
                self.print_width
            )));
        }
        if self.packet_size == 0 {
            return Err(PrinterError::Config("packet_size must be positive".into()));
        }
        Ok(())
    }

    /// Bytes per packed bitmap row.
    #[inline]
    pub fn row_bytes(&self) -> usize {
        (self.print_width as usize).div_ceil(8)
    }

    /// Inter-packet delay, if pacing is enabled.
    pub fn packet_delay(&self) -> Option<Duration> {
        self.packet_delay_ms.map(Duration::from_millis)
    }

    /// Connection monitor period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Discovery scan window.
    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.scan_duration_ms)
    }

    /// Whether a discovered device name is on the allow-list.
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed_names.iter().any(|allowed| allowed == name)
    }
}
