//! # Printer Command Vocabulary
//!
//! Command ids, magic control blocks and frame builders for the MX06/GB01
//! family of BLE thermal printers.
//!
//! ## Command Table
//!
//! | Command | Id | Payload |
//! |---------|----|---------|
//! | RetractPaper | `0xA0` | u16 LE step count (≤ 255 per frame) |
//! | FeedPaper | `0xA1` | u16 LE step count (≤ 255 per frame) |
//! | DrawBitmap | `0xA2` | One packed bitmap row |
//! | GetDevState | `0xA3` | `[0x00]` |
//! | SetQuality | `0xA4` | `0x31`..`0x35`, vendor app always sends `0x33` |
//! | ControlLattice | `0xA6` | 11-byte lattice block |
//! | GetDevInfo | `0xA8` | `[0x00]` |
//! | SetEnergy | `0xAF` | u16 LE heat energy |
//! | OtherFeedPaper | `0xBD` | One byte "speed" |
//! | DrawingMode | `0xBE` | `1` text, `0` image |
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 12000 (`0x2EE0`) is sent as bytes `[0xE0, 0x2E]`

use serde::{Deserialize, Serialize};

use super::frame::{MAX_PAYLOAD, encode_fixed};

// ============================================================================
// COMMAND IDS
// ============================================================================

/// Command identifiers understood by the printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Move paper backwards by n steps
    RetractPaper = 0xA0,
    /// Move paper forwards by n steps
    FeedPaper = 0xA1,
    /// Print one bitmap row (1 bit = dark dot)
    DrawBitmap = 0xA2,
    /// Request the status byte
    GetDevState = 0xA3,
    /// Print quality
    SetQuality = 0xA4,
    /// Lattice control block, sent before and after the bitmap rows
    ControlLattice = 0xA6,
    /// Request device information
    GetDevInfo = 0xA8,
    /// Heating energy
    SetEnergy = 0xAF,
    /// Print speed before drawing, blank-feed speed before feeding
    OtherFeedPaper = 0xBD,
    /// Text or image mode
    DrawingMode = 0xBE,
}

impl Command {
    /// Wire id of this command.
    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0xA0 => Command::RetractPaper,
            0xA1 => Command::FeedPaper,
            0xA2 => Command::DrawBitmap,
            0xA3 => Command::GetDevState,
            0xA4 => Command::SetQuality,
            0xA6 => Command::ControlLattice,
            0xA8 => Command::GetDevInfo,
            0xAF => Command::SetEnergy,
            0xBD => Command::OtherFeedPaper,
            0xBE => Command::DrawingMode,
            other => return Err(other),
        })
    }
}

// ============================================================================
// MAGIC SEQUENCES
// ============================================================================

/// Lattice block sent once before the first bitmap row of a job.
pub const PRINT_LATTICE: [u8; 11] = [
    0xAA, 0x55, 0x17, 0x38, 0x44, 0x5F, 0x5F, 0x5F, 0x44, 0x38, 0x2C,
];

/// Lattice block sent once after the last bitmap row of a job.
pub const FINISH_LATTICE: [u8; 11] = [
    0xAA, 0x55, 0x17, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x17,
];

/// Flow-control notification: the printer's buffer overflowed and data was lost.
pub const XOFF: [u8; 9] = [0x51, 0x78, 0xAE, 0x01, 0x01, 0x00, 0x10, 0x70, 0xFF];

/// Flow-control notification: the printer is accepting data again.
pub const XON: [u8; 9] = [0x51, 0x78, 0xAE, 0x01, 0x01, 0x00, 0x00, 0x00, 0xFF];

/// "Standard" print quality, the only value the vendor app sends.
pub const QUALITY_STANDARD: u8 = 0x33;

/// Speed byte sent before drawing image rows.
pub const IMAGE_PRINT_SPEED: u8 = 0x23;

/// Speed byte sent before feeding blank paper.
pub const BLANK_SPEED: u8 = 0x19;

/// Largest step count carried by one feed/retract frame.
pub const MAX_FEED_PER_FRAME: u32 = MAX_PAYLOAD as u32;

// ============================================================================
// SETTINGS
// ============================================================================

/// Heating energy presets.
///
/// | Preset | Index | Raw value |
/// |--------|-------|-----------|
/// | Low | 0 | 8000 |
/// | Medium | 1 | 12000 |
/// | High | 2 | 17500 |
///
/// Configuration accepts either the name or the index:
/// `"energy": "high"` and `"energy": 2` are the same setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "EnergySetting")]
pub enum Energy {
    Low,
    Medium,
    #[default]
    High,
}

impl Energy {
    /// Raw value sent in the `SetEnergy` payload.
    pub const fn raw(self) -> u16 {
        match self {
            Energy::Low => 8000,
            Energy::Medium => 12000,
            Energy::High => 17500,
        }
    }

    /// Look up a preset by its index (0-2).
    pub fn from_preset(index: u8) -> Option<Self> {
        match index {
            0 => Some(Energy::Low),
            1 => Some(Energy::Medium),
            2 => Some(Energy::High),
            _ => None,
        }
    }
}

/// Serialized form of [`Energy`]: a preset index or a preset name.
#[derive(Deserialize)]
#[serde(untagged)]
enum EnergySetting {
    Index(u8),
    Name(String),
}

impl TryFrom<EnergySetting> for Energy {
    type Error = String;

    fn try_from(setting: EnergySetting) -> Result<Self, Self::Error> {
        match setting {
            EnergySetting::Index(index) => {
                Energy::from_preset(index).ok_or_else(|| format!("energy preset {} out of range 0-2", index))
            }
            EnergySetting::Name(name) => match name.as_str() {
                "low" => Ok(Energy::Low),
                "medium" => Ok(Energy::Medium),
                "high" => Ok(Energy::High),
                other => Err(format!("unknown energy preset '{}'", other)),
            },
        }
    }
}

/// Drawing mode selected before the bitmap rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DrawingMode {
    Image = 0,
    Text = 1,
}

// ============================================================================
// FRAME BUILDERS
// ============================================================================

/// Status query, `GetDevState [0x00]`.
pub fn get_dev_state() -> Vec<u8> {
    encode_fixed(Command::GetDevState.id(), [0x00])
}

/// Device information query, `GetDevInfo [0x00]`.
pub fn get_dev_info() -> Vec<u8> {
    encode_fixed(Command::GetDevInfo.id(), [0x00])
}

/// `SetQuality [q]`.
pub fn set_quality(quality: u8) -> Vec<u8> {
    encode_fixed(Command::SetQuality.id(), [quality])
}

/// `ControlLattice [block]`.
pub fn control_lattice(block: [u8; 11]) -> Vec<u8> {
    encode_fixed(Command::ControlLattice.id(), block)
}

/// `SetEnergy [lo, hi]`.
pub fn set_energy(energy: Energy) -> Vec<u8> {
    encode_fixed(Command::SetEnergy.id(), u16_le(energy.raw()))
}

/// `DrawingMode [mode]`.
pub fn drawing_mode(mode: DrawingMode) -> Vec<u8> {
    encode_fixed(Command::DrawingMode.id(), [mode as u8])
}

/// `OtherFeedPaper [speed]`.
pub fn print_speed(speed: u8) -> Vec<u8> {
    encode_fixed(Command::OtherFeedPaper.id(), [speed])
}

/// Feed `lines` steps forward as a chain of `FeedPaper` frames.
///
/// Each frame carries at most [`MAX_FEED_PER_FRAME`] steps; `lines == 0`
/// yields no frames.
///
/// ## Example
///
/// ```
/// use catprint::protocol::commands::feed_paper;
///
/// // 300 = 255 + 45, two 10-byte frames
/// assert_eq!(feed_paper(300).len(), 20);
/// assert!(feed_paper(0).is_empty());
/// ```
pub fn feed_paper(lines: u32) -> Vec<u8> {
    step_chain(Command::FeedPaper, lines)
}

/// Move paper `lines` steps backwards as a chain of `RetractPaper` frames.
pub fn retract_paper(lines: u32) -> Vec<u8> {
    step_chain(Command::RetractPaper, lines)
}

/// Blank feed: switch to the blank-feed speed, then feed `lines` steps.
///
/// Empty when `lines == 0`.
pub fn blank_paper(lines: u32) -> Vec<u8> {
    if lines == 0 {
        return Vec::new();
    }
    let mut out = print_speed(BLANK_SPEED);
    out.extend(feed_paper(lines));
    out
}

/// Step counts of each frame in a feed chain of `lines`.
pub fn feed_chunks(lines: u32) -> impl Iterator<Item = u8> {
    let mut remaining = lines;
    std::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let step = remaining.min(MAX_FEED_PER_FRAME);
        remaining -= step;
        Some(step as u8)
    })
}

fn step_chain(command: Command, lines: u32) -> Vec<u8> {
    feed_chunks(lines)
        .flat_map(|step| encode_fixed(command.id(), u16_le(step as u16)))
        .collect()
}

/// Encode a u16 as little-endian bytes.
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// TESTS
// ============================================================================
