//! # Printer Protocol Implementation
//!
//! This module provides the low-level wire format for MX06/GB01-family BLE
//! thermal printers (the "cat printer" protocol).
//!
//! ## Module Structure
//!
//! - [`checksum`]: CRC-8 over frame payloads
//! - [`frame`]: Frame encoding and decoding
//! - [`commands`]: Command ids, magic blocks and frame builders
//! - [`status`]: Notification decoding (overrun, status bits)
//!
//! ## Usage Example
//!
//! ```
//! use catprint::protocol::commands::{self, Energy, DrawingMode};
//!
//! let mut data = Vec::new();
//! data.extend(commands::get_dev_state());
//! data.extend(commands::set_quality(commands::QUALITY_STANDARD));
//! data.extend(commands::control_lattice(commands::PRINT_LATTICE));
//! data.extend(commands::set_energy(Energy::High));
//! data.extend(commands::drawing_mode(DrawingMode::Image));
//! // ... DrawBitmap rows ...
//! data.extend(commands::control_lattice(commands::FINISH_LATTICE));
//! data.extend(commands::blank_paper(40));
//! ```

pub mod checksum;
pub mod commands;
pub mod frame;
pub mod status;
