//! # Device Notifications
//!
//! The printer pushes notifications on the notify characteristic. Two kinds
//! matter to a print job:
//!
//! - **Flow control**: [`XOFF`] means the receive buffer overflowed and data
//!   was dropped; [`XON`] means it is accepting data again.
//! - **Status replies** to `GetDevState`: byte 6 (the first payload byte) is a
//!   bit field.
//!
//! ```text
//! status byte
//! xxxxxxx1  no paper
//! xxxxxx1x  paper compartment open
//! xxxxx1xx  too hot
//! xxxx1xxx  low battery (unreliable, may stay clear until the printer shuts off)
//! ```
//!
//! Decoding is pure. Subscribing to the characteristic is the transport's job.

use super::commands::{Command, XOFF, XON};
use crate::error::PrinterError;

/// Offset of the status byte in a `GetDevState` reply.
const STATUS_BYTE: usize = 6;

/// Hardware status bits reported by `GetDevState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStatus {
    pub no_paper: bool,
    pub lid_open: bool,
    pub overheat: bool,
    pub low_battery: bool,
}

impl DeviceStatus {
    /// Decode the status bit field.
    pub fn from_bits(bits: u8) -> Self {
        Self {
            no_paper: bits & 0b0001 != 0,
            lid_open: bits & 0b0010 != 0,
            overheat: bits & 0b0100 != 0,
            low_battery: bits & 0b1000 != 0,
        }
    }

    /// True when no bit is set.
    pub fn is_ok(&self) -> bool {
        *self == Self::default()
    }

    /// Human-readable list of the conditions that are set.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.no_paper {
            parts.push("no paper");
        }
        if self.lid_open {
            parts.push("lid open");
        }
        if self.overheat {
            parts.push("too hot");
        }
        if self.low_battery {
            parts.push("low battery");
        }
        if parts.is_empty() {
            "ok".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// A decoded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Printer buffer overflowed; the current job cannot be recovered.
    Overrun,
    /// Printer is accepting data again.
    Resumed,
    /// Reply to `GetDevState`.
    Status(DeviceStatus),
    /// Payload of a `GetDevInfo` reply.
    Info(Vec<u8>),
    /// Anything else, kept verbatim.
    Unknown(Vec<u8>),
}

impl StatusEvent {
    /// Whether this event aborts the job in flight.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StatusEvent::Overrun)
    }

    /// Convert to a device fault, if the event reports a problem.
    ///
    /// Overrun is fatal; status bits are advisory.
    pub fn into_fault(self) -> Option<PrinterError> {
        match self {
            StatusEvent::Overrun => Some(PrinterError::DeviceFault {
                message: "printer data overrun".to_string(),
                fatal: true,
            }),
            StatusEvent::Status(status) if !status.is_ok() => Some(PrinterError::DeviceFault {
                message: status.describe(),
                fatal: false,
            }),
            _ => None,
        }
    }
}

/// Decode raw notification bytes.
///
/// ## Example
///
/// ```
/// use catprint::protocol::status::{decode_notification, StatusEvent};
/// use catprint::protocol::commands::XOFF;
///
/// assert_eq!(decode_notification(&XOFF), StatusEvent::Overrun);
/// ```
pub fn decode_notification(data: &[u8]) -> StatusEvent {
    if data == XOFF {
        return StatusEvent::Overrun;
    }
    if data == XON {
        return StatusEvent::Resumed;
    }

    match data.get(2).map(|&id| Command::try_from(id)) {
        Some(Ok(Command::GetDevState)) if data.len() > STATUS_BYTE => {
            StatusEvent::Status(DeviceStatus::from_bits(data[STATUS_BYTE]))
        }
        Some(Ok(Command::GetDevInfo)) if data.len() > STATUS_BYTE => {
            let len = data[4] as usize;
            let end = (STATUS_BYTE + len).min(data.len());
            StatusEvent::Info(data[STATUS_BYTE..end].to_vec())
        }
        _ => StatusEvent::Unknown(data.to_vec()),
    }
}
