//! # Error Types
//!
//! This module defines error types used throughout the catprint library.
//!
//! | Variant | Meaning | Retried? |
//! |---------|---------|----------|
//! | `Protocol` | Oversized payload, row/length mismatch (programming fault) | never |
//! | `Transport` | Write failed, device not connected | no, job aborted |
//! | `DeviceFault` | Overrun or hardware status bit reported by the printer | no |
//! | `Discovery` | No adapter or no matching device | by the connection monitor |

use thiserror::Error;

/// Main error type for catprint operations
#[derive(Debug, Error)]
pub enum PrinterError {
    /// Frame or job constraint violated
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Transport-level errors (connection, write)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Condition reported by the printer itself
    #[error("Device fault: {message}")]
    DeviceFault {
        message: String,
        /// Whether the fault aborts the current job
        fatal: bool,
    },

    /// Device discovery failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Image decoding or processing error
    #[error("Image error: {0}")]
    Image(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrinterError {
    /// Whether this error terminates the job it occurred in.
    ///
    /// Everything is fatal except advisory device status (paper out, low battery...).
    pub fn is_fatal_for_job(&self) -> bool {
        match self {
            PrinterError::DeviceFault { fatal, .. } => *fatal,
            _ => true,
        }
    }
}
