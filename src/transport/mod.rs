//! # Printer Transport Layer
//!
//! The link between the print pipeline and a physical printer.
//!
//! MX06 printers speak over a BLE GATT service. The library talks to the
//! link through the [`Transport`] trait and never owns a radio stack itself.
//!
//! | UUID | Role |
//! |------|------|
//! | [`SERVICE_UUID`] | printer service |
//! | [`WRITE_CHARACTERISTIC`] | command stream, written packet by packet |
//! | [`NOTIFY_CHARACTERISTIC`] | flow control and status replies |
//!
//! ## Available Transports
//!
//! - [`memory`]: in-process printer double that records every packet
//! - [`file`]: a device node or capture file (e.g. a bound `/dev/rfcomm0`)
//!
//! [`writer`] chunks a compiled job into packets and paces them onto any
//! transport.

pub mod file;
pub mod memory;
pub mod writer;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::PrinterError;

pub use file::FileTransport;
pub use memory::MemoryTransport;
pub use writer::PacketWriter;

/// Printer GATT service.
pub const SERVICE_UUID: &str = "0000ae30-0000-1000-8000-00805f9b34fb";

/// Characteristic the command stream is written to.
pub const WRITE_CHARACTERISTIC: &str = "0000ae01-0000-1000-8000-00805f9b34fb";

/// Characteristic the printer notifies on.
pub const NOTIFY_CHARACTERISTIC: &str = "0000ae02-0000-1000-8000-00805f9b34fb";

/// A printer found by [`Transport::scan`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    /// Advertised name, matched against the allow-list
    pub name: String,
    /// Transport-specific address (MAC, path, ...)
    pub address: String,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Sink for raw notification payloads.
pub type NotificationSink = mpsc::UnboundedSender<Vec<u8>>;

/// A link to zero or more printers.
///
/// Implementations are shared between the connection monitor and the job
/// in flight, hence `&self` everywhere.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Listen for advertising devices for `duration`.
    async fn scan(&self, duration: Duration) -> Result<Vec<DeviceDescriptor>, PrinterError>;

    /// Open a connection. `Ok(false)` means the device refused.
    async fn connect(&self, device: &DeviceDescriptor) -> Result<bool, PrinterError>;

    async fn disconnect(&self, device: &DeviceDescriptor) -> Result<(), PrinterError>;

    async fn is_connected(&self, device: &DeviceDescriptor) -> bool;

    /// Write one packet to a characteristic.
    async fn write_chunk(
        &self,
        device: &DeviceDescriptor,
        service: &str,
        characteristic: &str,
        data: &[u8],
    ) -> Result<(), PrinterError>;

    /// Forward every notification on `characteristic` into `sink`.
    async fn subscribe_notifications(
        &self,
        device: &DeviceDescriptor,
        service: &str,
        characteristic: &str,
        sink: NotificationSink,
    ) -> Result<(), PrinterError> {
        let _ = (device, service, characteristic, sink);
        Err(PrinterError::Transport(
            "notifications not supported by this transport".to_string(),
        ))
    }
}
