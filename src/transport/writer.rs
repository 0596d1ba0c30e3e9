//! # Packet Writer
//!
//! Splits a compiled job into fixed-size packets and writes them in order,
//! pausing between packets so the printer's receive buffer keeps up.
//!
//! ```text
//! job bytes  ████████████████████████████████████████████████████████
//! packets    [   60   ][   60   ][   60   ][   60   ][   60   ][ 23 ]
//! writes     w ─10ms─ w ─10ms─ w ─10ms─ w ─10ms─ w ─10ms─ w
//! ```
//!
//! No acknowledgement is read back. A failed write aborts the transmit
//! immediately: resending from the middle of a frame would desynchronize the
//! printer's command parser. [`PacketWriter::transmit_checked`] also runs a
//! check before each packet, so a job can be stopped the moment the printer
//! reports an overrun.

use std::time::Duration;
use tracing::{debug, trace, warn};

use super::{DeviceDescriptor, SERVICE_UUID, Transport, WRITE_CHARACTERISTIC};
use crate::error::PrinterError;
use crate::printer::PrinterConfig;

/// Paced packet writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketWriter {
    packet_size: usize,
    delay: Option<Duration>,
}

impl PacketWriter {
    pub fn new(packet_size: usize, delay: Option<Duration>) -> Self {
        Self {
            packet_size: packet_size.max(1),
            delay: delay.filter(|d| !d.is_zero()),
        }
    }

    pub fn from_config(config: &PrinterConfig) -> Self {
        Self::new(config.packet_size, config.packet_delay())
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// The packets `bytes` will be sent as.
    pub fn packets<'a>(&self, bytes: &'a [u8]) -> std::slice::Chunks<'a, u8> {
        bytes.chunks(self.packet_size)
    }

    /// Number of packets for `len` bytes.
    pub fn packet_count(&self, len: usize) -> usize {
        len.div_ceil(self.packet_size)
    }

    /// Write `bytes` to the device, one packet per transport write.
    ///
    /// Returns the number of packets written.
    pub async fn transmit(
        &self,
        bytes: &[u8],
        transport: &dyn Transport,
        device: &DeviceDescriptor,
    ) -> Result<usize, PrinterError> {
        self.transmit_checked(bytes, transport, device, || Ok(())).await
    }

    /// Like [`transmit`](Self::transmit), but runs `check` before every
    /// packet. An error from `check` stops the job; nothing more is written.
    pub async fn transmit_checked<F>(
        &self,
        bytes: &[u8],
        transport: &dyn Transport,
        device: &DeviceDescriptor,
        mut check: F,
    ) -> Result<usize, PrinterError>
    where
        F: FnMut() -> Result<(), PrinterError> + Send,
    {
        let total = self.packet_count(bytes.len());
        debug!(bytes = bytes.len(), packets = total, "transmitting");

        for (index, packet) in self.packets(bytes).enumerate() {
            if index > 0
                && let Some(delay) = self.delay
            {
                tokio::time::sleep(delay).await;
            }
            check().inspect_err(|e| warn!(index, total, error = %e, "transmission aborted"))?;

            trace!(index, len = packet.len(), "packet");
            transport
                .write_chunk(device, SERVICE_UUID, WRITE_CHARACTERISTIC, packet)
                .await
                .inspect_err(|e| warn!(index, total, error = %e, "packet write failed"))?;
        }

        Ok(total)
    }
}

impl Default for PacketWriter {
    fn default() -> Self {
        Self::from_config(&PrinterConfig::default())
    }
}
