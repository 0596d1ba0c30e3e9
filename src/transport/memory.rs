//! # In-Memory Transport
//!
//! A printer double living in process memory. It advertises a configurable
//! set of devices, records every packet written to it and lets the caller
//! inject notifications or drop the link.
//!
//! Used by the test suite and by the CLI's `--transport memory` dry runs.
//!
//! ```
//! use catprint::transport::{DeviceDescriptor, MemoryTransport};
//!
//! let transport = MemoryTransport::with_devices(vec![DeviceDescriptor::new("MX06", "mem:0")]);
//! assert!(transport.written_bytes().is_empty());
//! ```

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{DeviceDescriptor, NotificationSink, Transport};
use crate::error::PrinterError;

/// One recorded `write_chunk` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub device: DeviceDescriptor,
    pub service: String,
    pub characteristic: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
struct State {
    devices: Vec<DeviceDescriptor>,
    connected: Option<DeviceDescriptor>,
    connect_succeeds: bool,
    fail_write_at: Option<usize>,
    notify_after_write: Option<(usize, Vec<u8>)>,
    writes: Vec<RecordedWrite>,
    scans: usize,
    connects: usize,
    sinks: Vec<NotificationSink>,
}

/// In-process printer double.
#[derive(Debug)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::with_devices(Vec::new())
    }
}

impl MemoryTransport {
    /// A transport advertising `devices` on every scan.
    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            state: Mutex::new(State {
                devices,
                connected: None,
                connect_succeeds: true,
                fail_write_at: None,
                notify_after_write: None,
                writes: Vec::new(),
                scans: 0,
                connects: 0,
                sinks: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the advertised devices.
    pub fn set_devices(&self, devices: Vec<DeviceDescriptor>) {
        self.state().devices = devices;
    }

    /// Make subsequent `connect` calls succeed or be refused.
    pub fn set_connect_succeeds(&self, succeeds: bool) {
        self.state().connect_succeeds = succeeds;
    }

    /// Fail the write with this zero-based index (counted over all writes).
    pub fn fail_write_at(&self, index: usize) {
        self.state().fail_write_at = Some(index);
    }

    /// Push `data` to subscribers right after the write with this index succeeds.
    pub fn notify_after_write(&self, index: usize, data: &[u8]) {
        self.state().notify_after_write = Some((index, data.to_vec()));
    }

    /// Simulate the printer going away.
    pub fn drop_connection(&self) {
        let mut state = self.state();
        state.connected = None;
        state.sinks.clear();
    }

    /// Push a notification to every subscriber.
    pub fn notify(&self, data: &[u8]) {
        let mut state = self.state();
        state.sinks.retain(|sink| sink.send(data.to_vec()).is_ok());
    }

    /// Every write so far, in order.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state().writes.clone()
    }

    /// Concatenation of every written packet.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state().writes.iter().flat_map(|w| w.data.iter().copied()).collect()
    }

    /// Forget recorded writes.
    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    pub fn scan_count(&self) -> usize {
        self.state().scans
    }

    pub fn connect_count(&self) -> usize {
        self.state().connects
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().sinks.len()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn scan(&self, _duration: Duration) -> Result<Vec<DeviceDescriptor>, PrinterError> {
        let mut state = self.state();
        state.scans += 1;
        Ok(state.devices.clone())
    }

    async fn connect(&self, device: &DeviceDescriptor) -> Result<bool, PrinterError> {
        let mut state = self.state();
        state.connects += 1;
        if !state.devices.contains(device) {
            return Err(PrinterError::Transport(format!("unknown device {}", device)));
        }
        if state.connect_succeeds {
            state.connected = Some(device.clone());
        }
        Ok(state.connect_succeeds)
    }

    async fn disconnect(&self, device: &DeviceDescriptor) -> Result<(), PrinterError> {
        let mut state = self.state();
        if state.connected.as_ref() == Some(device) {
            state.connected = None;
            state.sinks.clear();
        }
        Ok(())
    }

    async fn is_connected(&self, device: &DeviceDescriptor) -> bool {
        self.state().connected.as_ref() == Some(device)
    }

    async fn write_chunk(
        &self,
        device: &DeviceDescriptor,
        service: &str,
        characteristic: &str,
        data: &[u8],
    ) -> Result<(), PrinterError> {
        let mut state = self.state();
        if state.connected.as_ref() != Some(device) {
            return Err(PrinterError::Transport(format!("{} is not connected", device)));
        }
        if state.fail_write_at == Some(state.writes.len()) {
            state.fail_write_at = None;
            return Err(PrinterError::Transport("write rejected".to_string()));
        }
        state.writes.push(RecordedWrite {
            device: device.clone(),
            service: service.to_string(),
            characteristic: characteristic.to_string(),
            data: data.to_vec(),
        });
        let written = state.writes.len() - 1;
        if let Some((_, payload)) = state.notify_after_write.take_if(|(index, _)| *index == written) {
            state.sinks.retain(|sink| sink.send(payload.clone()).is_ok());
        }
        Ok(())
    }

    async fn subscribe_notifications(
        &self,
        device: &DeviceDescriptor,
        _service: &str,
        _characteristic: &str,
        sink: NotificationSink,
    ) -> Result<(), PrinterError> {
        let mut state = self.state();
        if state.connected.as_ref() != Some(device) {
            return Err(PrinterError::Transport(format!("{} is not connected", device)));
        }
        state.sinks.push(sink);
        Ok(())
    }
}
