//! # File Transport
//!
//! Treats a filesystem path as the printer: a serial device node bound to
//! the printer (e.g. `/dev/rfcomm0`) or a plain capture file that collects
//! the byte stream for later inspection.
//!
//! ## Serial Setup (Linux)
//!
//! ```bash
//! $ bluetoothctl
//! [bluetooth]# scan on          # look for "MX06"
//! [bluetooth]# pair AA:BB:CC:DD:EE:FF
//! $ sudo rfcomm bind 0 AA:BB:CC:DD:EE:FF
//! # /dev/rfcomm0 now reaches the printer
//! ```
//!
//! ## TTY Configuration
//!
//! When the path is a terminal it is switched to raw mode on connect so
//! binary frames pass through unmodified:
//!
//! - **No input processing**: IGNBRK, BRKINT, PARMRK, ISTRIP, INLCR, IGNCR, ICRNL
//! - **No software flow control**: IXON, IXOFF, IXANY (0x11/0x13 occur in bitmap rows)
//! - **No output processing**: OPOST
//! - **8-bit characters**: CS8, no parity
//! - **Non-canonical, no echo**: ICANON, ECHO, ECHONL, ISIG, IEXTEN
//!
//! Notifications are not available over a plain file.

use async_trait::async_trait;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use super::{DeviceDescriptor, Transport};
use crate::error::PrinterError;

/// Default serial device path
pub const DEFAULT_DEVICE: &str = "/dev/rfcomm0";

/// Name advertised for the path when none is given.
pub const DEFAULT_NAME: &str = "MX06";

/// # File Printer Transport
///
/// ## Example
///
/// ```no_run
/// use catprint::transport::{FileTransport, Transport};
///
/// # async fn demo() -> Result<(), catprint::error::PrinterError> {
/// let transport = FileTransport::new("/dev/rfcomm0");
/// let device = transport.descriptor();
/// transport.connect(&device).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileTransport {
    path: PathBuf,
    name: String,
    file: Mutex<Option<File>>,
}

impl FileTransport {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_name(path, DEFAULT_NAME)
    }

    /// A transport whose single device advertises `name`.
    pub fn with_name<P: AsRef<Path>>(path: P, name: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            name: name.into(),
            file: Mutex::new(None),
        }
    }

    /// Use the serial device already bound to a Bluetooth MAC address.
    pub fn for_mac(mac: &str) -> Result<Self, PrinterError> {
        if !is_valid_mac(mac) {
            return Err(PrinterError::Discovery(format!("Invalid MAC address: {}", mac)));
        }
        match find_rfcomm_for_mac(mac)? {
            Some(path) => Ok(Self::new(path)),
            None => Err(PrinterError::Discovery(format!(
                "No RFCOMM device bound to {} (try: sudo rfcomm bind 0 {})",
                mac.to_uppercase(),
                mac.to_uppercase()
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The single device this transport reaches.
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(self.name.clone(), self.path.display().to_string())
    }

    fn file(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_device(&self, device: &DeviceDescriptor) -> Result<(), PrinterError> {
        if device.address != self.path.display().to_string() {
            return Err(PrinterError::Transport(format!(
                "{} is not reachable through {}",
                device,
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Whether the path can be opened: it exists, or it is a capture file
    /// whose directory exists.
    fn reachable(&self) -> bool {
        if self.path.exists() {
            return true;
        }
        match self.path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => true,
            Some(parent) => parent.is_dir(),
            None => false,
        }
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn scan(&self, _duration: Duration) -> Result<Vec<DeviceDescriptor>, PrinterError> {
        if self.reachable() {
            Ok(vec![self.descriptor()])
        } else {
            debug!(path = %self.path.display(), "device path not present");
            Ok(Vec::new())
        }
    }

    async fn connect(&self, device: &DeviceDescriptor) -> Result<bool, PrinterError> {
        self.check_device(device)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                PrinterError::Transport(format!("Failed to open {}: {}", self.path.display(), e))
            })?;

        let fd = file.as_raw_fd();
        if unsafe { libc::isatty(fd) } == 1 {
            configure_tty_raw(fd)?;
        }

        info!(path = %self.path.display(), "opened");
        *self.file() = Some(file);
        Ok(true)
    }

    async fn disconnect(&self, device: &DeviceDescriptor) -> Result<(), PrinterError> {
        self.check_device(device)?;
        self.file().take();
        Ok(())
    }

    async fn is_connected(&self, device: &DeviceDescriptor) -> bool {
        self.check_device(device).is_ok() && self.file().is_some() && self.path.exists()
    }

    async fn write_chunk(
        &self,
        device: &DeviceDescriptor,
        _service: &str,
        _characteristic: &str,
        data: &[u8],
    ) -> Result<(), PrinterError> {
        self.check_device(device)?;
        let mut guard = self.file();
        let file = guard
            .as_mut()
            .ok_or_else(|| PrinterError::Transport(format!("{} is not open", self.path.display())))?;

        file.write_all(data)
            .map_err(|e| PrinterError::Transport(format!("Write failed: {}", e)))?;
        file.flush()
            .map_err(|e| PrinterError::Transport(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

/// Configure a file descriptor for raw TTY mode.
fn configure_tty_raw(fd: i32) -> Result<(), PrinterError> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    let result = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if result != 0 {
        return Err(PrinterError::Transport(format!(
            "tcgetattr failed: {}",
            io::Error::last_os_error()
        )));
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    let result = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if result != 0 {
        return Err(PrinterError::Transport(format!(
            "tcsetattr failed: {}",
            io::Error::last_os_error()
        )));
    }

    Ok(())
}

// ============================================================================
// RFCOMM LOOKUP
// ============================================================================

/// Validate a Bluetooth MAC address format (XX:XX:XX:XX:XX:XX).
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return false;
    }
    parts
        .iter()
        .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Find an existing RFCOMM device bound to the given MAC address.
///
/// Checks `/proc/net/rfcomm` and falls back to `rfcomm -a`.
pub fn find_rfcomm_for_mac(mac: &str) -> Result<Option<String>, PrinterError> {
    if let Ok(contents) = fs::read_to_string("/proc/net/rfcomm") {
        if let Some(path) = device_for_mac(&contents, mac) {
            return Ok(Some(path));
        }
    }

    let output = Command::new("rfcomm")
        .arg("-a")
        .output()
        .map_err(|e| PrinterError::Discovery(format!("Failed to run 'rfcomm -a': {}", e)))?;

    Ok(device_for_mac(&String::from_utf8_lossy(&output.stdout), mac))
}

/// Pick the bound device for `mac` out of an rfcomm listing
/// (`rfcomm0: XX:XX:XX:XX:XX:XX channel 1 ...`).
fn device_for_mac(listing: &str, mac: &str) -> Option<String> {
    let mac_upper = mac.to_uppercase();
    listing
        .lines()
        .filter(|line| line.to_uppercase().contains(&mac_upper))
        .filter_map(|line| line.split(':').next())
        .map(|name| format!("/dev/{}", name.trim()))
        .find(|path| Path::new(path).exists())
}

// ============================================================================
// TESTS
// ============================================================================
