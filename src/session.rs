//! # Printer Session
//!
//! Owns the link to one printer: which device is in use, whether it is
//! connected, and the event channel everyone else listens on.
//!
//! ## Connection States
//!
//! ```text
//!                 tick / connect
//! Disconnected ───────────────────► Connecting ──── ok ────► Connected
//!      ▲                                 │                      │
//!      └──────────── failure ────────────┘◄──── link lost ──────┘
//! ```
//!
//! [`PrinterSession::tick`] is the only place that reconnects. Printing never
//! retries; it fails fast when the printer is not connected.
//!
//! ## Events
//!
//! | Event | When |
//! |-------|------|
//! | [`SessionEvent::Connected`] | a connect attempt succeeded |
//! | [`SessionEvent::Disconnected`] | a tick found no usable printer |
//! | [`SessionEvent::Device`] | the printer sent a notification |
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use catprint::printer::PrinterConfig;
//! use catprint::session::PrinterSession;
//! use catprint::transport::FileTransport;
//!
//! # async fn demo() -> Result<(), catprint::error::PrinterError> {
//! let transport = Arc::new(FileTransport::new("/dev/rfcomm0"));
//! let mut session = PrinterSession::new(transport, PrinterConfig::default());
//! session.connect().await?;
//! session.feed(60).await?;
//! # Ok(())
//! # }
//! ```

use std::future::poll_fn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::task::Poll;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::PrinterError;
use crate::job::{JobCompiler, paper_motion};
use crate::printer::PrinterConfig;
use crate::protocol::commands;
use crate::protocol::status::{StatusEvent, decode_notification};
use crate::render::prepare::PreparedImage;
use crate::transport::{DeviceDescriptor, NOTIFY_CHARACTERISTIC, PacketWriter, SERVICE_UUID, Transport};

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Link state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Something subscribers should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { device: DeviceDescriptor },
    Disconnected { reason: String },
    Device(StatusEvent),
}

/// A printer link plus everything needed to print on it.
pub struct PrinterSession {
    transport: Arc<dyn Transport>,
    config: PrinterConfig,
    device: Option<DeviceDescriptor>,
    state: ConnectionState,
    events: broadcast::Sender<SessionEvent>,
    overrun: Arc<AtomicBool>,
    notifications: Option<Arc<NotificationQueue>>,
    compiler: JobCompiler,
    writer: PacketWriter,
}

impl PrinterSession {
    pub fn new(transport: Arc<dyn Transport>, config: PrinterConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            transport,
            compiler: JobCompiler::new(config.clone()),
            writer: PacketWriter::from_config(&config),
            config,
            device: None,
            state: ConnectionState::Disconnected,
            events,
            overrun: Arc::new(AtomicBool::new(false)),
            notifications: None,
        }
    }

    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn device(&self) -> Option<&DeviceDescriptor> {
        self.device.as_ref()
    }

    pub fn compiler(&self) -> &JobCompiler {
        &self.compiler
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn events_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    // ========================================================================
    // CONNECTION
    // ========================================================================

    /// Scan for the first device whose name is on the allow-list.
    pub async fn discover(&self) -> Result<DeviceDescriptor, PrinterError> {
        debug!(duration_ms = self.config.scan_duration_ms, "scanning");
        let devices = self.transport.scan(self.config.scan_duration()).await?;

        devices
            .into_iter()
            .find(|device| self.config.is_allowed(&device.name))
            .inspect(|device| info!(%device, "found printer"))
            .ok_or_else(|| {
                PrinterError::Discovery(format!(
                    "no device matching {:?} found",
                    self.config.allowed_names
                ))
            })
    }

    /// Discover and connect, then start forwarding notifications.
    pub async fn connect(&mut self) -> Result<(), PrinterError> {
        self.state = ConnectionState::Connecting;

        let result = self.try_connect().await;
        if result.is_err() {
            self.state = ConnectionState::Disconnected;
            self.device = None;
        }
        result
    }

    async fn try_connect(&mut self) -> Result<(), PrinterError> {
        let device = self.discover().await?;

        if !self.transport.connect(&device).await? {
            return Err(PrinterError::Transport(format!("{} refused the connection", device)));
        }

        info!(%device, "connected");
        self.state = ConnectionState::Connected;
        self.device = Some(device.clone());
        self.overrun.store(false, Ordering::SeqCst);
        self.emit(SessionEvent::Connected { device });

        if let Err(e) = self.watch_notifications().await {
            warn!(error = %e, "printer notifications unavailable");
        }
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<(), PrinterError> {
        if let Some(device) = self.device.take() {
            self.transport.disconnect(&device).await?;
            info!(%device, "disconnected");
        }
        self.notifications = None;
        self.state = ConnectionState::Disconnected;
        Ok(())
    }

    /// Connected and the transport agrees the link is up.
    pub async fn is_connected(&self) -> bool {
        match (&self.device, self.state) {
            (Some(device), ConnectionState::Connected) => self.transport.is_connected(device).await,
            _ => false,
        }
    }

    /// One step of the connection manager.
    ///
    /// Does nothing while the link is up. Otherwise tries to discover and
    /// connect; a failure is broadcast as [`SessionEvent::Disconnected`].
    /// Returns whether the printer is connected afterwards.
    pub async fn tick(&mut self) -> bool {
        if self.is_connected().await {
            return true;
        }

        if self.state == ConnectionState::Connected {
            warn!("printer link lost");
        }
        self.device = None;
        self.notifications = None;

        match self.connect().await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "reconnect failed");
                self.emit(SessionEvent::Disconnected {
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    /// Subscribe to the notify characteristic and forward decoded events.
    ///
    /// An overrun also raises a flag that fails the job being transmitted.
    pub async fn watch_notifications(&mut self) -> Result<JoinHandle<()>, PrinterError> {
        let device = self
            .device
            .clone()
            .ok_or_else(|| PrinterError::Transport("printer not connected".to_string()))?;

        let (sink, receiver) = mpsc::unbounded_channel::<Vec<u8>>();
        self.transport
            .subscribe_notifications(&device, SERVICE_UUID, NOTIFY_CHARACTERISTIC, sink)
            .await?;

        let queue = Arc::new(NotificationQueue {
            receiver: StdMutex::new(receiver),
            events: self.events.clone(),
            overrun: Arc::clone(&self.overrun),
        });
        self.notifications = Some(Arc::clone(&queue));

        Ok(tokio::spawn(async move {
            while queue.next().await {}
            debug!(%device, "notification stream closed");
        }))
    }

    /// Handle every notification delivered so far, then report an overrun
    /// seen since the last check.
    fn check_overrun(&self) -> Result<(), PrinterError> {
        if let Some(queue) = &self.notifications {
            queue.drain();
        }
        if self.overrun.swap(false, Ordering::SeqCst) {
            return Err(PrinterError::DeviceFault {
                message: "printer data overrun".to_string(),
                fatal: true,
            });
        }
        Ok(())
    }

    // ========================================================================
    // PRINTING
    // ========================================================================

    /// Print `images` followed by the configured trailing feed.
    pub async fn print(&self, images: &[PreparedImage]) -> Result<usize, PrinterError> {
        self.print_with_feed(images, self.config.blank_lines_after_print).await
    }

    /// Print `images` followed by `blank_lines` of trailing feed.
    ///
    /// Returns the number of packets written.
    pub async fn print_with_feed(&self, images: &[PreparedImage], blank_lines: u32) -> Result<usize, PrinterError> {
        self.ensure_connected().await?;
        let bytes = self.compiler.compile(images, blank_lines)?;
        self.send(&bytes).await
    }

    /// Feed blank paper.
    pub async fn feed(&self, lines: u32) -> Result<usize, PrinterError> {
        self.ensure_connected().await?;
        self.send(&paper_motion(lines, false)).await
    }

    /// Pull paper back.
    pub async fn retract(&self, lines: u32) -> Result<usize, PrinterError> {
        self.ensure_connected().await?;
        self.send(&paper_motion(lines, true)).await
    }

    /// Ask for the status byte; the reply arrives as a
    /// [`SessionEvent::Device`] carrying [`StatusEvent::Status`].
    pub async fn request_status(&self) -> Result<usize, PrinterError> {
        self.ensure_connected().await?;
        self.send(&commands::get_dev_state()).await
    }

    /// Ask for device information; the reply arrives as a
    /// [`SessionEvent::Device`] carrying [`StatusEvent::Info`].
    pub async fn request_info(&self) -> Result<usize, PrinterError> {
        self.ensure_connected().await?;
        self.send(&commands::get_dev_info()).await
    }

    async fn ensure_connected(&self) -> Result<(), PrinterError> {
        if self.is_connected().await {
            Ok(())
        } else {
            Err(PrinterError::Transport("printer not connected".to_string()))
        }
    }

    /// Transmit a compiled byte stream as one job.
    pub async fn send(&self, bytes: &[u8]) -> Result<usize, PrinterError> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| PrinterError::Transport("printer not connected".to_string()))?;

        let job = Uuid::new_v4();
        let span = info_span!("job", id = %job);

        async {
            // Notifications from before this job don't count against it
            if let Some(queue) = &self.notifications {
                queue.drain();
            }
            self.overrun.store(false, Ordering::SeqCst);

            let packets = self
                .writer
                .transmit_checked(bytes, self.transport.as_ref(), device, || self.check_overrun())
                .await?;
            self.check_overrun()?;

            info!(bytes = bytes.len(), packets, "job sent");
            Ok(packets)
        }
        .instrument(span)
        .await
    }
}

/// Notifications of one connection.
///
/// Drained by both the watcher task and the job being transmitted. Each
/// notification is handled while the receiver is locked, so once a drain
/// returns every overrun delivered so far has already raised the flag.
struct NotificationQueue {
    receiver: StdMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    events: broadcast::Sender<SessionEvent>,
    overrun: Arc<AtomicBool>,
}

impl NotificationQueue {
    fn lock(&self) -> std::sync::MutexGuard<'_, mpsc::UnboundedReceiver<Vec<u8>>> {
        self.receiver.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Handle everything already queued.
    fn drain(&self) {
        let mut receiver = self.lock();
        while let Ok(bytes) = receiver.try_recv() {
            self.handle(&bytes);
        }
    }

    /// Wait for and handle one notification. False once the stream closed.
    async fn next(&self) -> bool {
        poll_fn(|cx| {
            let mut receiver = self.lock();
            match receiver.poll_recv(cx) {
                Poll::Ready(Some(bytes)) => {
                    self.handle(&bytes);
                    Poll::Ready(true)
                }
                Poll::Ready(None) => Poll::Ready(false),
                Poll::Pending => Poll::Pending,
            }
        })
        .await
    }

    fn handle(&self, bytes: &[u8]) {
        let event = decode_notification(bytes);
        debug!(bytes = ?bytes, event = ?event, "notification");

        match &event {
            StatusEvent::Overrun => {
                error!("printer buffer overrun, data was lost");
                self.overrun.store(true, Ordering::SeqCst);
            }
            StatusEvent::Status(status) if !status.is_ok() => {
                warn!(status = %status.describe(), "printer status");
            }
            _ => {}
        }

        let _ = self.events.send(SessionEvent::Device(event));
    }
}

/// Run [`PrinterSession::tick`] every `period` until the task is aborted.
///
/// The first tick fires immediately.
pub fn spawn_monitor(session: Arc<Mutex<PrinterSession>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            session.lock().await.tick().await;
        }
    })
}
