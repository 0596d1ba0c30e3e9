//! # Session Tests
//!
//! Drive a [`PrinterSession`] against the in-memory printer: connection
//! management, packetized transmission and device notifications.

use std::sync::Arc;
use std::time::Duration;

use catprint::protocol::commands::{Command, XOFF};
use catprint::protocol::frame::encode_frame;
use catprint::protocol::status::{DeviceStatus, StatusEvent};
use catprint::transport::{DeviceDescriptor, SERVICE_UUID, WRITE_CHARACTERISTIC};
use catprint::{ConnectionState, MemoryTransport, PreparedImage, PrinterConfig, PrinterError, PrinterSession, SessionEvent};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast::error::TryRecvError;

// ============================================================================
// HELPERS
// ============================================================================

fn mx06() -> DeviceDescriptor {
    DeviceDescriptor::new("MX06", "AA:BB:CC:DD:EE:FF")
}

fn config() -> PrinterConfig {
    PrinterConfig {
        packet_delay_ms: None,
        scan_duration_ms: 0,
        ..PrinterConfig::default()
    }
}

fn setup(devices: Vec<DeviceDescriptor>) -> (Arc<MemoryTransport>, PrinterSession) {
    let transport = Arc::new(MemoryTransport::with_devices(devices));
    let session = PrinterSession::new(transport.clone(), config());
    (transport, session)
}

fn checkerboard(height: u32) -> PreparedImage {
    let pixels = (0..384 * height)
        .map(|i| if (i % 384 + i / 384) % 2 == 0 { 0 } else { 255 })
        .collect();
    PreparedImage::new(384, height, pixels).unwrap()
}

// ============================================================================
// CONNECTION
// ============================================================================

#[tokio::test]
async fn test_connection_lifecycle_events() {
    let (transport, mut session) = setup(vec![]);
    let mut events = session.subscribe();

    // Nothing to find yet
    assert!(!session.tick().await);
    assert!(matches!(events.try_recv(), Ok(SessionEvent::Disconnected { .. })));

    // Printer appears
    transport.set_devices(vec![DeviceDescriptor::new("GB02", "11:22:33:44:55:66"), mx06()]);
    assert!(session.tick().await);
    assert_eq!(events.try_recv(), Ok(SessionEvent::Connected { device: mx06() }));
    assert_eq!(session.device(), Some(&mx06()));

    // Steady state is silent
    assert!(session.tick().await);
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

    // Printer goes away for good
    transport.drop_connection();
    transport.set_devices(vec![]);
    assert!(!session.tick().await);
    assert!(matches!(events.try_recv(), Ok(SessionEvent::Disconnected { .. })));
    assert_eq!(session.state(), ConnectionState::Disconnected);
    assert_eq!(session.device(), None);
}

#[tokio::test]
async fn test_disconnect_releases_device() {
    let (transport, mut session) = setup(vec![mx06()]);
    session.connect().await.unwrap();
    assert_eq!(transport.subscriber_count(), 1);

    session.disconnect().await.unwrap();
    assert!(!session.is_connected().await);
    assert_eq!(transport.subscriber_count(), 0);
    assert!(matches!(session.feed(10).await, Err(PrinterError::Transport(_))));
}

// ============================================================================
// TRANSMISSION
// ============================================================================

#[tokio::test]
async fn test_print_is_packetized() {
    let (transport, mut session) = setup(vec![mx06()]);
    session.connect().await.unwrap();

    let images = [checkerboard(5), checkerboard(2)];
    let expected = session.compiler().compile(&images, 40).unwrap();
    let packets = session.print(&images).await.unwrap();

    let writes = transport.writes();
    assert_eq!(packets, expected.len().div_ceil(60));
    assert_eq!(writes.len(), packets);
    assert!(writes.iter().all(|w| w.data.len() <= 60));
    assert!(writes[..writes.len() - 1].iter().all(|w| w.data.len() == 60));
    assert!(
        writes
            .iter()
            .all(|w| w.service == SERVICE_UUID && w.characteristic == WRITE_CHARACTERISTIC && w.device == mx06())
    );
    assert_eq!(transport.written_bytes(), expected);
}

#[tokio::test]
async fn test_failed_write_aborts_job() {
    let (transport, mut session) = setup(vec![mx06()]);
    session.connect().await.unwrap();
    transport.fail_write_at(3);

    let err = session.print(&[checkerboard(20)]).await.unwrap_err();
    assert!(matches!(err, PrinterError::Transport(_)));
    // Nothing after the failing packet was sent
    assert_eq!(transport.writes().len(), 3);

    // The next job goes through
    transport.clear_writes();
    session.feed(5).await.unwrap();
    assert_eq!(transport.writes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_packets_are_paced() {
    let transport = Arc::new(MemoryTransport::with_devices(vec![mx06()]));
    let config = PrinterConfig {
        packet_delay_ms: Some(10),
        scan_duration_ms: 0,
        ..PrinterConfig::default()
    };
    let mut session = PrinterSession::new(transport.clone(), config);
    session.connect().await.unwrap();

    let start = tokio::time::Instant::now();
    let packets = session.print(&[checkerboard(4)]).await.unwrap();
    let elapsed = start.elapsed();

    let gaps = Duration::from_millis(10) * (packets as u32 - 1);
    assert!(elapsed >= gaps, "{:?} < {:?}", elapsed, gaps);
    assert!(elapsed < gaps + Duration::from_millis(10));
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

#[tokio::test]
async fn test_overrun_mid_job_is_fatal() {
    let (transport, mut session) = setup(vec![mx06()]);
    let mut events = session.subscribe();
    session.connect().await.unwrap();
    transport.notify_after_write(2, &XOFF);

    let err = session.print(&[checkerboard(30)]).await.unwrap_err();
    assert!(matches!(err, PrinterError::DeviceFault { fatal: true, .. }));
    assert!(err.is_fatal_for_job());

    assert!(matches!(events.recv().await, Ok(SessionEvent::Connected { .. })));
    assert_eq!(events.recv().await, Ok(SessionEvent::Device(StatusEvent::Overrun)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overrun_stops_transmission() {
    let (transport, mut session) = setup(vec![mx06()]);
    session.connect().await.unwrap();
    transport.notify_after_write(0, &XOFF);

    let images = [checkerboard(100)];
    let total = session.compiler().compile(&images, 40).unwrap().len().div_ceil(60);
    assert!(total > 50);

    let err = session.print(&images).await.unwrap_err();
    assert!(matches!(err, PrinterError::DeviceFault { fatal: true, .. }));
    // The packet that triggered the overrun is the last one sent
    assert_eq!(transport.writes().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overrun_on_last_packet_fails_job() {
    let (transport, mut session) = setup(vec![mx06()]);
    session.connect().await.unwrap();

    let images = [checkerboard(8)];
    let total = session.compiler().compile(&images, 40).unwrap().len().div_ceil(60);

    for _ in 0..50 {
        transport.clear_writes();
        transport.notify_after_write(total - 1, &XOFF);

        let result = session.print(&images).await;
        assert!(matches!(result, Err(PrinterError::DeviceFault { fatal: true, .. })));
        assert_eq!(transport.writes().len(), total);
    }

    // A clean job afterwards succeeds
    transport.clear_writes();
    assert_eq!(session.print(&images).await.unwrap(), total);
}

#[tokio::test]
async fn test_request_info() {
    let (transport, mut session) = setup(vec![mx06()]);
    let mut events = session.subscribe();
    session.connect().await.unwrap();

    let reply = encode_frame(Command::GetDevInfo.id(), b"MX06-1.2").unwrap();
    transport.notify_after_write(0, &reply);

    session.request_info().await.unwrap();
    assert_eq!(
        transport.written_bytes(),
        encode_frame(Command::GetDevInfo.id(), &[0x00]).unwrap()
    );

    assert!(matches!(events.recv().await, Ok(SessionEvent::Connected { .. })));
    assert_eq!(
        events.recv().await,
        Ok(SessionEvent::Device(StatusEvent::Info(b"MX06-1.2".to_vec())))
    );
}

#[tokio::test]
async fn test_request_status() {
    let (transport, mut session) = setup(vec![mx06()]);
    let mut events = session.subscribe();
    session.connect().await.unwrap();

    let reply = encode_frame(Command::GetDevState.id(), &[0b0001]).unwrap();
    transport.notify_after_write(0, &reply);

    session.request_status().await.unwrap();
    assert!(matches!(events.recv().await, Ok(SessionEvent::Connected { .. })));
    assert_eq!(
        events.recv().await,
        Ok(SessionEvent::Device(StatusEvent::Status(DeviceStatus::from_bits(0b0001))))
    );
}

#[tokio::test]
async fn test_status_notification_is_advisory() {
    let (transport, mut session) = setup(vec![mx06()]);
    let mut events = session.subscribe();
    session.connect().await.unwrap();

    // GetDevState reply: low battery
    let reply = encode_frame(0xA3, &[0b1000]).unwrap();
    transport.notify_after_write(0, &reply);

    session.print(&[checkerboard(2)]).await.unwrap();

    assert!(matches!(events.recv().await, Ok(SessionEvent::Connected { .. })));
    assert_eq!(
        events.recv().await,
        Ok(SessionEvent::Device(StatusEvent::Status(DeviceStatus::from_bits(0b1000))))
    );
}
