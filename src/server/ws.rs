//! WebSocket endpoint.
//!
//! ## Protocol
//!
//! Client → server:
//!
//! ```json
//! { "type": "text",  "data": "holi" }
//! { "type": "image", "data": "https://…" | "data:image/png;base64,…" }
//! ```
//!
//! Server → client, `type` is `status`, `info` or `error`:
//!
//! ```json
//! { "type": "info", "message": "Print job complete." }
//! ```
//!
//! Printer events (connect, disconnect, device status) are pushed to every
//! open socket.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::source::ImageSource;
use super::state::AppState;
use crate::protocol::status::StatusEvent;
use crate::render::prepare::prepare;
use crate::render::text::TextRenderer;
use crate::session::SessionEvent;

/// An incoming request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientRequest {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Status,
    Info,
    Error,
}

/// An outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub message: String,
}

impl ServerMessage {
    pub fn status(message: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Status,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            message: message.into(),
        }
    }

    /// What clients are told about a session event, if anything.
    pub fn from_event(event: &SessionEvent) -> Option<Self> {
        match event {
            SessionEvent::Connected { .. } => Some(Self::status("Printer connected.")),
            SessionEvent::Disconnected { .. } => {
                Some(Self::status("Printer disconnected. Trying to reconnect..."))
            }
            SessionEvent::Device(StatusEvent::Overrun) => {
                Some(Self::error("Printer buffer overrun, data was lost."))
            }
            SessionEvent::Device(StatusEvent::Status(status)) if !status.is_ok() => {
                Some(Self::status(format!("Printer status: {}.", status.describe())))
            }
            SessionEvent::Device(_) => None,
        }
    }
}

/// GET / (upgrade)
pub async fn handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_session(socket, state))
}

async fn client_session(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut pending) = mpsc::unbounded_channel::<ServerMessage>();
    info!("client connected");

    let connected = state.session.lock().await.is_connected().await;
    let _ = outbox.send(ServerMessage::status(if connected {
        "Printer connected."
    } else {
        "Printer not connected."
    }));

    let writer = tokio::spawn(async move {
        while let Some(message) = pending.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let forwarder = tokio::spawn(forward_events(state.events.subscribe(), outbox.clone()));

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_request(&state, &text, &outbox).await,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    forwarder.abort();
    writer.abort();
    info!("client disconnected");
}

async fn forward_events(mut events: broadcast::Receiver<SessionEvent>, outbox: mpsc::UnboundedSender<ServerMessage>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(message) = ServerMessage::from_event(&event)
                    && outbox.send(message).is_err()
                {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "client lagged behind printer events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Handle one text frame from a client, replying through `outbox`.
pub async fn handle_request(state: &AppState, text: &str, outbox: &mpsc::UnboundedSender<ServerMessage>) {
    let reply = |message: ServerMessage| {
        let _ = outbox.send(message);
    };

    if !state.session.lock().await.is_connected().await {
        reply(ServerMessage::error("Printer not available."));
        return;
    }

    let request: ClientRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(_) => {
            reply(ServerMessage::error("Invalid JSON."));
            return;
        }
    };
    debug!(kind = %request.kind, len = request.data.len(), "request");

    let image = match request.kind.as_str() {
        "text" => state
            .renderer
            .render_text(&request.data, &state.config.text_style)
            .map(image::DynamicImage::ImageLuma8),
        "image" => match ImageSource::parse(&request.data) {
            Some(Ok(source)) => source.load(&state.http).await,
            Some(Err(e)) => Err(e),
            None => {
                reply(ServerMessage::error("Invalid image format."));
                return;
            }
        },
        _ => {
            reply(ServerMessage::error("Invalid request type."));
            return;
        }
    };

    let result = match image {
        Ok(image) => {
            reply(ServerMessage::info("Printing..."));
            print_image(state, image).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => reply(ServerMessage::info("Print job complete.")),
        Err(e) => {
            warn!(error = %e, "print failed");
            reply(ServerMessage::error(format!("Printing failed: {}", e)));
        }
    }
}

async fn print_image(state: &AppState, image: image::DynamicImage) -> Result<(), crate::error::PrinterError> {
    let width = state.print_width;
    let prepared = tokio::task::spawn_blocking(move || prepare(&image, width))
        .await
        .map_err(|e| crate::error::PrinterError::Image(format!("Image task failed: {}", e)))??;

    state.session.lock().await.print(&[prepared]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::PrinterConfig;
    use crate::protocol::status::DeviceStatus;
    use crate::server::state::ServerConfig;
    use crate::session::PrinterSession;
    use crate::transport::{DeviceDescriptor, MemoryTransport};
    use tokio::sync::Mutex;

    async fn app(connected: bool) -> (Arc<MemoryTransport>, AppState) {
        let transport = Arc::new(MemoryTransport::with_devices(vec![DeviceDescriptor::new("MX06", "mem:0")]));
        let config = PrinterConfig {
            packet_delay_ms: None,
            ..PrinterConfig::default()
        };
        let mut session = PrinterSession::new(transport.clone(), config);
        if connected {
            session.connect().await.unwrap();
        }
        let state = AppState::new(ServerConfig::default(), Arc::new(Mutex::new(session)))
            .await
            .unwrap();
        (transport, state)
    }

    async fn run(state: &AppState, text: &str) -> Vec<ServerMessage> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_request(state, text, &tx).await;
        drop(tx);
        let mut replies = Vec::new();
        while let Some(message) = rx.recv().await {
            replies.push(message);
        }
        replies
    }

    #[test]
    fn test_message_json() {
        let json = serde_json::to_string(&ServerMessage::info("Printing...")).unwrap();
        assert_eq!(json, r#"{"type":"info","message":"Printing..."}"#);
    }

    #[test]
    fn test_event_messages() {
        let connected = SessionEvent::Connected {
            device: DeviceDescriptor::new("MX06", "mem:0"),
        };
        assert_eq!(
            ServerMessage::from_event(&connected),
            Some(ServerMessage::status("Printer connected."))
        );
        let low = SessionEvent::Device(StatusEvent::Status(DeviceStatus::from_bits(0b1000)));
        assert_eq!(
            ServerMessage::from_event(&low),
            Some(ServerMessage::status("Printer status: low battery."))
        );
        assert_eq!(ServerMessage::from_event(&SessionEvent::Device(StatusEvent::Resumed)), None);
    }

    #[tokio::test]
    async fn test_text_request_prints() {
        let (transport, state) = app(true).await;
        let replies = run(&state, r#"{"type":"text","data":"holi"}"#).await;
        assert_eq!(
            replies,
            vec![
                ServerMessage::info("Printing..."),
                ServerMessage::info("Print job complete."),
            ]
        );
        assert!(!transport.written_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_printer_not_available() {
        let (_, state) = app(false).await;
        let replies = run(&state, r#"{"type":"text","data":"holi"}"#).await;
        assert_eq!(replies, vec![ServerMessage::error("Printer not available.")]);
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let (transport, state) = app(true).await;
        assert_eq!(run(&state, "{nope").await, vec![ServerMessage::error("Invalid JSON.")]);
        assert_eq!(
            run(&state, r#"{"type":"qr","data":"x"}"#).await,
            vec![ServerMessage::error("Invalid request type.")]
        );
        assert_eq!(
            run(&state, r#"{"type":"image","data":"file:///etc/passwd"}"#).await,
            vec![ServerMessage::error("Invalid image format.")]
        );
        assert!(transport.writes().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_image_reports_failure() {
        let (_, state) = app(true).await;
        let replies = run(&state, r#"{"type":"image","data":"data:image/png;base64,AAAA"}"#).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].kind, MessageKind::Error);
        assert!(replies[0].message.starts_with("Printing failed: "));
    }
}
