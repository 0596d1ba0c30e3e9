//! # Print Server
//!
//! A WebSocket service that prints text and images sent by clients and
//! keeps them informed about the printer.
//!
//! ## Usage
//!
//! ```bash
//! catprint serve --listen 0.0.0.0:8080 --transport file:/dev/rfcomm0
//! ```
//!
//! Then connect a WebSocket client to `ws://localhost:8080/` (see [`ws`] for
//! the message format).
//!
//! The connection monitor runs alongside the server and reconnects to the
//! printer whenever it drops out.

mod source;
mod state;
pub mod ws;

pub use source::ImageSource;
pub use state::{AppState, DEFAULT_LISTEN_ADDR, ServerConfig};

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::PrinterError;
use crate::session::{PrinterSession, spawn_monitor};

/// Start the WebSocket server and the connection monitor.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio::sync::Mutex;
/// use catprint::printer::PrinterConfig;
/// use catprint::server::{serve, ServerConfig};
/// use catprint::session::PrinterSession;
/// use catprint::transport::FileTransport;
///
/// # async fn example() -> Result<(), catprint::error::PrinterError> {
/// let transport = Arc::new(FileTransport::new("/dev/rfcomm0"));
/// let session = PrinterSession::new(transport, PrinterConfig::default());
/// serve(ServerConfig::default(), Arc::new(Mutex::new(session))).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig, session: Arc<Mutex<PrinterSession>>) -> Result<(), PrinterError> {
    let poll_interval = session.lock().await.config().poll_interval();
    let monitor = spawn_monitor(session.clone(), poll_interval);

    let listen_addr = config.listen_addr.clone();
    let app_state = Arc::new(AppState::new(config, session).await?);

    let app = Router::new()
        .route("/", get(ws::handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| PrinterError::Transport(format!("Failed to bind to {}: {}", listen_addr, e)))?;

    info!(addr = %listen_addr, "WebSocket server started");

    let result = axum::serve(listener, app)
        .await
        .map_err(|e| PrinterError::Transport(format!("Server error: {}", e)));

    monitor.abort();
    result
}
