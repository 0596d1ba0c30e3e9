//! Server state and configuration.

use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

use crate::error::PrinterError;
use crate::render::text::{TextRasterizer, TextStyle};
use crate::session::{PrinterSession, SessionEvent};

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// User agent for image downloads.
const USER_AGENT: &str = concat!("catprint/", env!("CARGO_PKG_VERSION"));

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
    /// Style used for `text` requests
    pub text_style: TextStyle,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            text_style: TextStyle::default(),
        }
    }
}

/// Application state shared across connections.
pub struct AppState {
    pub config: ServerConfig,
    /// The one printer; holding the lock serializes jobs
    pub session: Arc<Mutex<PrinterSession>>,
    pub events: broadcast::Sender<SessionEvent>,
    pub renderer: TextRasterizer,
    pub print_width: u32,
    pub http: reqwest::Client,
}

impl AppState {
    pub async fn new(config: ServerConfig, session: Arc<Mutex<PrinterSession>>) -> Result<Self, PrinterError> {
        let (events, print_width) = {
            let session = session.lock().await;
            (session.events_sender(), session.config().print_width)
        };
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PrinterError::Transport(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            config,
            session,
            events,
            renderer: TextRasterizer::new(print_width),
            print_width,
            http,
        })
    }
}
