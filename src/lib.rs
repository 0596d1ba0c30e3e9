//! # catprint - Thermal Printer Library
//!
//! catprint drives MX06-family "cat" thermal printers (384 dots wide). It
//! provides:
//!
//! - **Protocol implementation**: frame codec, CRC-8, command builders,
//!   notification decoding
//! - **Image pipeline**: fit to the print head, rotate, Floyd-Steinberg dithering
//! - **Text rendering**: bitmap and TrueType fonts, word wrapping
//! - **Job compiler**: the complete frame sequence for a print job
//! - **Transport**: paced packet writer, connection manager, print server
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use catprint::{
//!     PrinterConfig, PrinterSession,
//!     render::{prepare::prepare, text::{TextRasterizer, TextRenderer, TextStyle}},
//!     transport::FileTransport,
//! };
//!
//! # async fn demo() -> Result<(), catprint::PrinterError> {
//! let config = PrinterConfig::default();
//!
//! // Render text to a greyscale raster, then dither it for the print head
//! let raster = TextRasterizer::default().render_text("holi", &TextStyle::default())?;
//! let prepared = prepare(&image::DynamicImage::ImageLuma8(raster), config.print_width)?;
//!
//! // Connect and print
//! let transport = Arc::new(FileTransport::new("/dev/rfcomm0"));
//! let mut session = PrinterSession::new(transport, config);
//! session.connect().await?;
//! session.print(&[prepared]).await?;
//! session.disconnect().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | Frames, checksum, commands, notifications |
//! | [`render`] | Image preparation, dithering, bit packing, text |
//! | [`job`] | Print job compiler |
//! | [`transport`] | Transport trait, packet writer, backends |
//! | [`session`] | Connection manager and printing entry point |
//! | [`server`] | WebSocket print server |
//! | [`printer`] | Configuration |
//! | [`error`] | Error types |

pub mod error;
pub mod job;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod server;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::PrinterError;
pub use job::JobCompiler;
pub use printer::PrinterConfig;
pub use render::prepare::PreparedImage;
pub use session::{ConnectionState, PrinterSession, SessionEvent};
pub use transport::{FileTransport, MemoryTransport, PacketWriter, Transport};
