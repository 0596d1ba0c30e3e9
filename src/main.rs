//! # catprint CLI
//!
//! Command-line interface for MX06 thermal printers.
//!
//! ## Usage
//!
//! ```bash
//! # Smoke test: discover, connect, print "holi", disconnect
//! catprint print
//!
//! # Print text and an image on a bound serial device
//! catprint print --text "hello" --image cat.png --transport file:/dev/rfcomm0
//!
//! # Compile without a printer and inspect the bytes
//! catprint dump --image cat.png -o job.bin
//!
//! # See what the dithered output will look like
//! catprint preview --text "hello" -o preview.png
//!
//! # Feed or retract paper
//! catprint feed --lines 120
//! catprint feed --lines 40 --retract
//!
//! # Run the WebSocket print server
//! catprint serve --listen 0.0.0.0:8080
//! ```
//!
//! Log verbosity follows `RUST_LOG`; `-v` switches the default to debug.

use clap::{Args, Parser, Subcommand};
use image::{DynamicImage, GrayImage, Luma, imageops};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use catprint::{
    JobCompiler, PacketWriter, PreparedImage, PrinterConfig, PrinterError, PrinterSession,
    protocol::frame::split_frames,
    render::prepare::prepare,
    render::text::{FontFace, TextRasterizer, TextRenderer, TextStyle},
    server::{self, DEFAULT_LISTEN_ADDR, ServerConfig},
    transport::{DeviceDescriptor, FileTransport, MemoryTransport, Transport, file::DEFAULT_DEVICE},
};

/// catprint - MX06 thermal printer utility
#[derive(Parser, Debug)]
#[command(name = "catprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print text and images (defaults to the text "holi")
    Print {
        #[command(flatten)]
        content: Content,

        #[command(flatten)]
        link: Link,

        /// Blank lines fed after the job (defaults to the configured value)
        #[arg(long)]
        feed: Option<u32>,
    },

    /// Compile a job and write the raw command stream to a file
    Dump {
        #[command(flatten)]
        content: Content,

        /// Output file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Blank lines fed after the job (defaults to the configured value)
        #[arg(long)]
        feed: Option<u32>,
    },

    /// Write the dithered output as PNG
    Preview {
        #[command(flatten)]
        content: Content,

        /// Output PNG file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Feed (or retract) blank paper
    Feed {
        /// Number of lines (defaults to the configured value)
        #[arg(long)]
        lines: Option<u32>,

        /// Move paper backwards instead
        #[arg(long)]
        retract: bool,

        #[command(flatten)]
        link: Link,
    },

    /// Start the WebSocket print server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
        listen: String,

        #[command(flatten)]
        link: Link,

        #[command(flatten)]
        style: StyleArgs,
    },
}

/// What to print. Text blocks come first, then images, in the order given.
#[derive(Args, Debug)]
struct Content {
    /// Text to render (repeatable)
    #[arg(long)]
    text: Vec<String>,

    /// Image file to print (repeatable)
    #[arg(long, value_name = "PATH")]
    image: Vec<PathBuf>,

    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Args, Debug)]
struct StyleArgs {
    /// TrueType font file (defaults to the built-in bitmap font)
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// Glyph height in pixels
    #[arg(long, default_value = "40")]
    font_size: u32,

    /// Line height in pixels
    #[arg(long, default_value = "40")]
    line_height: u32,
}

#[derive(Args, Debug)]
struct Link {
    /// Printer link: `memory`, `file:PATH` or `rfcomm:MAC`
    #[arg(long, default_value_t = format!("file:{}", DEFAULT_DEVICE))]
    transport: String,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "catprint=debug,tower_http=debug"
    } else {
        "catprint=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), PrinterError> {
    let config = match &cli.config {
        Some(path) => PrinterConfig::from_file(path)?,
        None => PrinterConfig::default(),
    };

    match cli.command {
        Commands::Print { content, link, feed } => {
            let images = prepare_content(&content, &config, true)?;
            let transport = open_transport(&link.transport)?;
            let mut session = PrinterSession::new(transport, config.clone());

            session.connect().await?;
            let feed = feed.unwrap_or(config.blank_lines_after_print);
            let result = session.print_with_feed(&images, feed).await;
            session.disconnect().await?;
            let packets = result?;

            println!("Printed {} image(s) in {} packets", images.len(), packets);
        }

        Commands::Dump { content, output, feed } => {
            let images = prepare_content(&content, &config, false)?;
            if images.is_empty() {
                return Err(PrinterError::Config("nothing to dump: pass --text or --image".into()));
            }
            let compiler = JobCompiler::new(config.clone());
            let bytes = compiler.compile(&images, feed.unwrap_or(config.blank_lines_after_print))?;
            std::fs::write(&output, &bytes)?;

            let frames = split_frames(&bytes)?;
            let writer = PacketWriter::from_config(&config);
            println!(
                "Wrote {} bytes to {} ({} frames, {} packets of {} bytes)",
                bytes.len(),
                output.display(),
                frames.len(),
                writer.packet_count(bytes.len()),
                writer.packet_size()
            );
        }

        Commands::Preview { content, output } => {
            let images = prepare_content(&content, &config, false)?;
            if images.is_empty() {
                return Err(PrinterError::Config("nothing to preview: pass --text or --image".into()));
            }
            let sheet = stack_previews(&images)?;
            sheet
                .save(&output)
                .map_err(|e| PrinterError::Image(format!("Failed to save {}: {}", output.display(), e)))?;
            println!(
                "Saved preview to {} ({}x{})",
                output.display(),
                sheet.width(),
                sheet.height()
            );
        }

        Commands::Feed { lines, retract, link } => {
            let lines = lines.unwrap_or(config.feed_lines);
            let transport = open_transport(&link.transport)?;
            let mut session = PrinterSession::new(transport, config);

            session.connect().await?;
            let result = if retract {
                session.retract(lines).await
            } else {
                session.feed(lines).await
            };
            session.disconnect().await?;
            result?;
        }

        Commands::Serve { listen, link, style } => {
            let transport = open_transport(&link.transport)?;
            let session = Arc::new(Mutex::new(PrinterSession::new(transport, config)));
            let server_config = ServerConfig {
                listen_addr: listen,
                text_style: style.text_style(),
            };
            server::serve(server_config, session).await?;
        }
    }

    Ok(())
}

impl StyleArgs {
    fn text_style(&self) -> TextStyle {
        TextStyle {
            font: match &self.font {
                Some(path) => FontFace::TrueType(path.clone()),
                None => FontFace::Bitmap,
            },
            font_size: self.font_size,
            line_height: self.line_height,
            ..TextStyle::default()
        }
    }
}

/// Render and prepare everything in `content`.
///
/// With `smoke_test` set and no content given, prints the text "holi".
fn prepare_content(content: &Content, config: &PrinterConfig, smoke_test: bool) -> Result<Vec<PreparedImage>, PrinterError> {
    let mut texts = content.text.clone();
    if smoke_test && texts.is_empty() && content.image.is_empty() {
        texts.push("holi".to_string());
    }

    let renderer = TextRasterizer::new(config.print_width);
    let style = content.style.text_style();
    let mut prepared = Vec::new();

    for text in &texts {
        let raster = renderer.render_text(text, &style)?;
        prepared.push(prepare(&DynamicImage::ImageLuma8(raster), config.print_width)?);
    }

    for path in &content.image {
        let image = image::open(path)
            .map_err(|e| PrinterError::Image(format!("Failed to open {}: {}", path.display(), e)))?;
        prepared.push(prepare(&image, config.print_width)?);
    }

    Ok(prepared)
}

/// Parse a `--transport` value.
fn open_transport(link: &str) -> Result<Arc<dyn Transport>, PrinterError> {
    if link == "memory" {
        return Ok(Arc::new(MemoryTransport::with_devices(vec![DeviceDescriptor::new(
            "MX06", "memory",
        )])));
    }
    if let Some(path) = link.strip_prefix("file:") {
        return Ok(Arc::new(FileTransport::new(path)));
    }
    if let Some(mac) = link.strip_prefix("rfcomm:") {
        return Ok(Arc::new(FileTransport::for_mac(mac)?));
    }
    Err(PrinterError::Config(format!(
        "unknown transport '{}' (expected memory, file:PATH or rfcomm:MAC)",
        link
    )))
}

/// Stack previews top to bottom with a grey separator row.
fn stack_previews(images: &[PreparedImage]) -> Result<GrayImage, PrinterError> {
    let width = images.iter().map(|image| image.width).max().unwrap_or(0);
    let height: u32 = images.iter().map(|image| image.height).sum::<u32>() + images.len().saturating_sub(1) as u32;

    let mut sheet = GrayImage::from_pixel(width, height, Luma([160]));
    let mut y = 0i64;
    for image in images {
        imageops::replace(&mut sheet, &image.to_preview()?, 0, y);
        y += image.height as i64 + 1;
    }
    Ok(sheet)
}
