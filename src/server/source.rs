//! Where `image` requests get their pixels from.
//!
//! | `data` starts with | Source |
//! |--------------------|--------|
//! | `http` | downloaded with reqwest |
//! | `data:image` | base64 payload after `;base64,` |
//! | anything else | rejected |

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::DynamicImage;

use crate::error::PrinterError;

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Inline(Vec<u8>),
}

impl ImageSource {
    /// Classify a request's `data` field. `None` for unsupported formats.
    pub fn parse(data: &str) -> Option<Result<Self, PrinterError>> {
        if data.starts_with("http") {
            return Some(Ok(Self::Url(data.to_string())));
        }
        if data.starts_with("data:image") {
            let payload = data.rsplit(";base64,").next().unwrap_or_default();
            return Some(
                STANDARD
                    .decode(payload.trim())
                    .map(Self::Inline)
                    .map_err(|e| PrinterError::Image(format!("Invalid base64 payload: {}", e))),
            );
        }
        None
    }

    /// Fetch (if needed) and decode the image.
    pub async fn load(self, http: &reqwest::Client) -> Result<DynamicImage, PrinterError> {
        let bytes = match self {
            Self::Inline(bytes) => bytes,
            Self::Url(url) => {
                let response = http
                    .get(&url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| PrinterError::Transport(format!("Failed to fetch {}: {}", url, e)))?;
                response
                    .bytes()
                    .await
                    .map_err(|e| PrinterError::Transport(format!("Failed to read {}: {}", url, e)))?
                    .to_vec()
            }
        };
        image::load_from_memory(&bytes).map_err(|e| PrinterError::Image(format!("Failed to decode image: {}", e)))
    }
}
