//! The currently selected image.
//!
//! The shell hands over the raw bytes and a display reference it has already
//! prepared (usually a resized data URL). The core only decides whether the
//! selection is an image it is willing to upload.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MAX_IMAGE_BYTES;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("'{media_type}' is not an image")]
    NotAnImage { media_type: String },
    #[error("file is empty")]
    Empty,
    #[error("file is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHandle {
    name: String,
    media_type: String,
    #[serde(with = "serde_bytes")]
    bytes: Vec<u8>,
    display_src: String,
}

impl std::fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHandle")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

impl ImageHandle {
    /// Accepts a selection if the declared type is `image/*`, or, when the
    /// shell could not tell, if the magic bytes are a known image format.
    pub fn from_selection(
        name: impl Into<String>,
        declared_type: Option<&str>,
        bytes: Vec<u8>,
        display_src: impl Into<String>,
    ) -> Result<Self, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge {
                size: bytes.len(),
                max: MAX_IMAGE_BYTES,
            });
        }

        let declared = declared_type.map(str::trim).filter(|t| !t.is_empty());
        let media_type = match declared {
            Some(t) if t.to_ascii_lowercase().starts_with("image/") => t.to_string(),
            Some(t) => {
                return Err(ImageError::NotAnImage {
                    media_type: t.to_string(),
                })
            }
            None => sniff_media_type(&bytes).ok_or_else(|| ImageError::NotAnImage {
                media_type: "unknown".to_string(),
            })?,
        };

        Ok(Self {
            name: name.into(),
            media_type,
            bytes,
            display_src: display_src.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn display_src(&self) -> &str {
        &self.display_src
    }
}

fn sniff_media_type(bytes: &[u8]) -> Option<String> {
    let format = image::guess_format(bytes).ok()?;
    let media_type = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Avif => "image/avif",
        _ => return None,
    };
    Some(media_type.to_string())
}

/// Human-readable size, e.g. `"1.5 MB"`. Binary multiples, two decimals
/// with trailing zeros dropped.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    #[allow(clippy::cast_precision_loss)]
    let value = bytes as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let exponent = ((value.ln() / 1024f64.ln()).floor() as usize).min(UNITS.len() - 1);
    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    let scaled = value / 1024f64.powi(exponent as i32);
    let rounded = (scaled * 100.0).round() / 100.0;

    let mut number = format!("{rounded:.2}");
    while number.ends_with('0') {
        number.pop();
    }
    if number.ends_with('.') {
        number.pop();
    }
    format!("{number} {}", UNITS[exponent])
}
