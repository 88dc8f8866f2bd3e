//! `multipart/form-data` encoding for the image upload.
//!
//! crux_http only carries raw bytes, so the form body is assembled here.

use thiserror::Error;
use uuid::Uuid;

use crate::capabilities::ContentType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultipartError {
    #[error("field name '{0}' is empty or contains quotes or line breaks")]
    InvalidFieldName(String),
    #[error("boundary occurs inside the part payload")]
    BoundaryCollision,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn content_type(&self) -> ContentType {
        ContentType::Multipart {
            boundary: self.boundary.clone(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[must_use]
pub fn generate_boundary() -> String {
    format!("----HazardFormBoundary{}", Uuid::new_v4().simple())
}

/// Quotes and line breaks in file names would break the part header.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '"' | '\r' | '\n' | '\\' => '_',
            other => other,
        })
        .collect();
    if cleaned.trim().is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Encodes a form with a single file part.
pub fn encode_file_part(
    boundary: &str,
    field_name: &str,
    file_name: &str,
    media_type: &str,
    data: &[u8],
) -> Result<MultipartBody, MultipartError> {
    if field_name.is_empty() || field_name.contains(['"', '\r', '\n']) {
        return Err(MultipartError::InvalidFieldName(field_name.to_string()));
    }

    let delimiter = format!("--{boundary}");
    if data
        .windows(delimiter.len())
        .any(|w| w == delimiter.as_bytes())
    {
        return Err(MultipartError::BoundaryCollision);
    }

    let header = format!(
        "{delimiter}\r\n\
         Content-Disposition: form-data; name=\"{field_name}\"; filename=\"{}\"\r\n\
         Content-Type: {media_type}\r\n\r\n",
        sanitize_file_name(file_name),
    );
    let trailer = format!("\r\n{delimiter}--\r\n");

    let mut bytes = Vec::with_capacity(header.len() + data.len() + trailer.len());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(data);
    bytes.extend_from_slice(trailer.as_bytes());

    Ok(MultipartBody {
        boundary: boundary.to_string(),
        bytes,
    })
}

/// Encodes with a fresh random boundary, drawing again on the (unlikely)
/// event that the payload contains it.
pub fn encode_upload(
    field_name: &str,
    file_name: &str,
    media_type: &str,
    data: &[u8],
) -> Result<MultipartBody, MultipartError> {
    let mut last_error = MultipartError::BoundaryCollision;
    for _ in 0..3 {
        match encode_file_part(&generate_boundary(), field_name, file_name, media_type, data) {
            Ok(body) => return Ok(body),
            Err(MultipartError::BoundaryCollision) => {
                last_error = MultipartError::BoundaryCollision;
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_error)
}
