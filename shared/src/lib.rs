// lib.rs - hazard analysis client core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod analysis;
pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod image_source;
pub mod model;
pub mod multipart;
pub mod progress;
pub mod prompt_config;
pub mod report;
pub mod validation;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::App as CruxApp;
pub use event::Event;
pub use model::{Model, UiState, ViewModel};

pub const MAX_RETRIES: u32 = 3;
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
pub const UPLOAD_FIELD_NAME: &str = "image";

pub const NO_FILE_SELECTED_MESSAGE: &str = "No file selected for analysis!";
pub const NOT_AN_IMAGE_MESSAGE: &str = "Please select an image file!";
pub const EXHAUSTED_RETRIES_MESSAGE: &str = "The analysis could not be completed because the AI \
returned inconsistent data after multiple attempts. Please try again.";
pub const NETWORK_FAILURE_MESSAGE: &str =
    "The analysis service could not be reached. Please check your connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Input,
    ImageFormatUnsupported,
    ImageTooLarge,
    Network,
    Server,
    Deserialization,
    Validation,
    RetriesExhausted,
    Config,
    InvalidState,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Input => "INPUT_ERROR",
            Self::ImageFormatUnsupported => "IMAGE_FORMAT_UNSUPPORTED",
            Self::ImageTooLarge => "IMAGE_TOO_LARGE",
            Self::Network => "NETWORK_ERROR",
            Self::Server => "SERVER_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::RetriesExhausted => "RETRIES_EXHAUSTED",
            Self::Config => "CONFIG_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Only malformed-but-delivered analysis output earns another attempt.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Validation)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Input | ErrorKind::Server | ErrorKind::Config | ErrorKind::InvalidState => {
                self.message.clone()
            }
            ErrorKind::ImageFormatUnsupported => NOT_AN_IMAGE_MESSAGE.into(),
            ErrorKind::ImageTooLarge => format!(
                "The image is too large. Please use an image smaller than {} MB.",
                MAX_IMAGE_BYTES / (1024 * 1024)
            ),
            ErrorKind::Network => NETWORK_FAILURE_MESSAGE.into(),
            ErrorKind::Deserialization => {
                "The analysis service returned a response that could not be read. Please try again."
                    .into()
            }
            ErrorKind::Validation | ErrorKind::RetriesExhausted => EXHAUSTED_RETRIES_MESSAGE.into(),
            ErrorKind::Internal => "An unexpected error occurred. Please try again.".into(),
        }
    }

    /// Builds a server error from a non-success status, preferring the `error`
    /// text of a JSON body over the bare status line.
    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>) -> Self {
        let message = body
            .and_then(|b| serde_json::from_slice::<ApiErrorResponse>(b).ok())
            .and_then(|e| e.error)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Server Error {status}"));

        Self::new(ErrorKind::Server, message).with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

pub type AppResult<T> = Result<T, AppError>;

impl From<validation::ValidationError> for AppError {
    fn from(e: validation::ValidationError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

impl From<capabilities::TransportError> for AppError {
    fn from(e: capabilities::TransportError) -> Self {
        match &e {
            capabilities::TransportError::Network { .. } => {
                AppError::new(ErrorKind::Network, "Network error").with_internal(e.to_string())
            }
            capabilities::TransportError::InvalidUrl { .. } => {
                AppError::new(ErrorKind::Config, e.to_string())
            }
        }
    }
}

impl From<image_source::ImageError> for AppError {
    fn from(e: image_source::ImageError) -> Self {
        let kind = match &e {
            image_source::ImageError::NotAnImage { .. } | image_source::ImageError::Empty => {
                ErrorKind::ImageFormatUnsupported
            }
            image_source::ImageError::TooLarge { .. } => ErrorKind::ImageTooLarge,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<prompt_config::ConfigError> for AppError {
    fn from(e: prompt_config::ConfigError) -> Self {
        AppError::new(ErrorKind::Config, e.to_string())
    }
}

impl From<multipart::MultipartError> for AppError {
    fn from(e: multipart::MultipartError) -> Self {
        AppError::new(ErrorKind::Internal, "Could not build the upload request")
            .with_internal(e.to_string())
    }
}
