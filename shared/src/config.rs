use serde::{Deserialize, Serialize};

use crate::capabilities::ValidatedUrl;
use crate::progress::ProgressConfig;
use crate::{AppError, AppResult, ErrorKind, MAX_RETRIES, UPLOAD_FIELD_NAME};

pub const DEFAULT_ANALYZE_URL: &str = "https://mdebono.pythonanywhere.com/analyze";
pub const DEFAULT_LOAD_CONFIG_URL: &str = "https://mdebono.pythonanywhere.com/load_config";
pub const DEFAULT_SAVE_CONFIG_URL: &str = "https://mdebono.pythonanywhere.com/save_config";

/// Runtime settings the shell may override at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub analyze_url: String,
    pub load_config_url: String,
    pub save_config_url: String,
    pub max_retries: u32,
    pub upload_field: String,
    pub progress: ProgressConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            analyze_url: DEFAULT_ANALYZE_URL.to_string(),
            load_config_url: DEFAULT_LOAD_CONFIG_URL.to_string(),
            save_config_url: DEFAULT_SAVE_CONFIG_URL.to_string(),
            max_retries: MAX_RETRIES,
            upload_field: UPLOAD_FIELD_NAME.to_string(),
            progress: ProgressConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> AppResult<()> {
        for (name, url) in [
            ("analyze_url", &self.analyze_url),
            ("load_config_url", &self.load_config_url),
            ("save_config_url", &self.save_config_url),
        ] {
            ValidatedUrl::new(url.as_str())
                .map_err(|e| AppError::from(e).with_context("field", name))?;
        }

        if self.max_retries == 0 {
            return Err(AppError::new(ErrorKind::Config, "max_retries must be at least 1"));
        }
        if self.upload_field.trim().is_empty() {
            return Err(AppError::new(ErrorKind::Config, "upload_field cannot be empty"));
        }

        let progress = &self.progress;
        if progress.ceiling_percent == 0 || progress.ceiling_percent > 100 {
            return Err(AppError::new(
                ErrorKind::Config,
                format!("progress ceiling {} is outside 1..=100", progress.ceiling_percent),
            ));
        }
        if progress.step_percent == 0 || progress.tick_interval_ms == 0 {
            return Err(AppError::new(
                ErrorKind::Config,
                "progress step and tick interval must be non-zero",
            ));
        }
        Ok(())
    }

    pub fn analyze_url(&self) -> AppResult<ValidatedUrl> {
        Ok(ValidatedUrl::new(self.analyze_url.as_str())?)
    }

    pub fn load_config_url(&self) -> AppResult<ValidatedUrl> {
        Ok(ValidatedUrl::new(self.load_config_url.as_str())?)
    }

    pub fn save_config_url(&self) -> AppResult<ValidatedUrl> {
        Ok(ValidatedUrl::new(self.save_config_url.as_str())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.upload_field, "image");
        assert_eq!(config.analyze_url().unwrap().host(), "mdebono.pythonanywhere.com");
    }

    #[test]
    fn test_rejects_bad_url() {
        let config = ClientConfig {
            save_config_url: "ftp://example.com/save".into(),
            ..ClientConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
        assert_eq!(err.context.get("field").map(String::as_str), Some("save_config_url"));
    }

    #[test]
    fn test_rejects_zero_retries_and_bad_progress() {
        let config = ClientConfig {
            max_retries: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            progress: ProgressConfig {
                ceiling_percent: 120,
                ..ProgressConfig::default()
            },
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserializes_from_json() {
        let mut value = serde_json::to_value(ClientConfig::default()).unwrap();
        value["analyze_url"] = "http://localhost:5000/analyze".into();
        let config: ClientConfig = serde_json::from_value(value).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.analyze_url().unwrap().host(), "localhost");
    }
}
