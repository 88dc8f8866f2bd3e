//! Client side of the server-held prompt configuration.
//!
//! The analysis service applies whatever was last saved; this module keeps
//! the editable form, talks the load/save contract and produces the status
//! line shown under the form.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::TransportResult;

pub const DEFAULT_PROMPT: &str = r#"You are an experienced workplace safety inspector with a keen eye for detail.

Format your entire response as a single, valid JSON object with three top-level keys: "description", "PPE" and "hazards".

1. **description**: A description of the workplace, the number of persons identified and what they are doing. When only one person is identified, do not refer to the person as "they".

2. **PPE**: A single descriptive string summarizing the personal protective equipment (PPE) worn by each person identified. Do not use arrays or objects. Example: "The forklift operator is wearing a hard hat, high-visibility vest, and steel-toe boots. The box stacker is wearing gloves and a back support belt."

3. **hazards**: A JSON array containing a list of hazards, where each object represents one distinct safety hazard you identify. Include workplace hazards, work equipment hazards and hazards created by other people, including visitors. Aim to identify a minimum of 6 hazards.

For each hazard in the array, provide:
- 'category': e.g., "PPE", "Ergonomics".
- 'observation': A description of the specific issue.
- 'risk': The risk level: "Low", "Medium", or "High".
- 'markup': An object for the bounding box with percentage-based coordinates.

Order the hazards in the array from high risk to low risk.

If you find no hazards, the 'hazards' key must contain an empty array: [].

Your entire output must be only the JSON object, with no introductory text, comments, or markdown formatting like ```json."#;

pub const LOAD_FAILED_MESSAGE: &str =
    "Could not load configuration from server. Please check the server status and refresh.";
pub const RESET_MESSAGE: &str =
    "Form has been reset to defaults. Click \"Save Configuration\" to make this change permanent.";
pub const SAVING_MESSAGE: &str = "Saving...";
pub const SAVED_FALLBACK_MESSAGE: &str = "Configuration saved.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("prompt cannot be blank")]
    BlankPrompt,
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    pub prompt: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            temperature: 0.0,
            top_p: 1.0,
            top_k: 32,
        }
    }
}

impl PromptConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prompt.trim().is_empty() {
            return Err(ConfigError::BlankPrompt);
        }
        if !self.temperature.is_finite() {
            return Err(ConfigError::NonFinite { field: "temperature" });
        }
        if !self.top_p.is_finite() {
            return Err(ConfigError::NonFinite { field: "top_p" });
        }
        Ok(())
    }

    /// Form display trims the prompt.
    #[must_use]
    pub fn for_form(mut self) -> Self {
        self.prompt = self.prompt.trim().to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusKind {
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigStatus {
    pub kind: StatusKind,
    pub message: String,
}

impl ConfigStatus {
    fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Server answered with an error status; the form falls back to defaults.
    Defaulted { status: u16 },
    Failed { reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SaveReply {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptConfigState {
    pub form: PromptConfig,
    pub status: Option<ConfigStatus>,
    pub loading: bool,
    pub saving: bool,
}

impl Default for PromptConfigState {
    fn default() -> Self {
        Self {
            form: PromptConfig::default().for_form(),
            status: None,
            loading: false,
            saving: false,
        }
    }
}

impl PromptConfigState {
    pub fn begin_load(&mut self) {
        self.loading = true;
    }

    pub fn apply_load(&mut self, result: TransportResult) -> LoadOutcome {
        self.loading = false;
        let outcome = match result {
            Ok(response) if response.is_success() => match response.json::<PromptConfig>() {
                Ok(config) => {
                    self.form = config.for_form();
                    LoadOutcome::Loaded
                }
                Err(e) => LoadOutcome::Failed {
                    reason: e.to_string(),
                },
            },
            Ok(response) => {
                self.form = PromptConfig::default().for_form();
                LoadOutcome::Defaulted {
                    status: response.status(),
                }
            }
            Err(e) => LoadOutcome::Failed {
                reason: e.to_string(),
            },
        };
        if matches!(outcome, LoadOutcome::Failed { .. }) {
            self.status = Some(ConfigStatus::new(StatusKind::Error, LOAD_FAILED_MESSAGE));
        }
        outcome
    }

    /// Validates `config` and marks a save as pending. The returned config is
    /// what should be posted.
    pub fn begin_save(&mut self, config: PromptConfig) -> Result<PromptConfig, ConfigError> {
        if let Err(e) = config.validate() {
            self.status = Some(ConfigStatus::new(StatusKind::Error, format!("Error: {e}")));
            return Err(e);
        }
        self.form = config.clone();
        self.saving = true;
        self.status = Some(ConfigStatus::new(StatusKind::Pending, SAVING_MESSAGE));
        Ok(config)
    }

    /// Returns true when the server accepted the save.
    pub fn apply_save(&mut self, result: TransportResult) -> bool {
        self.saving = false;
        let (kind, message) = match result {
            Ok(response) => {
                let reply: SaveReply = response.json().unwrap_or_default();
                if response.is_success() {
                    let message = reply
                        .message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| SAVED_FALLBACK_MESSAGE.to_string());
                    (StatusKind::Success, message)
                } else {
                    let reason = reply
                        .error
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| format!("Server Error {}", response.status()));
                    (StatusKind::Error, format!("Error: {reason}"))
                }
            }
            Err(e) => (StatusKind::Error, format!("Error: {e}")),
        };
        let accepted = kind == StatusKind::Success;
        self.status = Some(ConfigStatus::new(kind, message));
        accepted
    }

    pub fn reset_to_defaults(&mut self) {
        self.form = PromptConfig::default().for_form();
        self.status = Some(ConfigStatus::new(StatusKind::Success, RESET_MESSAGE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{TransportError, TransportResponse};

    fn custom() -> PromptConfig {
        PromptConfig {
            prompt: "  Find hazards.  ".into(),
            temperature: 0.4,
            top_p: 0.9,
            top_k: 16,
        }
    }

    mod validate_tests {
        use super::*;

        #[test]
        fn test_defaults_are_valid() {
            let config = PromptConfig::default();
            assert!(config.validate().is_ok());
            assert_eq!(config.top_k, 32);
            assert!(config.prompt.starts_with("You are an experienced workplace safety inspector"));
        }

        #[test]
        fn test_rejects_blank_and_non_finite() {
            let blank = PromptConfig {
                prompt: " \n".into(),
                ..PromptConfig::default()
            };
            assert_eq!(blank.validate(), Err(ConfigError::BlankPrompt));

            let nan = PromptConfig {
                temperature: f64::NAN,
                ..PromptConfig::default()
            };
            assert_eq!(nan.validate(), Err(ConfigError::NonFinite { field: "temperature" }));
        }
    }

    mod load_tests {
        use super::*;

        #[test]
        fn test_load_success_populates_trimmed_form() {
            let mut state = PromptConfigState::default();
            state.begin_load();
            let body = serde_json::to_vec(&custom()).unwrap();
            let outcome = state.apply_load(Ok(TransportResponse::new(200, body)));
            assert_eq!(outcome, LoadOutcome::Loaded);
            assert_eq!(state.form.prompt, "Find hazards.");
            assert_eq!(state.form.top_k, 16);
            assert!(!state.loading);
            assert!(state.status.is_none());
        }

        #[test]
        fn test_load_error_status_falls_back_to_defaults() {
            let mut state = PromptConfigState::default();
            state.form = custom();
            let outcome = state.apply_load(Ok(TransportResponse::new(500, b"{}".to_vec())));
            assert_eq!(outcome, LoadOutcome::Defaulted { status: 500 });
            assert_eq!(state.form, PromptConfig::default().for_form());
        }

        #[test]
        fn test_load_transport_failure_sets_error_status() {
            let mut state = PromptConfigState::default();
            let outcome = state.apply_load(Err(TransportError::Network {
                message: "offline".into(),
            }));
            assert!(matches!(outcome, LoadOutcome::Failed { .. }));
            let status = state.status.unwrap();
            assert_eq!(status.kind, StatusKind::Error);
            assert_eq!(status.message, LOAD_FAILED_MESSAGE);
        }
    }

    mod save_tests {
        use super::*;

        #[test]
        fn test_save_success_uses_server_message() {
            let mut state = PromptConfigState::default();
            state.begin_save(custom()).unwrap();
            assert!(state.saving);
            assert_eq!(state.status.as_ref().unwrap().message, SAVING_MESSAGE);

            let accepted = state.apply_save(Ok(TransportResponse::new(
                200,
                br#"{"message": "Configuration saved successfully!"}"#.to_vec(),
            )));
            assert!(accepted);
            assert!(!state.saving);
            assert_eq!(
                state.status,
                Some(ConfigStatus::new(StatusKind::Success, "Configuration saved successfully!"))
            );
        }

        #[test]
        fn test_save_failure_messages() {
            let mut state = PromptConfigState::default();
            assert!(!state.apply_save(Ok(TransportResponse::new(
                400,
                br#"{"error": "Invalid data"}"#.to_vec()
            ))));
            assert_eq!(state.status.as_ref().unwrap().message, "Error: Invalid data");

            state.apply_save(Ok(TransportResponse::new(502, b"Bad gateway".to_vec())));
            assert_eq!(state.status.as_ref().unwrap().message, "Error: Server Error 502");
        }

        #[test]
        fn test_invalid_config_not_saved() {
            let mut state = PromptConfigState::default();
            let bad = PromptConfig {
                prompt: String::new(),
                ..custom()
            };
            assert!(state.begin_save(bad).is_err());
            assert!(!state.saving);
            assert_eq!(state.status.as_ref().unwrap().kind, StatusKind::Error);
        }

        #[test]
        fn test_reset_to_defaults() {
            let mut state = PromptConfigState::default();
            state.form = custom();
            state.reset_to_defaults();
            assert_eq!(state.form, PromptConfig::default().for_form());
            assert_eq!(state.status.as_ref().unwrap().message, RESET_MESSAGE);
        }
    }
}
