//! One analysis invocation: wire types, per-attempt classification and the
//! bounded retry bookkeeping.
//!
//! The Crux handlers in [`crate::app`] own the effects; this module only
//! decides what each response means and what should happen next.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::capabilities::TransportResult;
use crate::validation::{validate, ValidatedAnalysis, ValidationError};
use crate::{AppError, ErrorKind, EXHAUSTED_RETRIES_MESSAGE};

/// Body returned by the analysis endpoint. Every field is optional; the
/// service is a language model behind a thin proxy, so text fields are read
/// leniently with [`lenient_text`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(default, rename = "PPE", deserialize_with = "lenient_text")]
    pub ppe: Option<String>,
    #[serde(default)]
    pub hazards: Option<Vec<RawHazard>>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHazard {
    #[serde(default, alias = "name", deserialize_with = "lenient_text")]
    pub category: Option<String>,
    #[serde(default, alias = "description", deserialize_with = "lenient_text")]
    pub observation: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub risk: Option<String>,
    /// Kept as raw JSON so a malformed box is a validation failure rather
    /// than a decode failure.
    #[serde(default)]
    pub markup: Option<Value>,
}

/// Reads any JSON value as display text. Scalars are stringified, arrays are
/// joined with `", "` and objects fall back to compact JSON.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(value_text))
}

fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.into_iter().filter_map(value_text).collect();
            Some(parts.join(", "))
        }
        object @ Value::Object(_) => Some(object.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(ValidatedAnalysis),
    /// Delivered, decodable, but failed box validation. Worth another try.
    Invalid(ValidationError),
    /// Transport or server failure. Ends the run.
    Fatal(AppError),
}

impl AttemptOutcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Invalid(_) => "invalid",
            Self::Fatal(_) => "fatal",
        }
    }
}

/// Classifies what the shell handed back for one attempt.
#[must_use]
pub fn classify_attempt(result: TransportResult) -> AttemptOutcome {
    let response = match result {
        Ok(response) => response,
        Err(e) => return AttemptOutcome::Fatal(e.into()),
    };

    if !response.is_success() {
        return AttemptOutcome::Fatal(AppError::from_http_status(
            response.status(),
            Some(response.body()),
        ));
    }

    let decoded: AnalysisResponse = match response.json() {
        Ok(decoded) => decoded,
        Err(e) => {
            return AttemptOutcome::Fatal(
                AppError::new(
                    ErrorKind::Deserialization,
                    "Analysis response could not be decoded",
                )
                .with_internal(e.to_string())
                .with_context("http_status", response.status().to_string()),
            );
        }
    };

    if let Some(message) = decoded.error.as_deref().filter(|m| !m.trim().is_empty()) {
        return AttemptOutcome::Fatal(
            AppError::new(ErrorKind::Server, message)
                .with_context("http_status", response.status().to_string()),
        );
    }

    match validate(decoded) {
        Ok(validated) => AttemptOutcome::Success(validated),
        Err(e) => AttemptOutcome::Invalid(e),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<AppError>,
    pub succeeded: bool,
}

impl RetryState {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts: max_attempts.max(1),
            last_error: None,
            succeeded: false,
        }
    }

    #[must_use]
    pub const fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    InFlight,
    Succeeded,
    Exhausted,
    Aborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    Retry { attempt: u32 },
    Succeeded(ValidatedAnalysis),
    Exhausted(AppError),
    Aborted(AppError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub id: RunId,
    pub retry: RetryState,
    pub status: RunStatus,
}

impl AnalysisRun {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            id: RunId::new(),
            retry: RetryState::new(max_attempts),
            status: RunStatus::InFlight,
        }
    }

    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.retry.attempt
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.status == RunStatus::InFlight
    }

    /// True when a response tagged `(run_id, attempt)` is the one this run
    /// is waiting for.
    #[must_use]
    pub fn awaits(&self, run_id: RunId, attempt: u32) -> bool {
        self.is_in_flight() && self.id == run_id && self.retry.attempt == attempt
    }

    /// Folds one attempt's outcome into the run.
    pub fn record(&mut self, outcome: AttemptOutcome) -> NextStep {
        match outcome {
            AttemptOutcome::Success(validated) => {
                self.retry.succeeded = true;
                self.status = RunStatus::Succeeded;
                NextStep::Succeeded(validated)
            }
            AttemptOutcome::Invalid(e) => {
                let error =
                    AppError::from(e).with_context("attempt", self.retry.attempt.to_string());
                self.retry.last_error = Some(error);
                if self.retry.has_attempts_left() {
                    self.retry.attempt += 1;
                    NextStep::Retry {
                        attempt: self.retry.attempt,
                    }
                } else {
                    self.status = RunStatus::Exhausted;
                    let mut exhausted =
                        AppError::new(ErrorKind::RetriesExhausted, EXHAUSTED_RETRIES_MESSAGE)
                            .with_context("attempts", self.retry.max_attempts.to_string());
                    if let Some(last) = &self.retry.last_error {
                        exhausted = exhausted.with_internal(last.message.clone());
                    }
                    NextStep::Exhausted(exhausted)
                }
            }
            AttemptOutcome::Fatal(e) => {
                let error = e.with_context("attempt", self.retry.attempt.to_string());
                self.retry.last_error = Some(error.clone());
                self.status = RunStatus::Aborted;
                NextStep::Aborted(error)
            }
        }
    }
}
