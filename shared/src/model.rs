use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisRun;
use crate::capabilities::TimerId;
use crate::config::ClientConfig;
use crate::image_source::{format_bytes, ImageHandle};
use crate::progress::{ProgressIndicator, ProgressView};
use crate::prompt_config::{ConfigStatus, PromptConfig, PromptConfigState};
use crate::report::AnalysisOutcome;
use crate::AppError;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UiState {
    #[default]
    Initial,
    ImageLoaded,
    Analyzing,
    ResultsShown,
}

impl UiState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::ImageLoaded => "image-loaded",
            Self::Analyzing => "analyzing",
            Self::ResultsShown => "results-shown",
        }
    }

    /// States in which picking a new image is allowed.
    #[must_use]
    pub const fn accepts_image(self) -> bool {
        matches!(self, Self::Initial | Self::ImageLoaded)
    }
}

impl std::fmt::Display for UiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// Transient message for the user, e.g. a refused action.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub code: Option<String>,
}

impl Notice {
    #[must_use]
    pub fn from_error(error: &AppError) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: error.user_facing_message(),
            code: Some(error.code().to_string()),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Warning,
            message: message.into(),
            code: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: ClientConfig,
    pub ui_state: UiState,
    pub image: Option<ImageHandle>,
    pub run: Option<AnalysisRun>,
    pub progress: ProgressIndicator,
    /// Built when the run resolves; shown once the progress hold ends.
    pub outcome: Option<AnalysisOutcome>,
    pub notice: Option<Notice>,
    pub prompt: PromptConfigState,
    next_timer_id: u64,
}

impl Model {
    /// The only way `ui_state` changes. Re-entering the current state is
    /// allowed and just logged.
    pub fn set_state(&mut self, next: UiState) {
        let previous = self.ui_state;
        self.ui_state = next;
        tracing::debug!(from = %previous, to = %next, "ui state");
    }

    pub fn next_timer_id(&mut self) -> TimerId {
        self.next_timer_id += 1;
        TimerId(self.next_timer_id)
    }

    pub fn set_error(&mut self, error: &AppError) {
        self.notice = Some(Notice::from_error(error));
    }

    #[must_use]
    pub fn is_analyzing(&self) -> bool {
        self.ui_state == UiState::Analyzing
            || self.run.as_ref().is_some_and(AnalysisRun::is_in_flight)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ImagePreview {
    pub name: String,
    pub src: String,
    pub size_label: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AttemptView {
    pub attempt: u32,
    pub max_attempts: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PromptConfigView {
    pub form: PromptConfig,
    pub status: Option<ConfigStatus>,
    pub busy: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub state: UiState,
    pub image: Option<ImagePreview>,
    pub can_analyze: bool,
    pub can_reset: bool,
    pub progress: ProgressView,
    pub attempt: Option<AttemptView>,
    pub outcome: Option<AnalysisOutcome>,
    pub notice: Option<Notice>,
    pub prompt_config: PromptConfigView,
}

impl ViewModel {
    #[must_use]
    pub fn from_model(model: &Model) -> Self {
        let image = model.image.as_ref().map(|image| ImagePreview {
            name: image.name().to_string(),
            src: image.display_src().to_string(),
            size_label: format_bytes(image.size() as u64),
        });

        let attempt = model
            .run
            .as_ref()
            .filter(|run| run.is_in_flight())
            .map(|run| AttemptView {
                attempt: run.attempt(),
                max_attempts: run.retry.max_attempts,
            });

        let outcome = if model.ui_state == UiState::ResultsShown {
            model.outcome.clone()
        } else {
            None
        };

        Self {
            state: model.ui_state,
            image,
            can_analyze: model.image.is_some() && model.ui_state == UiState::ImageLoaded,
            can_reset: model.ui_state != UiState::Analyzing,
            progress: model.progress.view(),
            attempt,
            outcome,
            notice: model.notice.clone(),
            prompt_config: PromptConfigView {
                form: model.prompt.form.clone(),
                status: model.prompt.status.clone(),
                busy: model.prompt.loading || model.prompt.saving,
            },
        }
    }
}
