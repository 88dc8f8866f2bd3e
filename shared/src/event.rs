use crate::analysis::RunId;
use crate::capabilities::{TimerOutput, TransportResult};
use crate::config::ClientConfig;
use crate::prompt_config::PromptConfig;

#[derive(Debug, Clone)]
pub enum Event {
    Noop,

    // Setup
    ClientConfigured(Box<ClientConfig>),

    // Image selection
    ImageSelected {
        name: String,
        media_type: Option<String>,
        bytes: Vec<u8>,
        display_src: String,
    },
    ResetRequested,

    // Analysis
    AnalyzeRequested,
    AnalysisReceived {
        run_id: RunId,
        attempt: u32,
        result: Box<TransportResult>,
    },
    ProgressTick(TimerOutput),
    ProgressHoldElapsed(TimerOutput),

    // Prompt configuration
    ConfigLoadRequested,
    ConfigLoaded(Box<TransportResult>),
    ConfigSaveRequested(Box<PromptConfig>),
    ConfigSaved(Box<TransportResult>),
    ConfigResetToDefaults,

    DismissNotice,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::ClientConfigured(_) => "client_configured",
            Self::ImageSelected { .. } => "image_selected",
            Self::ResetRequested => "reset_requested",
            Self::AnalyzeRequested => "analyze_requested",
            Self::AnalysisReceived { .. } => "analysis_received",
            Self::ProgressTick(_) => "progress_tick",
            Self::ProgressHoldElapsed(_) => "progress_hold_elapsed",
            Self::ConfigLoadRequested => "config_load_requested",
            Self::ConfigLoaded(_) => "config_loaded",
            Self::ConfigSaveRequested(_) => "config_save_requested",
            Self::ConfigSaved(_) => "config_saved",
            Self::ConfigResetToDefaults => "config_reset_to_defaults",
            Self::DismissNotice => "dismiss_notice",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::ImageSelected { .. }
                | Self::ResetRequested
                | Self::AnalyzeRequested
                | Self::ConfigSaveRequested(_)
                | Self::ConfigResetToDefaults
                | Self::DismissNotice
        )
    }
}
