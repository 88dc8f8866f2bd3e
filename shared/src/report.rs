//! Turns a validated analysis into the data the shell draws.

use serde::{Deserialize, Serialize};

use crate::image_source::ImageHandle;
use crate::validation::{Risk, ValidatedAnalysis};
use crate::AppError;

pub const RESULTS_TITLE: &str = "Analysis Results";
pub const DESCRIPTION_TITLE: &str = "Workplace description and Identified activities";
pub const PPE_TITLE: &str = "PPE Assessment";
pub const HAZARDS_TITLE: &str = "Identified Hazards";
pub const NO_HAZARDS_MESSAGE: &str = "No specific hazards were identified in this image.";
pub const ANALYZE_ANOTHER_LABEL: &str = "Analyze Another Image";
pub const TRY_AGAIN_LABEL: &str = "Try Again";
pub const ERROR_TITLE: &str = "Error";

#[must_use]
pub fn risk_color(risk: &Risk) -> &'static str {
    match risk {
        Risk::High => "#dc3545",
        Risk::Medium => "#ffc107",
        Risk::Low => "#17b833",
        Risk::Other(_) | Risk::Unspecified => "#000000",
    }
}

/// Lower-cased risk label, or `info` when the service sent none.
#[must_use]
pub fn risk_class(risk: &Risk) -> String {
    match risk {
        Risk::Unspecified => "info".to_string(),
        other => other.label().to_lowercase(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    /// 1-based, matches the hazard card.
    pub label: usize,
    pub risk_class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub title: String,
    pub src: String,
    pub overlays: Vec<Overlay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardCard {
    pub index: usize,
    pub category: String,
    pub observation: String,
    pub risk_label: String,
    pub risk_class: String,
    pub risk_color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HazardList {
    Cards(Vec<HazardCard>),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportView {
    pub image: ImageBlock,
    pub sections: Vec<Section>,
    pub hazards_title: String,
    pub hazards: HazardList,
    pub reset_label: String,
}

impl ReportView {
    #[must_use]
    pub fn overlay_count(&self) -> usize {
        self.image.overlays.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureView {
    pub title: String,
    pub message: String,
    pub retry_label: String,
}

impl FailureView {
    #[must_use]
    pub fn from_error(error: &AppError) -> Self {
        Self {
            title: ERROR_TITLE.to_string(),
            message: error.user_facing_message(),
            retry_label: TRY_AGAIN_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnalysisOutcome {
    Success(ReportView),
    Failure(FailureView),
}

fn non_blank(text: Option<&String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty()).cloned()
}

/// Builds the report. Hazards keep the service's order; a missing category
/// or observation renders as an empty string rather than failing.
#[must_use]
pub fn render(analysis: &ValidatedAnalysis, image: &ImageHandle) -> ReportView {
    let mut overlays = Vec::new();
    let mut cards = Vec::with_capacity(analysis.hazards.len());

    for (i, hazard) in analysis.hazards.iter().enumerate() {
        let index = i + 1;
        let class = risk_class(&hazard.risk);

        if let Some(markup) = &hazard.markup {
            overlays.push(Overlay {
                top: markup.top(),
                left: markup.left(),
                width: markup.width(),
                height: markup.height(),
                label: index,
                risk_class: class.clone(),
            });
        }

        cards.push(HazardCard {
            index,
            category: hazard.category.clone().unwrap_or_default(),
            observation: hazard.observation.clone().unwrap_or_default(),
            risk_label: hazard.risk.label().to_string(),
            risk_class: class,
            risk_color: risk_color(&hazard.risk).to_string(),
        });
    }

    let sections = [
        (DESCRIPTION_TITLE, non_blank(analysis.description.as_ref())),
        (PPE_TITLE, non_blank(analysis.ppe.as_ref())),
    ]
    .into_iter()
    .filter_map(|(title, body)| {
        body.map(|body| Section {
            title: title.to_string(),
            body,
        })
    })
    .collect();

    let hazards = if cards.is_empty() {
        HazardList::Placeholder(NO_HAZARDS_MESSAGE.to_string())
    } else {
        HazardList::Cards(cards)
    };

    ReportView {
        image: ImageBlock {
            title: RESULTS_TITLE.to_string(),
            src: image.display_src().to_string(),
            overlays,
        },
        sections,
        hazards_title: HAZARDS_TITLE.to_string(),
        hazards,
        reset_label: ANALYZE_ANOTHER_LABEL.to_string(),
    }
}
