//! Structural checks on analysis output before it is accepted.
//!
//! The analysis service is driven by a language model, so its bounding boxes
//! are untrusted. A response is accepted only when every present `markup` is a
//! sane percentage box; a single bad box rejects the whole response.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::analysis::{AnalysisResponse, RawHazard};

/// Upper bound for `top + height` and `left + width`, allowing for rounding.
pub const MAX_EXTENT_PERCENT: f64 = 100.1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoxError {
    #[error("markup is not an object")]
    NotAnObject,
    #[error("field '{field}' is missing or not a number")]
    NotANumber { field: &'static str },
    #[error("field '{field}' is not finite")]
    NonFinite { field: &'static str },
    #[error("field '{field}' is negative ({value})")]
    Negative { field: &'static str, value: f64 },
    #[error("field '{field}' must be greater than zero ({value})")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{axis} extent {extent} exceeds 100.1")]
    Overflow { axis: &'static str, extent: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid markup on hazard {index}: {source}")]
    InvalidMarkup {
        index: usize,
        #[source]
        source: BoxError,
    },
}

impl ValidationError {
    #[must_use]
    pub const fn hazard_index(&self) -> usize {
        match self {
            Self::InvalidMarkup { index, .. } => *index,
        }
    }
}

/// A percentage-based box that satisfies the overlay invariant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    top: f64,
    left: f64,
    width: f64,
    height: f64,
}

impl BoundingBox {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Result<Self, BoxError> {
        for (field, value) in [("top", top), ("left", left), ("width", width), ("height", height)] {
            if !value.is_finite() {
                return Err(BoxError::NonFinite { field });
            }
        }
        if top < 0.0 {
            return Err(BoxError::Negative { field: "top", value: top });
        }
        if left < 0.0 {
            return Err(BoxError::Negative { field: "left", value: left });
        }
        if width <= 0.0 {
            return Err(BoxError::NonPositive { field: "width", value: width });
        }
        if height <= 0.0 {
            return Err(BoxError::NonPositive { field: "height", value: height });
        }
        if top + height > MAX_EXTENT_PERCENT {
            return Err(BoxError::Overflow {
                axis: "vertical",
                extent: top + height,
            });
        }
        if left + width > MAX_EXTENT_PERCENT {
            return Err(BoxError::Overflow {
                axis: "horizontal",
                extent: left + width,
            });
        }
        Ok(Self {
            top,
            left,
            width,
            height,
        })
    }

    /// Reads a box out of an arbitrary JSON value. Strings that look like
    /// numbers are rejected; the service must send numbers. Numbers beyond
    /// the `f64` range read as infinite and fail the finiteness check.
    pub fn from_json(value: &Value) -> Result<Self, BoxError> {
        let Value::Object(fields) = value else {
            return Err(BoxError::NotAnObject);
        };

        let number = |field: &'static str| -> Result<f64, BoxError> {
            match fields.get(field) {
                Some(Value::Number(n)) => n
                    .as_f64()
                    .or_else(|| n.to_string().parse::<f64>().ok())
                    .ok_or(BoxError::NotANumber { field }),
                _ => Err(BoxError::NotANumber { field }),
            }
        };

        Self::new(number("top")?, number("left")?, number("width")?, number("height")?)
    }

    #[must_use]
    pub const fn top(&self) -> f64 {
        self.top
    }

    #[must_use]
    pub const fn left(&self) -> f64 {
        self.left
    }

    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }
}

impl TryFrom<&Value> for BoundingBox {
    type Error = BoxError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Risk {
    High,
    Medium,
    Low,
    /// A label the service sent that is not one of the three levels.
    Other(String),
    Unspecified,
}

impl Risk {
    /// Exact, case-sensitive match on the three known levels.
    #[must_use]
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("High") => Self::High,
            Some("Medium") => Self::Medium,
            Some("Low") => Self::Low,
            Some(other) if !other.is_empty() => Self::Other(other.to_string()),
            _ => Self::Unspecified,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Other(label) => label,
            Self::Unspecified => "N/A",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub category: Option<String>,
    pub observation: Option<String>,
    pub risk: Risk,
    pub markup: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedAnalysis {
    pub description: Option<String>,
    pub ppe: Option<String>,
    pub hazards: Vec<Hazard>,
}

impl ValidatedAnalysis {
    #[must_use]
    pub fn markup_count(&self) -> usize {
        self.hazards.iter().filter(|h| h.markup.is_some()).count()
    }
}

/// `null`, `false`, `0` and `""` mean "no markup", as they do for the web
/// client that draws the overlays.
fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn validate_hazard(index: usize, raw: RawHazard) -> Result<Hazard, ValidationError> {
    let markup = match raw.markup.as_ref() {
        None => None,
        Some(value) if is_absent(value) => None,
        Some(value) => Some(
            BoundingBox::from_json(value)
                .map_err(|source| ValidationError::InvalidMarkup { index, source })?,
        ),
    };

    Ok(Hazard {
        category: raw.category,
        observation: raw.observation,
        risk: Risk::from_wire(raw.risk.as_deref()),
        markup,
    })
}

/// Accepts or rejects a decoded response as a whole. The first bad box wins.
pub fn validate(response: AnalysisResponse) -> Result<ValidatedAnalysis, ValidationError> {
    let hazards = response
        .hazards
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, raw)| validate_hazard(index, raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ValidatedAnalysis {
        description: response.description,
        ppe: response.ppe,
        hazards,
    })
}
