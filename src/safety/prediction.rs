//! Gate for AI-generated measurement predictions.

use serde::{Deserialize, Serialize};

use super::limits::MIN_PREDICTION_CONFIDENCE;
use super::verdict::{CheckKind, SafetyCheckResult, SafetyLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiPrediction {
    pub value: f64,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    /// The model flagged the value as outside physiological range.
    #[serde(default)]
    pub is_extreme: bool,
}

/// Pure decision; never touches device state.
pub fn validate_ai_prediction(prediction: &AiPrediction) -> SafetyCheckResult {
    const CHECK: CheckKind = CheckKind::AiPrediction;

    if prediction.confidence.is_nan() || prediction.confidence < MIN_PREDICTION_CONFIDENCE {
        return SafetyCheckResult::deny(
            CHECK,
            SafetyLevel::Caution,
            format!(
                "Prediction confidence {:.2} below {MIN_PREDICTION_CONFIDENCE:.2}",
                prediction.confidence
            ),
        )
        .with_action("Repeat the measurement");
    }

    if prediction.is_extreme {
        return SafetyCheckResult::deny(
            CHECK,
            SafetyLevel::Warning,
            format!("Extreme predicted value {}", prediction.value),
        )
        .with_action("Confirm with a reference instrument")
        .with_human_verification();
    }

    SafetyCheckResult {
        check: Some(CHECK),
        ..SafetyCheckResult::safe("Prediction accepted")
    }
}
