use serde::{Deserialize, Serialize};

use crate::models::Configuration;

/// How a single evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// A pipeline stage exited non-zero, could not start, or timed out.
    EvaluationFailed,
    /// Both stages ran but no aggregate score could be read back.
    ScoreUnavailable,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::EvaluationFailed => "evaluation_failed",
            Outcome::ScoreUnavailable => "score_unavailable",
        }
    }
}

/// One evaluation of one configuration, as recorded in the trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    #[serde(rename = "trial_index")]
    pub sequence_index: usize,

    pub configuration: Configuration,

    pub outcome: Outcome,

    /// Only present for `Success`.
    pub score: Option<f64>,

    /// Failure reason or stage name, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Copied from an earlier trace instead of re-running the pipeline.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub replayed: bool,
}

impl Trial {
    /// Score used for comparisons. Anything but a success ranks below every
    /// real score.
    pub fn comparable_score(&self) -> f64 {
        match (self.outcome, self.score) {
            (Outcome::Success, Some(score)) => score,
            _ => f64::NEG_INFINITY,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success && self.score.is_some()
    }
}
