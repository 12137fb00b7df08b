mod cancel;
mod pipeline;
mod process;
mod score;
mod tracker_yaml;

pub use cancel::{install_interrupt_handler, CancelToken};
pub use pipeline::PipelineClient;
pub use process::{run_stage, ResolvedCommand, StageFailure};
pub use score::read_aggregate_score;
pub use tracker_yaml::render_tracker_yaml;

use crate::models::{Configuration, Outcome};

/// Result of one call to an [`EvaluationClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub outcome: Outcome,
    pub score: Option<f64>,
    pub detail: Option<String>,
}

impl Evaluation {
    pub fn success(score: f64) -> Self {
        Self {
            outcome: Outcome::Success,
            score: Some(score),
            detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::EvaluationFailed,
            score: None,
            detail: Some(detail.into()),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::ScoreUnavailable,
            score: None,
            detail: Some(detail.into()),
        }
    }
}

/// Turns a configuration into a scalar score. Implementations never retry.
///
/// `trial_id` is unique within a run and may be used to namespace scratch
/// output.
pub trait EvaluationClient {
    fn evaluate(&mut self, trial_id: usize, config: &Configuration) -> Evaluation;
}

/// In-process evaluation functions.
impl<F> EvaluationClient for F
where
    F: FnMut(&Configuration) -> Evaluation,
{
    fn evaluate(&mut self, _trial_id: usize, config: &Configuration) -> Evaluation {
        self(config)
    }
}
