use std::collections::{HashMap, VecDeque};

use crate::error::{Result, TuneError};
use crate::models::{Configuration, Outcome, Trial};
use crate::tuner::ConfigSpace;

/// Recorded trials from an earlier run, queued per configuration so a resumed
/// search sees the same results in the same order.
#[derive(Debug, Default)]
pub struct ReplayCache {
    queues: HashMap<String, VecDeque<Trial>>,
}

impl ReplayCache {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check every recorded trial against `space` and index it.
    ///
    /// With `retry_failed`, only successful trials are kept so failures get
    /// re-evaluated.
    pub fn from_trials(space: &ConfigSpace, trials: Vec<Trial>, retry_failed: bool) -> Result<Self> {
        let mut queues: HashMap<String, VecDeque<Trial>> = HashMap::new();

        for trial in trials {
            let configuration = space.conform(&trial.configuration).map_err(|reason| {
                TuneError::ResumeMismatch {
                    trial_index: trial.sequence_index,
                    reason,
                }
            })?;
            if trial.outcome == Outcome::Success && trial.score.is_none() {
                return Err(TuneError::ResumeMismatch {
                    trial_index: trial.sequence_index,
                    reason: "successful trial has no score".to_string(),
                });
            }
            if retry_failed && trial.outcome != Outcome::Success {
                continue;
            }

            queues
                .entry(configuration.fingerprint())
                .or_default()
                .push_back(Trial {
                    configuration,
                    ..trial
                });
        }

        Ok(Self { queues })
    }

    /// Take the next recorded trial for `config`, if any remain.
    pub fn take(&mut self, config: &Configuration) -> Option<Trial> {
        self.queues.get_mut(&config.fingerprint())?.pop_front()
    }

    /// Recorded trials not yet consumed.
    pub fn remaining(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}
