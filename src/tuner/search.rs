use tracing::{debug, info, warn};

use crate::error::{Result, TuneError};
use crate::evaluation::{CancelToken, EvaluationClient};
use crate::models::{Configuration, Outcome, Trial};
use crate::state::{ReplayCache, ResultTrace};
use crate::tuner::space::ConfigSpace;

/// Knobs for the search policy itself.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Don't re-evaluate the value the best configuration already holds.
    pub skip_current_value: bool,
    /// Extra attempts for a candidate whose evaluation failed outright.
    pub retries: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            skip_current_value: true,
            retries: 0,
        }
    }
}

/// Where the engine is in its sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Initializing,
    Scanning(String),
    Committed(String),
    Finished,
}

/// Best configuration found so far. `best_score` never decreases.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub best_configuration: Configuration,
    pub best_score: f64,
}

impl SearchState {
    fn new(baseline: Configuration, score: f64) -> Self {
        Self {
            best_configuration: baseline,
            best_score: score,
        }
    }

    /// Adopt the trial's configuration on strict improvement. Ties keep the
    /// earlier optimum.
    fn observe(&mut self, trial: &Trial) -> bool {
        if trial.comparable_score() > self.best_score {
            self.best_configuration = trial.configuration.clone();
            self.best_score = trial.comparable_score();
            true
        } else {
            false
        }
    }
}

/// Outcome of a completed sweep.
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub best_configuration: Configuration,
    pub best_score: f64,
    pub baseline_score: f64,
    /// Every trial in call order, replayed ones included.
    pub trials: Vec<Trial>,
    /// Calls made to the evaluation client.
    pub evaluations: usize,
    /// Trials taken from a resumed trace.
    pub replayed: usize,
}

impl SearchReport {
    pub fn improvement(&self) -> f64 {
        self.best_score - self.baseline_score
    }
}

/// Single-pass coordinate ascent over a [`ConfigSpace`].
///
/// Starting from the defaults, each parameter in declaration order is swept
/// across its whole domain with every other parameter held at the current
/// best. The best value found is committed before moving on, so the number of
/// evaluations is bounded by the sum of the domain sizes.
pub struct SearchEngine<'a, C: EvaluationClient> {
    space: &'a ConfigSpace,
    client: C,
    trace: ResultTrace,
    options: SearchOptions,
    cancel: CancelToken,
    replay: ReplayCache,
    phase: Phase,
    evaluations: usize,
    replayed: usize,
}

impl<'a, C: EvaluationClient> SearchEngine<'a, C> {
    pub fn new(space: &'a ConfigSpace, client: C, trace: ResultTrace) -> Self {
        Self {
            space,
            client,
            trace,
            options: SearchOptions::default(),
            cancel: CancelToken::new(),
            replay: ReplayCache::empty(),
            phase: Phase::Initializing,
            evaluations: 0,
            replayed: 0,
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Serve matching configurations from an earlier trace.
    pub fn with_replay(mut self, replay: ReplayCache) -> Self {
        self.replay = replay;
        self
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn trace(&self) -> &ResultTrace {
        &self.trace
    }

    /// Run the full sweep.
    ///
    /// Fails with `NoBaselineScore` if the defaults cannot be scored and with
    /// `Cancelled` if the cancel token trips. Individual trial failures are
    /// recorded and otherwise ignored.
    pub fn run(mut self) -> Result<SearchReport> {
        self.enter(Phase::Initializing);
        let baseline = self.space.default_configuration();
        info!("Evaluating baseline: {}", baseline);

        let trial = self.trial(&baseline)?;
        let baseline_score = match trial.score {
            Some(score) if trial.outcome == Outcome::Success => score,
            _ => {
                return Err(TuneError::NoBaselineScore(format!(
                    "{}: {}",
                    trial.outcome.as_str(),
                    trial.detail.unwrap_or_default()
                )));
            }
        };
        info!("Baseline score {:.3}", baseline_score);
        let mut state = SearchState::new(baseline, baseline_score);

        let space = self.space;
        for parameter in space.iteration_order() {
            self.enter(Phase::Scanning(parameter.name.clone()));
            info!(
                parameter = %parameter.name,
                candidates = parameter.domain.len(),
                "Scanning"
            );

            for value in &parameter.domain {
                if self.options.skip_current_value
                    && state.best_configuration.get(&parameter.name) == Some(value)
                {
                    debug!(parameter = %parameter.name, %value, "reusing score of current best");
                    continue;
                }

                let candidate = state.best_configuration.with_value(&parameter.name, value.clone());
                let trial = self.trial(&candidate)?;
                if state.observe(&trial) {
                    info!(
                        trial = trial.sequence_index,
                        "New best {:.3}: {}",
                        state.best_score,
                        state.best_configuration
                    );
                }
            }

            self.enter(Phase::Committed(parameter.name.clone()));
            if let Some(value) = state.best_configuration.get(&parameter.name) {
                info!(
                    parameter = %parameter.name,
                    %value,
                    best = state.best_score,
                    "Committed"
                );
            }
        }

        self.enter(Phase::Finished);
        info!(
            "Finished after {} trials: best {:.3} (baseline {:.3})",
            self.trace.len(),
            state.best_score,
            baseline_score
        );

        Ok(SearchReport {
            best_configuration: state.best_configuration,
            best_score: state.best_score,
            baseline_score,
            trials: self.trace.into_trials(),
            evaluations: self.evaluations,
            replayed: self.replayed,
        })
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    /// Produce one recorded trial for `config`, from the replay cache if it
    /// has one, otherwise by calling the client (retrying outright failures
    /// as configured). Every attempt is appended to the trace.
    fn trial(&mut self, config: &Configuration) -> Result<Trial> {
        let mut attempt = 0;
        loop {
            let index = self.trace.next_index();

            let trial = if let Some(recorded) = self.replay.take(config) {
                self.replayed += 1;
                Trial {
                    sequence_index: index,
                    configuration: config.clone(),
                    replayed: true,
                    ..recorded
                }
            } else {
                if self.cancel.is_cancelled() {
                    return Err(TuneError::Cancelled(self.trace.len()));
                }
                let evaluation = self.client.evaluate(index, config);
                self.evaluations += 1;
                // An interrupted evaluation says nothing about the config
                if self.cancel.is_cancelled() {
                    warn!(trial = index, "discarding trial interrupted by cancellation");
                    return Err(TuneError::Cancelled(self.trace.len()));
                }
                Trial {
                    sequence_index: index,
                    configuration: config.clone(),
                    outcome: evaluation.outcome,
                    score: evaluation.score,
                    detail: evaluation.detail,
                    replayed: false,
                }
            };

            log_trial(&trial);
            self.trace.append(trial.clone());

            if trial.outcome == Outcome::EvaluationFailed && attempt < self.options.retries {
                attempt += 1;
                info!(trial = index, attempt, "retrying failed evaluation");
                continue;
            }
            return Ok(trial);
        }
    }
}

fn log_trial(trial: &Trial) {
    let source = if trial.replayed { "replayed" } else { "evaluated" };
    match (trial.outcome, trial.score) {
        (Outcome::Success, Some(score)) => {
            info!(trial = trial.sequence_index, source, "score {:.3}: {}", score, trial.configuration)
        }
        (outcome, _) => warn!(
            trial = trial.sequence_index,
            source,
            outcome = outcome.as_str(),
            detail = trial.detail.as_deref().unwrap_or(""),
            "trial failed: {}",
            trial.configuration
        ),
    }
}
