use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::evaluation::{
    read_aggregate_score, render_tracker_yaml, run_stage, CancelToken, Evaluation,
    EvaluationClient, ResolvedCommand,
};
use crate::models::Configuration;
use crate::settings::{expand_placeholders, PipelineSettings, StageCommand};

/// Scratch locations owned by a single trial.
#[derive(Debug, Clone)]
struct TrialPaths {
    trial_id: usize,
    trial_dir: PathBuf,
    tracker_config: PathBuf,
    results_dir: PathBuf,
}

/// Evaluates configurations by running the external tracking pipeline: an
/// inference stage that writes per-scene results, then a metrics stage that
/// writes the score summary.
pub struct PipelineClient {
    settings: PipelineSettings,
    cancel: CancelToken,
}

impl PipelineClient {
    pub fn new(settings: PipelineSettings, cancel: CancelToken) -> Self {
        Self { settings, cancel }
    }

    /// Create a clean scratch directory and write the tracker config into it.
    fn prepare(&self, trial_id: usize, config: &Configuration) -> crate::Result<TrialPaths> {
        let trial_dir = self.settings.scratch_dir.join(format!("trial_{:04}", trial_id));
        if trial_dir.exists() {
            fs::remove_dir_all(&trial_dir)?;
        }
        let results_dir = trial_dir.join("results");
        fs::create_dir_all(&results_dir)?;

        let tracker_config = trial_dir.join(&self.settings.tracker_config_name);
        fs::write(&tracker_config, render_tracker_yaml(config)?)?;

        Ok(TrialPaths {
            trial_id,
            trial_dir,
            tracker_config,
            results_dir,
        })
    }

    fn expand(&self, template: &str, paths: &TrialPaths) -> Result<String, String> {
        expand_placeholders(template, |name| {
            let value = match name {
                "trial_id" => paths.trial_id.to_string(),
                "trial_dir" => display(&paths.trial_dir),
                "tracker_config" => display(&paths.tracker_config),
                "results_dir" => display(&paths.results_dir),
                "ground_truth_dir" => display(&self.settings.ground_truth_dir),
                "dataset_dir" => display(&self.settings.dataset_dir),
                _ => return None,
            };
            Some(value)
        })
        .map_err(|unknown| format!("unknown placeholder {{{}}}", unknown))
    }

    fn resolve(&self, stage: &StageCommand, paths: &TrialPaths) -> Result<ResolvedCommand, String> {
        let program = self.expand(&stage.program, paths)?;
        let args = stage
            .args
            .iter()
            .map(|arg| self.expand(arg, paths))
            .collect::<Result<Vec<_>, _>>()?;
        let working_dir = match &stage.working_dir {
            Some(dir) => Some(PathBuf::from(self.expand(dir, paths)?)),
            None => None,
        };
        Ok(ResolvedCommand {
            program,
            args,
            working_dir,
        })
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl EvaluationClient for PipelineClient {
    fn evaluate(&mut self, trial_id: usize, config: &Configuration) -> Evaluation {
        let paths = match self.prepare(trial_id, config) {
            Ok(paths) => paths,
            Err(e) => return Evaluation::failed(format!("prepare: {}", e)),
        };

        let stages = [
            ("inference", &self.settings.stages.inference),
            ("metrics", &self.settings.stages.metrics),
        ];
        for (name, stage) in stages {
            let command = match self.resolve(stage, &paths) {
                Ok(command) => command,
                Err(reason) => return Evaluation::failed(format!("{}: {}", name, reason)),
            };

            info!(trial = trial_id, stage = name, "running stage");
            let log_path = paths.trial_dir.join(format!("{}.log", name));
            if let Err(failure) = run_stage(&command, &log_path, self.settings.timeout(), &self.cancel) {
                warn!(
                    trial = trial_id,
                    stage = name,
                    log = %log_path.display(),
                    "stage {}",
                    failure
                );
                return Evaluation::failed(format!("{}: {}", name, failure));
            }
        }

        let score_path = match self.expand(&self.settings.score.file, &paths) {
            Ok(path) => PathBuf::from(path),
            Err(reason) => return Evaluation::unavailable(reason),
        };
        match read_aggregate_score(&score_path, &self.settings.score) {
            Ok(score) => Evaluation::success(score),
            Err(reason) => Evaluation::unavailable(reason),
        }
    }
}
