use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TuneError};

/// Placeholders accepted in stage commands and the score file path.
pub const PLACEHOLDERS: &[&str] = &[
    "trial_id",
    "trial_dir",
    "tracker_config",
    "results_dir",
    "ground_truth_dir",
    "dataset_dir",
];

fn default_tracker_config_name() -> String {
    "test_tracker.yaml".to_string()
}

fn default_timeout_secs() -> u64 {
    4 * 60 * 60
}

/// Static description of the external tracking pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSettings {
    /// Root for per-trial scratch directories.
    pub scratch_dir: PathBuf,

    /// File name the tracker configuration is written under.
    #[serde(default = "default_tracker_config_name")]
    pub tracker_config_name: String,

    pub ground_truth_dir: PathBuf,

    pub dataset_dir: PathBuf,

    /// Per-stage wall-clock limit.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    pub stages: Stages,

    #[serde(default)]
    pub score: ScoreArtifact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stages {
    /// Runs detection and tracking, writing per-scene result files.
    pub inference: StageCommand,
    /// Matches results against ground truth and writes the score artifact.
    pub metrics: StageCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// Where the aggregate score is read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScoreArtifact {
    pub file: String,
    pub sequence_column: String,
    pub sequence_key: String,
    pub metric_column: String,
}

impl Default for ScoreArtifact {
    fn default() -> Self {
        Self {
            file: "{results_dir}/pedestrian_detailed.csv".to_string(),
            sequence_column: "seq".to_string(),
            sequence_key: "COMBINED".to_string(),
            metric_column: "MOTA".to_string(),
        }
    }
}

impl PipelineSettings {
    /// Load settings from JSON and validate them. Relative directories are
    /// resolved against the settings file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            return Err(TuneError::Config(format!(
                "settings file {} should have a .json extension",
                path.display()
            )));
        }
        let content = fs::read_to_string(path).map_err(|e| {
            TuneError::Config(format!("cannot read settings {}: {}", path.display(), e))
        })?;
        let mut settings: PipelineSettings = serde_json::from_str(&content).map_err(|e| {
            TuneError::Config(format!("malformed settings {}: {}", path.display(), e))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        settings.scratch_dir = resolve(base, &settings.scratch_dir);
        settings.ground_truth_dir = resolve(base, &settings.ground_truth_dir);
        settings.dataset_dir = resolve(base, &settings.dataset_dir);

        settings.validate()?;
        Ok(settings)
    }

    /// Check every path, extension and template once, up front.
    pub fn validate(&self) -> Result<()> {
        if !self.tracker_config_name.ends_with(".yaml")
            || self.tracker_config_name.contains(['/', '\\'])
        {
            return invalid(format!(
                "tracker_config_name '{}' should be a bare file name with a .yaml extension",
                self.tracker_config_name
            ));
        }
        if self.timeout_secs == 0 {
            return invalid("timeout_secs must be positive".to_string());
        }
        if self.scratch_dir.exists() && !self.scratch_dir.is_dir() {
            return invalid(format!(
                "scratch_dir {} is not a directory",
                self.scratch_dir.display()
            ));
        }
        for (field, dir) in [
            ("ground_truth_dir", &self.ground_truth_dir),
            ("dataset_dir", &self.dataset_dir),
        ] {
            if !dir.is_dir() {
                return invalid(format!("{} {} does not exist", field, dir.display()));
            }
        }

        for (name, stage) in [("inference", &self.stages.inference), ("metrics", &self.stages.metrics)] {
            stage.validate(name)?;
        }

        if !self.score.file.ends_with(".csv") {
            return invalid(format!(
                "score file '{}' should have a .csv extension",
                self.score.file
            ));
        }
        check_template("score.file", &self.score.file)?;
        for (field, value) in [
            ("score.sequence_column", &self.score.sequence_column),
            ("score.sequence_key", &self.score.sequence_key),
            ("score.metric_column", &self.score.metric_column),
        ] {
            if value.trim().is_empty() {
                return invalid(format!("{} is empty", field));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StageCommand {
    fn validate(&self, stage: &str) -> Result<()> {
        if self.program.trim().is_empty() {
            return invalid(format!("{} stage has no program", stage));
        }
        check_template(&format!("{}.program", stage), &self.program)?;
        // Bare names are looked up on PATH at spawn time
        if !self.program.contains('{') && self.program.contains('/') && !Path::new(&self.program).exists() {
            return invalid(format!("{} stage program {} does not exist", stage, self.program));
        }
        for arg in &self.args {
            check_template(&format!("{}.args", stage), arg)?;
        }
        if let Some(dir) = &self.working_dir {
            check_template(&format!("{}.working_dir", stage), dir)?;
        }
        Ok(())
    }
}

fn invalid(message: String) -> Result<()> {
    Err(TuneError::Config(message))
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn check_template(field: &str, template: &str) -> Result<()> {
    expand_placeholders(template, |name| {
        PLACEHOLDERS.contains(&name).then(String::new)
    })
    .map(|_| ())
    .map_err(|unknown| {
        TuneError::Config(format!(
            "{} uses unknown placeholder {{{}}} (known: {})",
            field,
            unknown,
            PLACEHOLDERS.join(", ")
        ))
    })
}

/// Replace `{name}` placeholders using `lookup`. Braces around anything that
/// is not a lowercase identifier are kept literally. Returns the name of the
/// first placeholder `lookup` does not know.
pub fn expand_placeholders<F>(template: &str, lookup: F) -> std::result::Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };

        let name = &after[..close];
        let is_ident = !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_');
        if is_ident {
            let value = lookup(name).ok_or_else(|| name.to_string())?;
            out.push_str(&value);
        } else {
            out.push('{');
            out.push_str(name);
            out.push('}');
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
