use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuneError {
    #[error("Invalid config space: {0}")]
    InvalidSpace(String),

    #[error("No baseline score: default configuration could not be evaluated ({0})")]
    NoBaselineScore(String),

    #[error("Resume mismatch at trial {trial_index}: {reason}")]
    ResumeMismatch { trial_index: usize, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Trace {0:?} already holds trials from an earlier run; resume from it, move it, or overwrite it with --force")]
    TraceExists(std::path::PathBuf),

    #[error("Search cancelled after {0} trials")]
    Cancelled(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, TuneError>;
