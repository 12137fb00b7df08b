use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// tracker_tuner — coordinate-wise hyperparameter search for tracking pipelines.
#[derive(Parser, Debug)]
#[command(name = "tracker_tuner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Inputs shared by every command that touches the pipeline.
#[derive(Args, Debug)]
pub struct SpaceArgs {
    /// Path to the pipeline settings JSON file.
    #[arg(long)]
    pub settings: PathBuf,

    /// Path to a config space declaration (JSON). Defaults to the built-in tracker space.
    #[arg(long)]
    pub space: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the search and print the best configuration.
    Tune {
        #[command(flatten)]
        inputs: SpaceArgs,

        /// Trace file every trial is appended to (JSON Lines).
        #[arg(long, default_value = "tune_trace.jsonl")]
        trace: PathBuf,

        /// Replace the trace file even if it holds an earlier run.
        #[arg(long)]
        force: bool,

        /// Run log, appended to across runs. Defaults to the trace path with a .log extension.
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Replay trials from an earlier trace instead of re-running them.
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Re-evaluate trials that failed in the resumed trace.
        #[arg(long, requires = "resume")]
        retry_failed: bool,

        /// Extra attempts for a trial whose pipeline run fails.
        #[arg(long, default_value = "0")]
        retries: u32,

        /// Re-evaluate the value the current best already holds.
        #[arg(long)]
        no_skip: bool,

        /// Stop between trials once this file exists.
        #[arg(long)]
        stop_file: Option<PathBuf>,

        /// Output CSV file for all trials.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Output JSON file for the best configuration.
        #[arg(long)]
        best: Option<PathBuf>,
    },

    /// Validate the settings and config space without running anything.
    Validate {
        #[command(flatten)]
        inputs: SpaceArgs,
    },

    /// Convert a trace file to CSV.
    Export {
        /// Trace file to read (JSON Lines).
        #[arg(long)]
        trace: PathBuf,

        /// Output CSV file.
        #[arg(long)]
        csv: PathBuf,
    },
}
