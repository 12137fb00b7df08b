use std::path::Path;

use clap::Parser;
use tracing::{info, warn};

use tracker_tuner::cli::{Cli, Command, SpaceArgs};
use tracker_tuner::error::{Result, TuneError};
use tracker_tuner::evaluation::{install_interrupt_handler, CancelToken, PipelineClient};
use tracker_tuner::interface::{display_report, display_space};
use tracker_tuner::logging;
use tracker_tuner::settings::PipelineSettings;
use tracker_tuner::state::{load_trace, ReplayCache, ResultTrace};
use tracker_tuner::tuner::{write_best_json, write_csv, ConfigSpace, SearchEngine, SearchOptions};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Command::Tune { trace, log_file, .. } => {
            Some(log_file.clone().unwrap_or_else(|| trace.with_extension("log")))
        }
        _ => None,
    };
    logging::init(log_file.as_deref())?;

    match cli.command {
        Command::Tune {
            inputs,
            trace,
            force,
            log_file: _,
            resume,
            retry_failed,
            retries,
            no_skip,
            stop_file,
            csv,
            best,
        } => {
            let options = SearchOptions {
                skip_current_value: !no_skip,
                retries,
            };
            cmd_tune(
                &inputs,
                &trace,
                force,
                resume.as_deref(),
                retry_failed,
                options,
                stop_file.as_deref(),
                csv.as_deref(),
                best.as_deref(),
            )
        }
        Command::Validate { inputs } => cmd_validate(&inputs),
        Command::Export { trace, csv } => cmd_export(&trace, &csv),
    }
}

/// Load and validate settings and space once, up front.
fn load_inputs(inputs: &SpaceArgs) -> Result<(PipelineSettings, ConfigSpace)> {
    let settings = PipelineSettings::load(&inputs.settings)?;
    let space = match &inputs.space {
        Some(path) => ConfigSpace::load(path)?,
        None => ConfigSpace::tracker_default(),
    };
    Ok((settings, space))
}

/// Run the coordinate search against the external pipeline.
#[allow(clippy::too_many_arguments)]
fn cmd_tune(
    inputs: &SpaceArgs,
    trace_path: &Path,
    force: bool,
    resume: Option<&Path>,
    retry_failed: bool,
    options: SearchOptions,
    stop_file: Option<&Path>,
    csv_path: Option<&Path>,
    best_path: Option<&Path>,
) -> Result<()> {
    let (settings, space) = load_inputs(inputs)?;
    info!(
        "Loaded {} parameters, at most {} evaluations",
        space.parameters().len(),
        space.max_evaluations()
    );

    let replay = match resume {
        Some(path) if path == trace_path => {
            return Err(TuneError::Config(format!(
                "cannot resume from {} while writing the new trace to it; pick another --trace",
                path.display()
            )));
        }
        Some(path) => {
            let trials = load_trace(path)?;
            info!("Resuming from {} ({} recorded trials)", path.display(), trials.len());
            ReplayCache::from_trials(&space, trials, retry_failed)?
        }
        None => ReplayCache::empty(),
    };

    let mut cancel = CancelToken::new();
    if let Some(path) = stop_file {
        cancel = cancel.with_stop_file(path);
    }
    match install_interrupt_handler() {
        Ok(()) => cancel = cancel.with_interrupts(),
        Err(e) => warn!("Ctrl-C will not stop running stages: {}", e),
    }

    let trace = if force {
        ResultTrace::with_sink_overwriting(trace_path)?
    } else {
        ResultTrace::with_sink(trace_path)?
    };
    let client = PipelineClient::new(settings, cancel.clone());
    let report = SearchEngine::new(&space, client, trace)
        .with_options(options)
        .with_cancel_token(cancel)
        .with_replay(replay)
        .run()?;

    display_report(&report);
    println!("Trace written to {:?}", trace_path);

    if let Some(path) = csv_path {
        write_csv(&report.trials, path)?;
        println!("Wrote all trials to {:?}", path);
    }
    if let Some(path) = best_path {
        write_best_json(&report, path)?;
        println!("Wrote best configuration to {:?}", path);
    }

    Ok(())
}

/// Check settings and space, then show what a run would sweep.
fn cmd_validate(inputs: &SpaceArgs) -> Result<()> {
    let (settings, space) = load_inputs(inputs)?;
    display_space(&space);
    println!("Settings OK: scratch in {:?}, stage timeout {}s", settings.scratch_dir, settings.timeout_secs);
    Ok(())
}

/// Convert a JSON Lines trace to CSV.
fn cmd_export(trace_path: &Path, csv_path: &Path) -> Result<()> {
    let trials = load_trace(trace_path)?;
    write_csv(&trials, csv_path)?;
    println!("Wrote {} trials to {:?}", trials.len(), csv_path);
    Ok(())
}
