use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::models::Trial;
use crate::tuner::search::SearchReport;

/// Round a float to n decimal places.
fn truncate(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Write every trial to a CSV file, one column per parameter.
///
/// Parameter columns follow the first trial's configuration order.
pub fn write_csv(trials: &[Trial], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let columns: Vec<String> = trials
        .first()
        .map(|t| t.configuration.names().map(str::to_string).collect())
        .unwrap_or_default();

    let mut header = vec!["trial_index".to_string()];
    header.extend(columns.iter().cloned());
    header.extend(["outcome", "score", "replayed"].map(String::from));
    wtr.write_record(&header)?;

    for trial in trials {
        let mut row = vec![trial.sequence_index.to_string()];
        for name in &columns {
            row.push(
                trial
                    .configuration
                    .get(name)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        row.push(trial.outcome.as_str().to_string());
        row.push(trial.score.map(|s| format!("{:.3}", s)).unwrap_or_default());
        row.push(trial.replayed.to_string());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write the best configuration and summary figures to a JSON file.
pub fn write_best_json(report: &SearchReport, path: &Path) -> Result<()> {
    let failed = report.trials.iter().filter(|t| !t.is_success()).count();
    let json = serde_json::json!({
        "configuration": report.best_configuration,
        "best_score": truncate(report.best_score, 3),
        "baseline_score": truncate(report.baseline_score, 3),
        "improvement": truncate(report.improvement(), 3),
        "trials": {
            "total": report.trials.len(),
            "evaluated": report.evaluations,
            "replayed": report.replayed,
            "failed": failed,
        },
    });

    let mut file = File::create(path)?;
    file.write_all(serde_json::to_string_pretty(&json)?.as_bytes())?;
    Ok(())
}
