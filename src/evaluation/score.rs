use std::path::Path;

use crate::settings::ScoreArtifact;

/// Read the aggregate metric from a per-sequence CSV summary.
///
/// Returns a human-readable reason when the file, the columns, the aggregate
/// row or a finite number cannot be found.
pub fn read_aggregate_score(path: &Path, artifact: &ScoreArtifact) -> Result<f64, String> {
    if !path.is_file() {
        return Err(format!("score file {} was not produced", path.display()));
    }

    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let headers = reader
        .headers()
        .map_err(|e| format!("cannot read header of {}: {}", path.display(), e))?
        .clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| format!("{} has no '{}' column", path.display(), name))
    };
    let seq_idx = column(&artifact.sequence_column)?;
    let metric_idx = column(&artifact.metric_column)?;

    for record in reader.records() {
        let record = record.map_err(|e| format!("malformed row in {}: {}", path.display(), e))?;
        if record.get(seq_idx).map(str::trim) != Some(artifact.sequence_key.as_str()) {
            continue;
        }

        let raw = record.get(metric_idx).unwrap_or("").trim();
        return match raw.parse::<f64>() {
            Ok(score) if score.is_finite() => Ok(score),
            _ => Err(format!(
                "'{}' for {} is not a number: '{}'",
                artifact.metric_column, artifact.sequence_key, raw
            )),
        };
    }

    Err(format!(
        "{} has no '{}' row",
        path.display(),
        artifact.sequence_key
    ))
}
