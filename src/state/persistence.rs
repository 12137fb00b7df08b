use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, TuneError};
use crate::models::Trial;

/// Writes trials as JSON Lines, flushing after each one so a crashed run
/// leaves a usable trace behind.
#[derive(Debug)]
pub struct TraceWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl TraceWriter {
    /// Open a fresh trace at `path`. A file that already holds trials is only
    /// replaced when `overwrite` is set.
    pub fn create<P: AsRef<Path>>(path: P, overwrite: bool) -> Result<Self> {
        let path = path.as_ref();
        check_extension(path)?;
        if !overwrite && fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false) {
            return Err(TuneError::TraceExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, trial: &Trial) -> Result<()> {
        serde_json::to_writer(&mut self.writer, trial)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

fn check_extension(path: &Path) -> Result<()> {
    if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
        return Err(TuneError::Config(format!(
            "trace file {} should have a .jsonl extension",
            path.display()
        )));
    }
    Ok(())
}

/// Load a JSON Lines trace.
///
/// Blank lines are skipped. A malformed final line is assumed to be a write
/// cut short by a crash and is dropped with a warning; a malformed line
/// anywhere else is an error.
pub fn load_trace<P: AsRef<Path>>(path: P) -> Result<Vec<Trial>> {
    let path = path.as_ref();
    check_extension(path)?;
    let content = fs::read_to_string(path)?;

    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    let mut trials = Vec::with_capacity(lines.len());
    for (pos, (line_no, line)) in lines.iter().enumerate() {
        match serde_json::from_str::<Trial>(line) {
            Ok(trial) => trials.push(trial),
            Err(e) if pos + 1 == lines.len() => {
                warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    "dropping truncated final trace line: {}",
                    e
                );
            }
            Err(e) => {
                return Err(TuneError::Config(format!(
                    "malformed trace {} line {}: {}",
                    path.display(),
                    line_no + 1,
                    e
                )));
            }
        }
    }
    Ok(trials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;
    use tempfile::TempDir;

    const LINE_A: &str = r#"{"trial_index":0,"configuration":{"alpha":0.5},"outcome":"success","score":10.0}"#;
    const LINE_B: &str = r#"{"trial_index":1,"configuration":{"alpha":0.2},"outcome":"evaluation_failed","score":null,"detail":"inference: exited with status 1"}"#;

    #[test]
    fn test_load_trace() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        fs::write(&path, format!("{}\n\n{}\n", LINE_A, LINE_B)).unwrap();

        let trials = load_trace(&path).unwrap();
        assert_eq!(trials.len(), 2);
        assert_eq!(trials[0].score, Some(10.0));
        assert_eq!(trials[1].outcome, Outcome::EvaluationFailed);
        assert_eq!(
            trials[1].detail.as_deref(),
            Some("inference: exited with status 1")
        );
    }

    #[test]
    fn test_truncated_tail_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        fs::write(&path, format!("{}\n{}", LINE_A, &LINE_B[..40])).unwrap();

        let trials = load_trace(&path).unwrap();
        assert_eq!(trials.len(), 1);
    }

    #[test]
    fn test_corrupt_middle_line_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        fs::write(&path, format!("{}\nnot json\n{}\n", LINE_A, LINE_B)).unwrap();

        let err = load_trace(&path).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }

    #[test]
    fn test_extension_is_checked() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            TraceWriter::create(dir.path().join("run.json"), false),
            Err(TuneError::Config(_))
        ));
    }

    #[test]
    fn test_existing_trace_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.jsonl");
        fs::write(&path, format!("{}\n", LINE_A)).unwrap();

        assert!(matches!(
            TraceWriter::create(&path, false),
            Err(TuneError::TraceExists(_))
        ));
        assert_eq!(load_trace(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_empty_or_forced_trace_is_replaced() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.jsonl");
        fs::write(&empty, "").unwrap();
        TraceWriter::create(&empty, false).unwrap();

        let full = dir.path().join("full.jsonl");
        fs::write(&full, format!("{}\n", LINE_A)).unwrap();
        TraceWriter::create(&full, true).unwrap();
        assert!(load_trace(&full).unwrap().is_empty());
    }
}
