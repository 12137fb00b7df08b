use std::path::Path;

use tracing::warn;

use crate::error::Result;
use crate::models::Trial;
use crate::state::TraceWriter;

/// Append-only record of every trial, in call order, optionally mirrored to a
/// JSON Lines file as it grows.
#[derive(Debug, Default)]
pub struct ResultTrace {
    trials: Vec<Trial>,
    sink: Option<TraceWriter>,
}

impl ResultTrace {
    /// A trace kept only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A trace that also writes each trial to `path`. Refuses to clobber a
    /// trace left by an earlier run.
    pub fn with_sink<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, false)
    }

    /// Like [`ResultTrace::with_sink`], but replaces whatever is at `path`.
    pub fn with_sink_overwriting<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, true)
    }

    fn open<P: AsRef<Path>>(path: P, overwrite: bool) -> Result<Self> {
        Ok(Self {
            trials: Vec::new(),
            sink: Some(TraceWriter::create(path, overwrite)?),
        })
    }

    /// Record a trial. A failing sink is reported and detached; the in-memory
    /// trace keeps growing.
    pub fn append(&mut self, trial: Trial) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write(&trial) {
                warn!(
                    path = %sink.path().display(),
                    "cannot write trace, continuing in memory: {}",
                    e
                );
                self.sink = None;
            }
        }
        self.trials.push(trial);
    }

    /// Every trial so far, in call order.
    pub fn snapshot(&self) -> &[Trial] {
        &self.trials
    }

    /// Sequence index the next appended trial will carry.
    pub fn next_index(&self) -> usize {
        self.trials.len()
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn into_trials(self) -> Vec<Trial> {
        self.trials
    }
}
