use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::Result;

/// Build the subscriber: `RUST_LOG` filter (default `info`), human output on
/// stderr, and a plain-text copy appended to `log_file` when given, so a
/// long run keeps its history after the terminal is gone.
pub fn subscriber(log_file: Option<&Path>) -> Result<impl Subscriber + Send + Sync + use<>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    Ok(tracing_subscriber::registry().with(filter).with(stderr).with(file))
}

/// Install [`subscriber`] as the global default.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    subscriber(log_file)?.init();
    Ok(())
}
