use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_interrupt(_: i32) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to every token built with
/// [`CancelToken::with_interrupts`].
///
/// Stages run in their own process groups, so a terminal Ctrl-C only reaches
/// the tuner. The token then stops the running stage through the cancel path.
#[cfg(unix)]
pub fn install_interrupt_handler() -> std::io::Result<()> {
    use nix::sys::signal::{signal, SigHandler, Signal};

    for sig in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic.
        unsafe { signal(sig, SigHandler::Handler(on_interrupt)) }.map_err(std::io::Error::from)?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install_interrupt_handler() -> std::io::Result<()> {
    Ok(())
}

/// Shared abort flag, optionally tripped by the appearance of a stop file or
/// by an interrupt signal.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    stop_file: Option<Arc<PathBuf>>,
    interrupts: bool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat the existence of `path` as a cancellation request.
    pub fn with_stop_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stop_file = Some(Arc::new(path.into()));
        self
    }

    /// Treat SIGINT/SIGTERM as a cancellation request. Needs
    /// [`install_interrupt_handler`].
    pub fn with_interrupts(mut self) -> Self {
        self.interrupts = true;
        self
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        if self.interrupts && INTERRUPTED.load(Ordering::SeqCst) {
            self.cancel();
            return true;
        }
        match &self.stop_file {
            Some(path) if path.exists() => {
                self.cancel();
                true
            }
            _ => false,
        }
    }
}
