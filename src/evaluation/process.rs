use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::evaluation::CancelToken;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A stage command with every placeholder filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

/// Why a stage did not complete successfully.
#[derive(Debug)]
pub enum StageFailure {
    Spawn(io::Error),
    /// Exit code, or `None` when killed by a signal.
    Exit(Option<i32>),
    Timeout(Duration),
    Cancelled,
    Io(io::Error),
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageFailure::Spawn(e) => write!(f, "could not start: {}", e),
            StageFailure::Exit(Some(code)) => write!(f, "exited with status {}", code),
            StageFailure::Exit(None) => write!(f, "terminated by signal"),
            StageFailure::Timeout(limit) => write!(f, "timed out after {:?}", limit),
            StageFailure::Cancelled => write!(f, "cancelled"),
            StageFailure::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

/// Run one pipeline stage to completion, sending stdout and stderr to
/// `log_path`.
///
/// Blocks until the process exits, `timeout` elapses or `cancel` trips. In the
/// last two cases the stage's whole process group is killed and the stage is
/// reaped before returning, so wrapper scripts leave nothing running.
pub fn run_stage(
    command: &ResolvedCommand,
    log_path: &Path,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<(), StageFailure> {
    let stdout = File::create(log_path).map_err(StageFailure::Io)?;
    let stderr = stdout.try_clone().map_err(StageFailure::Io)?;

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    debug!(program = %command.program, args = ?command.args, "spawning stage");
    let mut child = cmd.spawn().map_err(StageFailure::Spawn)?;
    let deadline = Instant::now() + timeout;

    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(()),
            Ok(Some(status)) => return Err(StageFailure::Exit(status.code())),
            Ok(None) => {}
            Err(e) => {
                terminate(&mut child);
                return Err(StageFailure::Io(e));
            }
        }

        if cancel.is_cancelled() {
            terminate(&mut child);
            return Err(StageFailure::Cancelled);
        }

        let now = Instant::now();
        if now >= deadline {
            terminate(&mut child);
            return Err(StageFailure::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    debug!(pgid = child.id(), "killing stage process group");
    // The stage leads its own group, so the group id is its pid
    if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        debug!("killpg failed ({}), killing the stage alone", e);
        let _ = child.kill();
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    debug!(pid = child.id(), "killing stage");
    let _ = child.kill();
    let _ = child.wait();
}
