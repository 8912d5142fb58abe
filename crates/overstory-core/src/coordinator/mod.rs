//! Top-level coordinator lifecycle (C9): start/stop/status for the single
//! persistent supervisor session.
//!
//! PID-file bookkeeping: write the current process pid on start,
//! `kill(pid, 0)` to probe liveness, remove a stale file automatically on
//! `status`/`start`.

use std::path::Path;

use nix::sys::signal;
use nix::unistd::Pid as NixPid;
use tracing::{info, warn};

use crate::errors::WatchdogError;
use crate::tmux::{self, Multiplexer};

/// Whether the caller should attach its terminal to the coordinator's
/// tmux session after a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMode {
    Attach,
    Detach,
}

impl AttachMode {
    /// Resolves `--attach`/`--no-attach` flags against whether stdout is a
    /// TTY. `--attach` wins if both are present (§6).
    pub fn resolve(attach_flag: bool, no_attach_flag: bool, stdout_is_tty: bool) -> Self {
        if attach_flag {
            AttachMode::Attach
        } else if no_attach_flag {
            AttachMode::Detach
        } else if stdout_is_tty {
            AttachMode::Attach
        } else {
            AttachMode::Detach
        }
    }
}

/// Coordinator lifecycle status.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorStatus {
    Running { pid: u32 },
    NotRunning,
}

fn is_process_alive(pid: u32) -> bool {
    match signal::kill(NixPid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

fn read_pid_file(pid_file: &Path) -> Option<u32> {
    let contents = std::fs::read_to_string(pid_file).ok()?;
    contents.trim().parse::<u32>().ok()
}

fn write_pid_file(pid_file: &Path, pid: u32) -> Result<(), WatchdogError> {
    if let Some(parent) = pid_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(pid_file, format!("{pid}\n"))?;
    Ok(())
}

fn remove_pid_file(pid_file: &Path) -> Result<(), WatchdogError> {
    match std::fs::remove_file(pid_file) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(WatchdogError::Io(err)),
    }
}

/// Reads `pid_file`, verifying liveness and pruning a stale entry.
pub fn status(pid_file: &Path) -> CoordinatorStatus {
    let Some(pid) = read_pid_file(pid_file) else {
        return CoordinatorStatus::NotRunning;
    };
    if is_process_alive(pid) {
        CoordinatorStatus::Running { pid }
    } else {
        warn!(event = "core.coordinator.stale_pid_file", pid = pid);
        if let Err(err) = remove_pid_file(pid_file) {
            warn!(event = "core.coordinator.stale_pid_remove_failed", error = %err);
        }
        CoordinatorStatus::NotRunning
    }
}

/// Starts the coordinator: creates a detached tmux session named
/// `session_name` running `command` in `cwd`, records its pid in
/// `pid_file`. Errors if already running.
pub fn start(
    pid_file: &Path,
    session_name: &str,
    cwd: &Path,
    command: &str,
) -> Result<u32, WatchdogError> {
    if let CoordinatorStatus::Running { pid } = status(pid_file) {
        return Err(WatchdogError::AlreadyRunning { pid });
    }

    let pid = tmux::create_session(session_name, cwd, command, &[])?;
    write_pid_file(pid_file, pid)?;
    info!(event = "core.coordinator.started", pid = pid, session = session_name);
    Ok(pid)
}

/// Stops the coordinator: kills the tmux session and removes the pid file.
/// Errors if not running.
pub fn stop(
    multiplexer: &dyn Multiplexer,
    pid_file: &Path,
    session_name: &str,
) -> Result<(), WatchdogError> {
    if status(pid_file) == CoordinatorStatus::NotRunning {
        return Err(WatchdogError::NotRunning);
    }

    multiplexer.kill_session(session_name, std::time::Duration::from_secs(5))?;
    remove_pid_file(pid_file)?;
    info!(event = "core.coordinator.stopped", session = session_name);
    Ok(())
}

/// Shells `tmux attach-session` for the given session, replacing nothing —
/// callers exec this in the foreground themselves; this just builds the
/// command line since attaching requires inheriting the caller's tty.
pub fn attach_command(session_name: &str) -> Vec<String> {
    vec![
        "tmux".to_string(),
        "attach-session".to_string(),
        "-t".to_string(),
        session_name.to_string(),
    ]
}
