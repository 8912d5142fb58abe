//! Terminal-multiplexer adapter (C1).
//!
//! All production `std::process::Command::new("tmux")` calls live here:
//! every function validates arguments, logs a structured
//! `core.tmux.<action>_*` event, and maps failures to [`TmuxError`].
//!
//! Process-tree walking and signaling (`get_descendant_pids`,
//! `kill_process_tree`, `is_process_alive`) use `sysinfo` for the tree
//! walk and `nix::sys::signal::kill` for the actual signal.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use sysinfo::{Pid as SysPid, System};
use tracing::{debug, info, warn};

use crate::errors::TmuxError;

/// A running (or once-running) multiplexer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    pub pid: u32,
}

/// Validates a multiplexer session name to prevent option/argument
/// injection into `tmux` subcommands.
fn validate_session_name(name: &str) -> Result<(), TmuxError> {
    if name.is_empty() || name.starts_with('-') || name.chars().any(|c| c.is_control()) {
        return Err(TmuxError::OperationFailed {
            name: name.to_string(),
            message: "invalid session name".to_string(),
        });
    }
    Ok(())
}

fn tmux_binary() -> Result<PathBuf, TmuxError> {
    which::which("tmux").map_err(|_| TmuxError::BinaryNotFound)
}

fn run_tmux(args: &[&str]) -> Result<std::process::Output, TmuxError> {
    let binary = tmux_binary()?;
    std::process::Command::new(binary)
        .args(args)
        .output()
        .map_err(TmuxError::Io)
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Starts a detached session named `name` at `cwd` running `command`. The
/// wrapper restores `PATH` to include the directory containing this tool's
/// own binary first, so spawned agents can invoke it by short name.
pub fn create_session(
    name: &str,
    cwd: &std::path::Path,
    command: &str,
    env: &[(&str, &str)],
) -> Result<u32, TmuxError> {
    validate_session_name(name)?;

    info!(
        event = "core.tmux.create_session_started",
        name = name,
        cwd = %cwd.display()
    );

    let self_bin_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()));
    let path_prefix = self_bin_dir
        .map(|d| format!("{}:", d.display()))
        .unwrap_or_default();
    let wrapped = format!("export PATH=\"{path_prefix}$PATH\"; exec {command}");

    let binary = tmux_binary()?;
    let mut cmd = std::process::Command::new(binary);
    cmd.args(["new-session", "-d", "-s", name, "-c"])
        .arg(cwd)
        .args(["bash", "-lc", &wrapped]);
    for (key, value) in env {
        cmd.env(key, value);
    }

    let output = cmd.output().map_err(TmuxError::Io)?;
    if !output.status.success() {
        let stderr = stderr_of(&output);
        if stderr.contains("duplicate session") {
            warn!(event = "core.tmux.create_session_duplicate", name = name);
            return Err(TmuxError::SessionAlreadyExists {
                name: name.to_string(),
            });
        }
        return Err(TmuxError::OperationFailed {
            name: name.to_string(),
            message: stderr,
        });
    }

    let pid = get_pane_pid(name)?.ok_or_else(|| TmuxError::OperationFailed {
        name: name.to_string(),
        message: "session created but pane pid query returned nothing".to_string(),
    })?;

    info!(
        event = "core.tmux.create_session_completed",
        name = name,
        pid = pid
    );
    Ok(pid)
}

/// Lists every live session. Empty (not an error) when no server is
/// running or no sessions exist.
pub fn list_sessions() -> Result<Vec<SessionInfo>, TmuxError> {
    let output = run_tmux(&["list-sessions", "-F", "#{session_name}\t#{pane_pid}"])?;
    if !output.status.success() {
        let stderr = stderr_of(&output);
        if stderr.contains("no server running") || stderr.contains("no current client") {
            return Ok(Vec::new());
        }
        return Err(TmuxError::OperationFailed {
            name: String::new(),
            message: stderr,
        });
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut sessions = Vec::new();
    for line in stdout.lines() {
        let mut parts = line.splitn(2, '\t');
        let (Some(name), Some(pid_str)) = (parts.next(), parts.next()) else {
            continue;
        };
        if let Ok(pid) = pid_str.trim().parse::<u32>() {
            sessions.push(SessionInfo {
                name: name.to_string(),
                pid,
            });
        }
    }
    Ok(sessions)
}

/// The pane pid for `name`, or `None` if the session is absent.
pub fn get_pane_pid(name: &str) -> Result<Option<u32>, TmuxError> {
    validate_session_name(name)?;
    let output = run_tmux(&["display-message", "-p", "-t", name, "#{pane_pid}"])?;
    if !output.status.success() {
        return Ok(None);
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<u32>()
        .ok())
}

/// Depth-first descendants of `root_pid`, deepest leaves first. Missing
/// children are benign.
pub fn get_descendant_pids(root_pid: u32) -> Vec<u32> {
    let mut system = System::new_all();
    system.refresh_all();

    fn collect(system: &System, pid: SysPid, out: &mut Vec<u32>) {
        for (candidate_pid, process) in system.processes() {
            if process.parent() == Some(pid) {
                collect(system, *candidate_pid, out);
                out.push(candidate_pid.as_u32());
            }
        }
    }

    let mut descendants = Vec::new();
    collect(&system, SysPid::from_u32(root_pid), &mut descendants);
    descendants
}

/// Whether `pid` is alive, via a no-op signal.
pub fn is_process_alive(pid: u32) -> bool {
    signal::kill(NixPid::from_raw(pid as i32), None).is_ok()
}

/// Deepest-first graceful termination, then a bounded grace period, then
/// selective force-kill of survivors. Signal errors against already-dead
/// pids are swallowed (§4.1, §9 "Process-tree termination").
pub fn kill_process_tree(root_pid: u32, grace: Duration) {
    let mut targets = get_descendant_pids(root_pid);
    targets.push(root_pid);

    for pid in &targets {
        let _ = signal::kill(NixPid::from_raw(*pid as i32), Signal::SIGTERM);
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if targets.iter().all(|pid| !is_process_alive(*pid)) {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    for pid in &targets {
        if is_process_alive(*pid) {
            let _ = signal::kill(NixPid::from_raw(*pid as i32), Signal::SIGKILL);
        }
    }
}

/// Looks up the pane pid, kills its process tree, then kills the
/// multiplexer session. A session-not-found error on the final step is
/// silent; any other failure propagates with `name` attached.
pub fn kill_session(name: &str, grace: Duration) -> Result<(), TmuxError> {
    validate_session_name(name)?;
    if let Some(pid) = get_pane_pid(name)? {
        kill_process_tree(pid, grace);
    }

    let output = run_tmux(&["kill-session", "-t", name])?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = stderr_of(&output);
    if stderr.contains("can't find session") {
        debug!(event = "core.tmux.kill_session_already_gone", name = name);
        return Ok(());
    }
    Err(TmuxError::OperationFailed {
        name: name.to_string(),
        message: stderr,
    })
}

pub fn is_session_alive(name: &str) -> Result<bool, TmuxError> {
    Ok(get_pane_pid(name)?.is_some())
}

/// Collapses newlines to spaces and always appends an `Enter` keystroke.
pub fn send_keys(name: &str, text: &str) -> Result<(), TmuxError> {
    validate_session_name(name)?;
    let collapsed = text.replace('\n', " ");
    let output = run_tmux(&["send-keys", "-t", name, &collapsed, "Enter"])?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = stderr_of(&output);
    let message = if stderr.contains("no server running") {
        "no server running".to_string()
    } else if stderr.contains("can't find session") {
        "can't find session".to_string()
    } else {
        stderr
    };
    Err(TmuxError::OperationFailed {
        name: name.to_string(),
        message,
    })
}

/// Captures the last `lines` lines of pane output. `None` on empty or
/// missing session.
pub fn capture_pane_content(name: &str, lines: u32) -> Result<Option<String>, TmuxError> {
    validate_session_name(name)?;
    let scrollback = format!("-{lines}");
    let output = run_tmux(&["capture-pane", "-p", "-t", name, "-S", &scrollback])?;
    if !output.status.success() {
        return Ok(None);
    }
    let content = String::from_utf8_lossy(&output.stdout).to_string();
    if content.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(content))
    }
}

/// Polls `capture_pane_content` until it returns non-empty content or
/// `timeout` elapses.
pub fn wait_for_tui_ready(name: &str, timeout: Duration, poll: Duration) -> Result<bool, TmuxError> {
    let deadline = Instant::now() + timeout;
    loop {
        if capture_pane_content(name, 50)?.is_some() {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        std::thread::sleep(poll);
    }
}

/// Contract boundary for the terminal-multiplexer adapter (§9
/// "Dependency injection"), so the watchdog and coordinator can be tested
/// against an in-memory fake instead of a real `tmux` server.
pub trait Multiplexer: Send + Sync {
    fn is_session_alive(&self, name: &str) -> Result<bool, TmuxError>;
    fn send_keys(&self, name: &str, text: &str) -> Result<(), TmuxError>;
    fn kill_session(&self, name: &str, grace: Duration) -> Result<(), TmuxError>;
    fn capture_pane_content(&self, name: &str, lines: u32) -> Result<Option<String>, TmuxError>;
}

/// Shells out to the real `tmux` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealMultiplexer;

impl Multiplexer for RealMultiplexer {
    fn is_session_alive(&self, name: &str) -> Result<bool, TmuxError> {
        is_session_alive(name)
    }

    fn send_keys(&self, name: &str, text: &str) -> Result<(), TmuxError> {
        send_keys(name, text)
    }

    fn kill_session(&self, name: &str, grace: Duration) -> Result<(), TmuxError> {
        kill_session(name, grace)
    }

    fn capture_pane_content(&self, name: &str, lines: u32) -> Result<Option<String>, TmuxError> {
        capture_pane_content(name, lines)
    }
}
