//! `overstory coordinator {start,stop,status}` (C9).

use std::io::IsTerminal;
use std::path::Path;

use tracing::info;

use overstory_core::coordinator::{self, AttachMode, CoordinatorStatus};
use overstory_core::paths::OverstoryPaths;
use overstory_core::tmux::RealMultiplexer;

use super::CommandResult;

const SESSION_NAME: &str = "overstory-coordinator";

pub fn start(repo_root: &Path, attach: bool, no_attach: bool) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    info!(event = "cli.coordinator.start_requested");

    let pid = coordinator::start(&paths.coordinator_pid_file(), SESSION_NAME, repo_root, "overstory watchdog run")?;
    println!("coordinator started (pid {pid}, session {SESSION_NAME})");

    let mode = AttachMode::resolve(attach, no_attach, std::io::stdout().is_terminal());
    if mode == AttachMode::Attach {
        let command = coordinator::attach_command(SESSION_NAME);
        let status = std::process::Command::new(&command[0]).args(&command[1..]).status()?;
        if !status.success() {
            return Err(format!("tmux attach exited with status {status}").into());
        }
    }
    Ok(())
}

pub fn stop(repo_root: &Path) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    info!(event = "cli.coordinator.stop_requested");
    coordinator::stop(&RealMultiplexer, &paths.coordinator_pid_file(), SESSION_NAME)?;
    println!("coordinator stopped");
    Ok(())
}

pub fn status(repo_root: &Path, json: bool) -> CommandResult {
    let paths = OverstoryPaths::new(repo_root);
    let status = coordinator::status(&paths.coordinator_pid_file());

    if json {
        let body = match status {
            CoordinatorStatus::Running { pid } => serde_json::json!({"running": true, "pid": pid}),
            CoordinatorStatus::NotRunning => serde_json::json!({"running": false}),
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        match status {
            CoordinatorStatus::Running { pid } => println!("running (pid {pid})"),
            CoordinatorStatus::NotRunning => println!("not running"),
        }
    }
    Ok(())
}
