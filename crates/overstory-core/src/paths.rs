//! Centralized path construction for the `.overstory/` directory layout.
//!
//! Single source of truth for every path under `<project>/.overstory/`.
//! Every other module takes an `OverstoryPaths` (or a bare `project_root`)
//! rather than joining path segments itself, so the on-disk layout only
//! needs to change in one place.

use std::path::{Path, PathBuf};

/// Path construction rooted at a project's `.overstory/` directory.
#[derive(Debug, Clone)]
pub struct OverstoryPaths {
    root: PathBuf,
}

impl OverstoryPaths {
    /// Root at `<project_root>/.overstory`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            root: project_root.into().join(".overstory"),
        }
    }

    /// Build directly from an already-resolved `.overstory` directory.
    /// Use in tests where a `TempDir` already points at the intended root.
    pub fn from_overstory_dir(overstory_dir: PathBuf) -> Self {
        Self { root: overstory_dir }
    }

    pub fn overstory_dir(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn watchdog_config_file(&self) -> PathBuf {
        self.root.join("watchdog.toml")
    }

    pub fn agent_manifest_file(&self) -> PathBuf {
        self.root.join("agent-manifest.json")
    }

    pub fn agent_defs_dir(&self) -> PathBuf {
        self.root.join("agent-defs")
    }

    pub fn agent_def_file(&self, capability: &str) -> PathBuf {
        self.agent_defs_dir().join(format!("{capability}.md"))
    }

    pub fn sessions_db(&self) -> PathBuf {
        self.root.join("sessions.db")
    }

    pub fn events_db(&self) -> PathBuf {
        self.root.join("events.db")
    }

    pub fn metrics_db(&self) -> PathBuf {
        self.root.join("metrics.db")
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.root.join("worktrees")
    }

    pub fn worktree_for_agent(&self, agent_name: &str) -> PathBuf {
        self.worktrees_dir().join(agent_name)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn agent_log_dir(&self, agent_name: &str, timestamp: &str) -> PathBuf {
        self.logs_dir().join(agent_name).join(timestamp)
    }

    pub fn mail_dir(&self) -> PathBuf {
        self.root.join("mail")
    }

    pub fn current_run_file(&self) -> PathBuf {
        self.root.join("current-run.txt")
    }

    pub fn run_complete_notified_file(&self) -> PathBuf {
        self.root.join("run-complete-notified.txt")
    }

    pub fn coordinator_pid_file(&self) -> PathBuf {
        self.root.join("coordinator.pid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_join_overstory_dir() {
        let paths = OverstoryPaths::new("/home/user/proj");
        assert_eq!(
            paths.overstory_dir(),
            Path::new("/home/user/proj/.overstory")
        );
        assert_eq!(
            paths.sessions_db(),
            Path::new("/home/user/proj/.overstory/sessions.db")
        );
        assert_eq!(
            paths.worktree_for_agent("scout-1"),
            Path::new("/home/user/proj/.overstory/worktrees/scout-1")
        );
        assert_eq!(
            paths.agent_def_file("builder"),
            Path::new("/home/user/proj/.overstory/agent-defs/builder.md")
        );
        assert_eq!(
            paths.agent_log_dir("scout-1", "20260101T000000"),
            Path::new("/home/user/proj/.overstory/logs/scout-1/20260101T000000")
        );
    }

    #[test]
    fn test_paths_from_overstory_dir() {
        let paths = OverstoryPaths::from_overstory_dir(PathBuf::from("/tmp/fixture/.overstory"));
        assert_eq!(
            paths.current_run_file(),
            Path::new("/tmp/fixture/.overstory/current-run.txt")
        );
    }
}
