pub mod coordinator;
pub mod hooks;
pub mod log;
pub mod mail;
pub mod overlay;
pub mod prime;
pub mod sling;
pub mod watchdog;
pub mod worktree;

/// Shared error type for command handlers.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Resolves the project root a command should operate against: the
/// explicit `--repo-root` flag, or the current directory.
pub fn resolve_repo_root(repo_root: Option<&std::path::Path>) -> std::path::PathBuf {
    repo_root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().expect("current directory must be readable"))
}
