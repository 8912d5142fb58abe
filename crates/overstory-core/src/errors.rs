//! Error taxonomy for the supervision core.
//!
//! One `thiserror` enum per component family: validation, agent-scoped,
//! worktree, transient multiplexer, and fire-and-forget (swallowed at the
//! call site, never represented as an error type here).

use std::path::PathBuf;

/// Errors from the terminal-multiplexer adapter (C1).
#[derive(Debug, thiserror::Error)]
pub enum TmuxError {
    #[error("tmux session '{name}' already exists")]
    SessionAlreadyExists { name: String },

    #[error("no tmux server running")]
    NoServerRunning,

    #[error("can't find tmux session '{name}'")]
    SessionNotFound { name: String },

    #[error("tmux operation on session '{name}' failed: {message}")]
    OperationFailed { name: String, message: String },

    #[error("failed to execute tmux: {0}")]
    Io(#[from] std::io::Error),

    #[error("tmux binary not found in PATH")]
    BinaryNotFound,
}

/// Errors from the worktree manager (C2).
#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    #[error("worktree already exists at '{path}' on branch '{branch}'")]
    AlreadyExists { path: PathBuf, branch: String },

    #[error("worktree not found at '{path}'")]
    NotFound { path: PathBuf },

    #[error("refusing to remove '{path}': path is the main repository checkout")]
    RefusingMainRepo { path: PathBuf },

    #[error("'{path}' is not a git repository")]
    NotAGitRepository { path: PathBuf },

    #[error("git operation on worktree '{path}' (branch '{branch}') failed: {message}")]
    GitOperationFailed {
        path: PathBuf,
        branch: String,
        message: String,
    },

    #[error(transparent)]
    Git2(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the session store (C3).
#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("duplicate tmux_session '{tmux_session}' among live sessions")]
    DuplicateTmuxSession { tmux_session: String },

    #[error("session for agent '{agent_name}' not found")]
    NotFound { agent_name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Errors from the guard synthesizer (C6).
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("failed to write hook document to '{path}': {message}")]
    WriteFailed { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Errors from the overlay generator (C7).
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error(
        "refusing to write overlay into canonical project root '{path}'; \
         overlays must only be written into agent worktrees"
    )]
    CanonicalRootWrite { path: PathBuf },

    #[error("template is missing required placeholder '{placeholder}'")]
    MissingPlaceholder { placeholder: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the watchdog daemon (C8) and coordinator lifecycle (C9).
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    #[error("agent '{agent_name}': {message}")]
    AgentError { agent_name: String, message: String },

    #[error("coordinator is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("coordinator is not running")]
    NotRunning,

    #[error(transparent)]
    Tmux(#[from] TmuxError),

    #[error(transparent)]
    SessionStore(#[from] SessionStoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
