//! overstory-core: agent supervision, worktree lifecycle, and structural safety
//!
//! This library implements the "hard engineering" core of an agent
//! orchestration system: a watchdog daemon that reconciles liveness signals
//! for spawned coding agents, a worktree/session lifecycle manager, a
//! structural safety (hook) synthesizer, a per-worker overlay generator, and
//! run-level completion detection.
//!
//! The worker agent CLI itself, the issue tracker, the knowledge base, and
//! the mail bus are external collaborators referenced only by command shape.
//!
//! # Module map
//!
//! - [`tmux`] — terminal-multiplexer adapter (C1)
//! - [`worktree`] — git worktree lifecycle (C2)
//! - [`sessions`] — session store and data model (C3)
//! - [`events`] — append-only event log (C4)
//! - [`health`] — pure health evaluator (C5)
//! - [`guards`] — structural safety hook synthesizer (C6)
//! - [`overlay`] — per-agent assignment document generator (C7)
//! - [`watchdog`] — supervisor tick loop (C8)
//! - [`coordinator`] — top-level supervisor lifecycle (C9)
//! - [`housekeeper`] — worktree listing/cleanup (C10)
//! - [`failure`] — fire-and-forget knowledge-base learning notes (C11)
//! - [`notifier`] — run-complete detection (C12)
//! - [`metrics`] — per-session telemetry and token snapshots

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod failure;
pub mod guards;
pub mod health;
pub mod housekeeper;
pub mod metrics;
pub mod notifier;
pub mod overlay;
pub mod paths;
pub mod sessions;
#[cfg(test)]
pub(crate) mod testutil;
pub mod tmux;
pub mod watchdog;
pub mod worktree;

pub use errors::{
    GuardError, OverlayError, SessionStoreError, TmuxError, WatchdogError, WorktreeError,
};
pub use sessions::types::{AgentSession, Capability, SessionState};
