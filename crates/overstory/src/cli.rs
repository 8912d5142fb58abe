//! Command-line surface, one subcommand per module. Uses `clap`'s derive
//! API so every subcommand's arguments stay next to its doc comment
//! instead of being split across a separate app-builder module.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "overstory",
    version,
    about = "Agent supervision, worktree lifecycle, and structural safety for overstory"
)]
pub struct Cli {
    /// Enable verbose (info-level) structured logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root containing `.overstory/`. Defaults to the current directory.
    #[arg(long, global = true)]
    pub repo_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Worktree lifecycle: create, list, and clean agent worktrees (C2, C10).
    Worktree {
        #[command(subcommand)]
        action: WorktreeAction,
    },

    /// Synthesize and deploy the structural-safety hook document (C6).
    DeployHooks {
        /// Agent name the hooks guard.
        #[arg(long)]
        agent: String,
        /// Declared capability, determining guard composition.
        #[arg(long)]
        capability: CapabilityArg,
        /// Worktree root to deploy into. Defaults to `.overstory/worktrees/<agent>`.
        #[arg(long)]
        worktree: Option<PathBuf>,
    },

    /// Render and write the per-agent assignment document (C7).
    Overlay {
        /// Agent name.
        #[arg(long)]
        agent: String,
        /// Overlay config as a JSON document (see `overstory_core::overlay::OverlayConfig`).
        #[arg(long)]
        config: PathBuf,
        /// Markdown template with `{{PLACEHOLDER}}` tokens.
        #[arg(long)]
        template: PathBuf,
        /// Canonical project root; refuses to write if the worktree resolves here.
        #[arg(long)]
        canonical_root: PathBuf,
    },

    /// Top-level supervisor lifecycle (C9).
    Coordinator {
        #[command(subcommand)]
        action: CoordinatorAction,
    },

    /// Watchdog tick loop (C8).
    Watchdog {
        #[command(subcommand)]
        action: WatchdogAction,
    },

    /// Composes worktree + session + hooks + overlay to spawn a subordinate agent.
    Sling {
        /// Task (bead) id this agent will work on.
        task: String,
        /// Declared capability for the new agent.
        #[arg(long)]
        capability: CapabilityArg,
        /// Agent name.
        #[arg(long)]
        name: String,
        /// Parent agent name, if spawned by another agent.
        #[arg(long)]
        parent: Option<String>,
        /// Depth in the spawn tree.
        #[arg(long, default_value_t = 0)]
        depth: u32,
        /// Base branch to cut the agent's branch from.
        #[arg(long, default_value = "main")]
        base_branch: String,
        /// Run id this agent belongs to.
        #[arg(long)]
        run: Option<String>,
    },

    /// Appends a tool-invocation or lifecycle event to the event log (C4).
    Log {
        /// Which lifecycle point this event marks.
        phase: LogPhase,
        /// Read the event body as JSON from stdin.
        #[arg(long)]
        stdin: bool,
        /// Agent name the event is scoped to.
        #[arg(long)]
        agent: String,
    },

    /// Primes an agent's context from the knowledge base.
    ///
    /// The knowledge base ("mulch") is an external collaborator (§1); this
    /// subcommand exists only so hook scripts have a stable command to
    /// invoke, and records a `prime_requested` event for observability.
    Prime {
        #[arg(long)]
        agent: String,
        /// Set on `PreCompact` invocations.
        #[arg(long)]
        compact: bool,
    },

    /// Mail-bus commands. The mail bus itself is an external collaborator
    /// (§1); these subcommands give hook scripts a stable command shape.
    Mail {
        #[command(subcommand)]
        action: MailAction,
    },

    /// Generates shell completions for the given shell.
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum WorktreeAction {
    /// Creates an isolated worktree + branch for an agent.
    Create {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        bead: String,
        #[arg(long, default_value = "main")]
        base_branch: String,
    },
    /// Lists worktrees, cross-referenced against session state.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Removes worktrees matching a selector.
    Clean {
        #[arg(long, value_enum, default_value_t = CleanSelectorArg::Default)]
        selector: CleanSelectorArg,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CleanSelectorArg {
    Default,
    Completed,
    All,
}

#[derive(Debug, Subcommand)]
pub enum WatchdogAction {
    /// Runs the tick loop in the foreground. `--once` runs a single tick
    /// and exits instead of looping forever.
    Run {
        #[arg(long)]
        once: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum CoordinatorAction {
    Start {
        #[arg(long)]
        attach: bool,
        #[arg(long)]
        no_attach: bool,
    },
    Stop,
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum MailAction {
    Check {
        #[arg(long)]
        inject: bool,
        #[arg(long)]
        agent: String,
        #[arg(long, default_value_t = 0)]
        debounce: u64,
    },
    Send {
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        #[arg(long, value_enum)]
        r#type: MailTypeArg,
        #[arg(long)]
        agent: String,
        #[arg(long)]
        priority: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MailTypeArg {
    Result,
    WorkerDone,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogPhase {
    ToolStart,
    ToolEnd,
    SessionEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CapabilityArg {
    Coordinator,
    Supervisor,
    Lead,
    Builder,
    Merger,
    Scout,
    Reviewer,
    Monitor,
}

impl From<CapabilityArg> for overstory_core::sessions::types::Capability {
    fn from(value: CapabilityArg) -> Self {
        use overstory_core::sessions::types::Capability;
        match value {
            CapabilityArg::Coordinator => Capability::Coordinator,
            CapabilityArg::Supervisor => Capability::Supervisor,
            CapabilityArg::Lead => Capability::Lead,
            CapabilityArg::Builder => Capability::Builder,
            CapabilityArg::Merger => Capability::Merger,
            CapabilityArg::Scout => Capability::Scout,
            CapabilityArg::Reviewer => Capability::Reviewer,
            CapabilityArg::Monitor => Capability::Monitor,
        }
    }
}
