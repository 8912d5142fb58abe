mod cli;
mod commands;
mod logging;

use clap::{CommandFactory, Parser};

use cli::{Cli, Commands, CoordinatorAction, MailAction, WatchdogAction, WorktreeAction};
use commands::resolve_repo_root;

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(err) = dispatch(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> commands::CommandResult {
    let repo_root = resolve_repo_root(cli.repo_root.as_deref());

    match cli.command {
        Commands::Worktree { action } => match action {
            WorktreeAction::Create { agent, bead, base_branch } => {
                commands::worktree::create(&repo_root, &agent, &bead, &base_branch)
            }
            WorktreeAction::List { json } => commands::worktree::list(&repo_root, json),
            WorktreeAction::Clean { selector, force, json } => {
                commands::worktree::clean(&repo_root, selector, force, json)
            }
        },

        Commands::DeployHooks { agent, capability, worktree } => {
            commands::hooks::run(&repo_root, &agent, capability.into(), worktree)
        }

        Commands::Overlay { agent, config, template, canonical_root } => {
            commands::overlay::run(&agent, &config, &template, &canonical_root)
        }

        Commands::Coordinator { action } => match action {
            CoordinatorAction::Start { attach, no_attach } => {
                commands::coordinator::start(&repo_root, attach, no_attach)
            }
            CoordinatorAction::Stop => commands::coordinator::stop(&repo_root),
            CoordinatorAction::Status { json } => commands::coordinator::status(&repo_root, json),
        },

        Commands::Watchdog { action } => match action {
            WatchdogAction::Run { once } => commands::watchdog::run(&repo_root, once),
        },

        Commands::Sling { task, capability, name, parent, depth, base_branch, run } => {
            commands::sling::run(
                &repo_root,
                &name,
                &task,
                capability.into(),
                parent,
                depth,
                &base_branch,
                run,
            )
        }

        Commands::Log { phase, stdin, agent } => commands::log::run(&repo_root, phase, &agent, stdin),

        Commands::Prime { agent, compact } => commands::prime::run(&repo_root, &agent, compact),

        Commands::Mail { action } => match action {
            MailAction::Check { inject, agent, debounce } => {
                commands::mail::check(&repo_root, &agent, inject, debounce)
            }
            MailAction::Send { to, subject, body, r#type, agent, priority } => {
                commands::mail::send(&repo_root, &to, &subject, &body, r#type, &agent, priority.as_deref())
            }
        },

        Commands::Completions { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
            Ok(())
        }
    }
}
