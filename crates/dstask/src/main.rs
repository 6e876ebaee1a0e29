//! CLI entry point for dstask.

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use commands::App;
use dstask_app::Config;

mod cmdline;
mod commands;

/// Marker that makes a command ignore the persisted context.
const IGNORE_CONTEXT: &str = "--";

/// Personal task tracker stored as YAML records in a git repository.
#[derive(Parser, Debug)]
#[command(name = "dstask", version, about = "dstask: git-backed personal task tracker")]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

/// Free-form command tokens: ids, `+tag`, `-tag`, `project:x`, `P0`..`P3`, words, `/ note`.
#[derive(Args, Debug, Default, Clone)]
struct Tokens {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    tokens: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show pending, active and paused tasks (default).
    Next(Tokens),
    /// Add a task.
    Add(Tokens),
    /// Record a task that is already done.
    Log(Tokens),
    /// Start tasks by id, or add and start a new task.
    Start(Tokens),
    /// Pause active tasks.
    Stop(Tokens),
    /// Resolve tasks.
    #[command(alias = "resolve")]
    Done(Tokens),
    /// Show, set (`context +work`) or clear (`context none`) the context.
    Context(Tokens),
    /// Change tags, project or priority of tasks.
    Modify(Tokens),
    /// Edit whole task records in the editor.
    Edit {
        /// Allow any status change.
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        tokens: Tokens,
    },
    /// Append to notes, or edit them in the editor.
    #[command(alias = "notes")]
    Note(Tokens),
    /// Revert the most recent change.
    Undo,
    /// Pull and push the task repository.
    Sync,
    /// Run git inside the task repository.
    Git {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Same as `next`.
    ShowNext(Tokens),
    /// Show every unresolved task.
    ShowOpen(Tokens),
    /// Show active tasks.
    ShowActive(Tokens),
    /// Show paused tasks.
    ShowPaused(Tokens),
    /// Show resolved tasks.
    ShowResolved(Tokens),
    /// Show open and resolved counts per project.
    ShowProjects(Tokens),
    /// Show tags in use by unresolved tasks.
    ShowTags(Tokens),
}

fn main() -> Result<()> {
    install_tracing();

    let (args, ignore_context) = normalize_args(std::env::args().collect());
    let Cli { cmd } = Cli::parse_from(args);
    let command = cmd.unwrap_or_else(|| Command::Next(Tokens::default()));

    let config = Config::from_env()?;
    let app = App::open(&config)?;
    commands::run(command, ignore_context, &app)
}

/// Default to `next` when no subcommand is named, move a command written after
/// its ids (`dstask 3 5 done`) to the front, and lift `--` out of the tokens.
fn normalize_args(mut args: Vec<String>) -> (Vec<String>, bool) {
    let names: Vec<String> = Cli::command()
        .get_subcommands()
        .flat_map(|sub| {
            std::iter::once(sub.get_name().to_owned())
                .chain(sub.get_all_aliases().map(str::to_owned))
        })
        .chain(["help".to_owned()])
        .collect();

    let ids = args
        .iter()
        .skip(1)
        .take_while(|arg| arg.parse::<u32>().is_ok())
        .count();
    if ids > 0 && args.get(1 + ids).is_some_and(|name| names.contains(name)) {
        let name = args.remove(1 + ids);
        args.insert(1, name);
    }

    if let Some(first) = args.get(1)
        && !names.contains(first)
        && !matches!(first.as_str(), "-h" | "--help" | "-V" | "--version")
    {
        args.insert(1, "next".to_owned());
    }

    if args.get(1).is_some_and(|name| name == "git") {
        return (args, false);
    }
    let before = args.len();
    args.retain(|arg| arg != IGNORE_CONTEXT);
    let ignore_context = args.len() != before;
    (args, ignore_context)
}

fn install_tracing() {
    // RUST_LOG overrides; warnings only by default so command output stays clean.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| (*arg).to_owned()).collect()
    }

    #[test]
    fn bare_tokens_default_to_next() {
        let (normalized, ignore) = normalize_args(args(&["dstask", "+work"]));
        assert_eq!(normalized, args(&["dstask", "next", "+work"]));
        assert!(!ignore);
    }

    #[test]
    fn double_dash_ignores_context() {
        let (normalized, ignore) = normalize_args(args(&["dstask", "add", "--", "Buy", "milk"]));
        assert_eq!(normalized, args(&["dstask", "add", "Buy", "milk"]));
        assert!(ignore);
    }

    #[test]
    fn git_passthrough_keeps_double_dash() {
        let raw = args(&["dstask", "git", "log", "--", "tasks"]);
        let (normalized, ignore) = normalize_args(raw.clone());
        assert_eq!(normalized, raw);
        assert!(!ignore);
    }

    #[test]
    fn aliases_are_recognised() {
        let (normalized, _) = normalize_args(args(&["dstask", "resolve", "3"]));
        assert_eq!(normalized, args(&["dstask", "resolve", "3"]));
    }

    #[test]
    fn command_after_ids_moves_to_the_front() {
        let (normalized, _) = normalize_args(args(&["dstask", "3", "5", "done"]));
        assert_eq!(normalized, args(&["dstask", "done", "3", "5"]));

        let (normalized, ignore) = normalize_args(args(&["dstask", "4", "modify", "--", "+urgent"]));
        assert_eq!(normalized, args(&["dstask", "modify", "4", "+urgent"]));
        assert!(ignore);
    }

    #[test]
    fn bare_ids_still_default_to_next() {
        let (normalized, _) = normalize_args(args(&["dstask", "3"]));
        assert_eq!(normalized, args(&["dstask", "next", "3"]));

        let (normalized, _) = normalize_args(args(&["dstask", "3", "fix", "bug"]));
        assert_eq!(normalized, args(&["dstask", "next", "3", "fix", "bug"]));
    }

    #[test]
    fn parse_add_with_hyphen_tokens() {
        let cli = Cli::parse_from(["dstask", "add", "Fix", "bug", "-wontfix", "+bug", "project:site"]);
        match cli.cmd {
            Some(Command::Add(Tokens { tokens })) => {
                assert_eq!(tokens, vec!["Fix", "bug", "-wontfix", "+bug", "project:site"]);
            }
            other => panic!("expected add command, got {other:?}"),
        }
    }

    #[test]
    fn parse_edit_force() {
        let cli = Cli::parse_from(["dstask", "edit", "--force", "4"]);
        match cli.cmd {
            Some(Command::Edit { force, tokens }) => {
                assert!(force);
                assert_eq!(tokens.tokens, vec!["4"]);
            }
            other => panic!("expected edit command, got {other:?}"),
        }
    }

    #[test]
    fn parse_show_commands() {
        let cli = Cli::parse_from(["dstask", "show-resolved", "+work"]);
        assert!(matches!(cli.cmd, Some(Command::ShowResolved(_))));
        let cli = Cli::parse_from(["dstask"]);
        assert!(cli.cmd.is_none());
    }
}
