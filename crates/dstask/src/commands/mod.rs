use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use dstask_app::{
    BatchReport, Config, ContextFile, DEFAULT_EDIT_ATTEMPTS, ExternalEditor, GitTaskLog, NewTask,
    TaskPatch, TaskStore, TaskWriter,
};
use dstask_core::{Filter, Snapshot, Status, Task};
use tracing::debug;

use crate::cmdline::CmdLine;
use crate::{Command, Tokens};

mod render;
mod sync;

const NEXT_STATUSES: [Status; 3] = [Status::Pending, Status::Active, Status::Paused];

/// Everything a command needs, built once from [`Config`].
pub struct App {
    writer: TaskWriter<GitTaskLog>,
    context_file: ContextFile,
    editor: ExternalEditor,
}

impl App {
    /// Open the task repository described by `config`, creating it when missing.
    pub fn open(config: &Config) -> Result<Self> {
        let log = GitTaskLog::open(&config.repo_dir)?;
        let attempts = if config.fake_pty { 1 } else { DEFAULT_EDIT_ATTEMPTS };
        Ok(Self {
            writer: TaskWriter::new(TaskStore::new(log)).with_edit_attempts(attempts),
            context_file: ContextFile::new(&config.context_file),
            editor: ExternalEditor::from_config(config),
        })
    }

    fn context(&self, ignore_context: bool) -> Result<Filter> {
        if ignore_context {
            return Ok(Filter::default());
        }
        self.context_file.load()
    }
}

enum View {
    Next,
    Open,
    Only(Status),
    Resolved,
}

pub fn run(command: Command, ignore_context: bool, app: &App) -> Result<()> {
    match command {
        Command::Next(tokens) | Command::ShowNext(tokens) => list(app, &tokens, ignore_context, &View::Next),
        Command::ShowOpen(tokens) => list(app, &tokens, ignore_context, &View::Open),
        Command::ShowActive(tokens) => list(app, &tokens, ignore_context, &View::Only(Status::Active)),
        Command::ShowPaused(tokens) => list(app, &tokens, ignore_context, &View::Only(Status::Paused)),
        Command::ShowResolved(tokens) => list(app, &tokens, ignore_context, &View::Resolved),
        Command::ShowProjects(tokens) => show_projects(app, &tokens, ignore_context),
        Command::ShowTags(tokens) => show_tags(app, &tokens, ignore_context),

        Command::Add(tokens) => {
            let cmdline = parse(&tokens)?;
            let task = app.writer.add(&app.context(ignore_context)?, new_task(cmdline))?;
            println!("Added {task}");
            Ok(())
        }
        Command::Log(tokens) => {
            let cmdline = parse(&tokens)?;
            let task = app.writer.log(&app.context(ignore_context)?, new_task(cmdline))?;
            println!("Logged {task}");
            Ok(())
        }
        Command::Start(tokens) => {
            let cmdline = parse(&tokens)?;
            if cmdline.filter.ids.is_empty() {
                let task = app.writer.start_new(&app.context(ignore_context)?, new_task(cmdline))?;
                println!("Added and started {task}");
                return Ok(());
            }
            let report = app.writer.start(&cmdline.filter.ids, &cmdline.note_text())?;
            print_report("Started", &report)
        }
        Command::Stop(tokens) => {
            let cmdline = parse(&tokens)?;
            let report = app.writer.stop(&cmdline.filter.ids, &cmdline.note_text())?;
            print_report("Stopped", &report)
        }
        Command::Done(tokens) => {
            let cmdline = parse(&tokens)?;
            let report = app.writer.resolve(&cmdline.filter.ids, &cmdline.note_text())?;
            print_report("Resolved", &report)
        }
        Command::Modify(tokens) => {
            let cmdline = parse(&tokens)?;
            let patch = TaskPatch::from_filter(&cmdline.filter);
            let report = app.writer.modify(&cmdline.filter.ids, &patch)?;
            print_report("Modified", &report)
        }
        Command::Note(tokens) => {
            let cmdline = parse(&tokens)?;
            let report = app
                .writer
                .note(&cmdline.filter.ids, &cmdline.note_text(), &app.editor)?;
            print_report("Noted", &report)
        }
        Command::Edit { force, tokens } => edit(app, &tokens, force),
        Command::Context(tokens) => context(app, &tokens),

        Command::Undo => sync::run_undo(&app.writer),
        Command::Sync => sync::run_sync(&app.writer),
        Command::Git { args } => sync::run_git(app.writer.store().log(), &args),
    }
}

fn parse(tokens: &Tokens) -> Result<CmdLine> {
    CmdLine::parse(&tokens.tokens)
}

fn new_task(cmdline: CmdLine) -> NewTask {
    NewTask {
        summary: cmdline.text,
        attributes: cmdline.filter,
        note: cmdline.note,
    }
}

/// Load what `view` shows. Open views load every unresolved status and narrow
/// afterwards so ids match the ones commands resolve.
fn view_snapshot(app: &App, view: &View) -> Result<Snapshot> {
    let store = app.writer.store();
    Ok(match view {
        View::Next => store.load(&Status::NON_RESOLVED)?.with_statuses(&NEXT_STATUSES),
        View::Open => store.load(&Status::NON_RESOLVED)?,
        View::Only(status) => store.load(&Status::NON_RESOLVED)?.with_statuses(&[*status]),
        View::Resolved => store.load(&[Status::Resolved])?,
    })
}

fn query(app: &App, tokens: &Tokens, ignore_context: bool, view: &View) -> Result<(Filter, Snapshot)> {
    let cmdline = parse(tokens)?;
    let context = app.context(ignore_context)?;
    let filter = Filter::merge(&context, &cmdline.query());
    let snapshot = view_snapshot(app, view)?.apply(&filter);
    debug!(filter = %filter, matched = snapshot.len(), "Queried tasks");
    Ok((context, snapshot))
}

fn list(app: &App, tokens: &Tokens, ignore_context: bool, view: &View) -> Result<()> {
    let (context, snapshot) = query(app, tokens, ignore_context, view)?;
    if !context.is_empty() {
        println!("Active context: {context}");
    }
    if snapshot.is_empty() {
        println!("No matching tasks");
        return Ok(());
    }

    let mut tasks: Vec<&Task> = snapshot.iter().collect();
    let table = if matches!(view, View::Resolved) {
        render::sort_resolved(&mut tasks);
        render::resolved_table(&tasks)
    } else {
        render::sort_open(&mut tasks);
        render::task_table(&tasks)
    };
    print!("{table}");
    Ok(())
}

fn show_projects(app: &App, tokens: &Tokens, ignore_context: bool) -> Result<()> {
    let cmdline = parse(tokens)?;
    let filter = Filter::merge(&app.context(ignore_context)?, &cmdline.query());
    let snapshot = app.writer.store().load(&Status::ALL)?.apply(&filter);
    let projects = snapshot.projects();
    if projects.is_empty() {
        println!("No projects");
        return Ok(());
    }
    print!("{}", render::projects_table(&projects));
    Ok(())
}

fn show_tags(app: &App, tokens: &Tokens, ignore_context: bool) -> Result<()> {
    let (_, snapshot) = query(app, tokens, ignore_context, &View::Open)?;
    for tag in snapshot.tags() {
        println!("{tag}");
    }
    Ok(())
}

fn context(app: &App, tokens: &Tokens) -> Result<()> {
    if tokens.tokens.is_empty() {
        let current = app.context_file.load()?;
        if current.is_empty() {
            println!("No context set");
        } else {
            println!("Context: {current}");
        }
        return Ok(());
    }

    let filter = if tokens.tokens == ["none"] {
        Filter::default()
    } else {
        parse(tokens)?.query()
    };
    app.writer.set_context(&app.context_file, &filter)?;
    if filter.is_empty() {
        println!("Context cleared");
    } else {
        println!("Context set to {filter}");
    }
    Ok(())
}

fn edit(app: &App, tokens: &Tokens, force: bool) -> Result<()> {
    let cmdline = parse(tokens)?;
    let report = app.writer.edit(&cmdline.filter.ids, &app.editor, force)?;
    for (id, err) in report.failures() {
        if let Some(raw) = err.edited_buffer() {
            let path = save_recovery(raw)?;
            eprintln!("{id}: your edit was saved to {}", path.display());
        }
    }
    print_report("Edited", &report)
}

fn save_recovery(raw: &str) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("dstask-edit-")
        .suffix(".yml")
        .tempfile()
        .context("failed to create recovery file")?;
    file.write_all(raw.as_bytes())
        .context("failed to write recovery file")?;
    let (_, path) = file.keep().context("failed to keep recovery file")?;
    debug!(path = %path.display(), "Saved unparsed edit");
    Ok(path)
}

fn print_report(action: &str, report: &BatchReport) -> Result<()> {
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(task) => println!("{action} {task}"),
            Err(err) => eprintln!("{}: {err}", outcome.id),
        }
    }
    let failed = report.failures().count();
    if failed > 0 {
        bail!("{failed} of {} targets failed", report.outcomes.len());
    }
    Ok(())
}
