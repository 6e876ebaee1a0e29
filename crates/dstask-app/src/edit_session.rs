//! External editor round trips for notes and whole records.

use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use dstask_core::codec::{self, RECORD_EXTENSION};
use dstask_core::{Task, TaskError};
use tempfile::Builder;
use tracing::{debug, warn};

use crate::config::Config;
use crate::task_writer::TaskWriteError;

/// Editing attempts granted to an interactive user before giving up.
pub const DEFAULT_EDIT_ATTEMPTS: usize = 3;

const ERROR_HEADER: &str = "# dstask: ";

/// Something that lets a user change a text buffer.
pub trait Editor {
    /// Present `initial` for editing and return the saved text.
    ///
    /// `extension` hints the file type (`yml`, `md`).
    ///
    /// # Errors
    /// Returns an error if the editor cannot be started or exits unsuccessfully.
    fn edit(&self, initial: &str, extension: &str) -> Result<String>;
}

/// Runs the configured editor command on a temporary file.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    command: String,
    interactive: bool,
}

impl ExternalEditor {
    /// Editor running `command`; a non-interactive editor gets a null stdin.
    #[must_use]
    pub const fn new(command: String, interactive: bool) -> Self {
        Self { command, interactive }
    }

    /// Editor described by the process configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.editor.clone(), !config.fake_pty)
    }
}

impl Editor for ExternalEditor {
    fn edit(&self, initial: &str, extension: &str) -> Result<String> {
        let mut tempfile = Builder::new()
            .prefix("dstask-")
            .suffix(&format!(".{extension}"))
            .tempfile()
            .context("failed to create temporary file")?;
        tempfile
            .write_all(initial.as_bytes())
            .context("failed to write temporary file")?;
        tempfile.flush().context("failed to flush temporary file")?;

        let mut parts = shell_words::split(&self.command)
            .map_err(|err| anyhow!("cannot parse editor command {:?}: {err}", self.command))?;
        if parts.is_empty() {
            parts.push(self.command.clone());
        }
        let program = parts.remove(0);

        let mut command = Command::new(&program);
        command.args(&parts).arg(tempfile.path());
        if !self.interactive {
            command.stdin(Stdio::null());
        }
        debug!(%program, path = %tempfile.path().display(), "Launching editor");
        let status = command
            .status()
            .with_context(|| format!("failed to launch editor {program}"))?;
        if !status.success() {
            return Err(anyhow!("editor exited unsuccessfully ({status})"));
        }

        fs::read_to_string(tempfile.path()).context("failed to read edited file")
    }
}

/// A record that came back from the editor and parsed.
#[derive(Debug, Clone)]
pub struct EditedTask {
    /// Parsed task carrying the original identity.
    pub task: Task,
    /// Text the user saved, without error headers.
    pub raw: String,
}

/// One editing session with a bounded number of attempts.
pub struct EditSession<'a, E: ?Sized> {
    editor: &'a E,
    attempts: usize,
}

impl<'a, E> EditSession<'a, E>
where
    E: Editor + ?Sized,
{
    /// Session allowing up to `attempts` tries (at least one).
    pub fn new(editor: &'a E, attempts: usize) -> Self {
        Self {
            editor,
            attempts: attempts.max(1),
        }
    }

    /// Round-trip a whole record through the editor.
    ///
    /// When the buffer does not parse, the editor is reopened on the user's text
    /// with the parse error prepended as comments. Saving that buffer unchanged
    /// gives up early. After the last attempt the error carries the raw buffer.
    ///
    /// # Errors
    /// Returns [`TaskError::EditParse`] when every attempt fails to parse, or an
    /// editor error if the editor cannot run.
    pub fn edit_task(&self, task: &Task) -> Result<EditedTask, TaskWriteError> {
        let mut buffer = codec::encode(task)?;
        let mut attempt = 1;
        loop {
            let saved = self
                .editor
                .edit(&buffer, RECORD_EXTENSION)
                .map_err(TaskWriteError::Editor)?;
            let gave_up = attempt > 1 && saved == buffer;
            let text = strip_error_header(&saved);
            match codec::decode_edited(task, &text) {
                Ok(edited) => {
                    return Ok(EditedTask {
                        task: edited,
                        raw: text,
                    });
                }
                Err(TaskError::EditParse { raw, source }) if attempt < self.attempts && !gave_up => {
                    warn!(task = %task, attempt, error = %source, "Edited record did not parse");
                    buffer = with_error_header(&source.to_string(), &raw);
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Edit free-form notes; any text is accepted.
    ///
    /// # Errors
    /// Returns an editor error if the editor cannot run.
    pub fn edit_notes(&self, notes: &str) -> Result<String, TaskWriteError> {
        let edited = self.editor.edit(notes, "md").map_err(TaskWriteError::Editor)?;
        Ok(edited.trim_end().to_owned())
    }
}

fn with_error_header(error: &str, body: &str) -> String {
    let mut out = String::new();
    for line in error.lines() {
        out.push_str(ERROR_HEADER);
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(ERROR_HEADER);
    out.push_str("fix the record below, or save it unchanged to give up\n");
    out.push_str(body);
    out
}

fn strip_error_header(text: &str) -> String {
    text.lines()
        .skip_while(|line| line.starts_with(ERROR_HEADER))
        .map(|line| format!("{line}\n"))
        .collect()
}
