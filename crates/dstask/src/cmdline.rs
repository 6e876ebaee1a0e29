//! Token grammar shared by every command: `+tag -tag project:x -project:x P1 12 words / note`.

use std::str::FromStr;

use anyhow::{Result, bail};
use dstask_core::{Filter, Priority};

const NOTE_SEPARATOR: &str = "/";
const PROJECT_PREFIX: &str = "project:";
const ANTI_PROJECT_PREFIX: &str = "-project:";

/// Parsed command-line tokens.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CmdLine {
    /// Ids and attribute criteria. `text` is left unset.
    pub filter: Filter,
    /// Remaining words, in order.
    pub text: String,
    /// Words after `/`.
    pub note: String,
}

impl CmdLine {
    /// Parse command tokens.
    ///
    /// Bare integers are ids only until the first ordinary word.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        let mut cmdline = Self::default();
        let mut words: Vec<&str> = Vec::new();
        let mut note: Vec<&str> = Vec::new();
        let mut in_note = false;

        for token in tokens.iter().map(AsRef::as_ref) {
            if in_note {
                note.push(token);
                continue;
            }
            if token == NOTE_SEPARATOR {
                in_note = true;
                continue;
            }
            if let Some(project) = token.strip_prefix(ANTI_PROJECT_PREFIX) {
                if project.is_empty() {
                    bail!("missing project name in {token:?}");
                }
                cmdline.filter.antiprojects.insert(project.to_owned());
            } else if let Some(project) = token.strip_prefix(PROJECT_PREFIX) {
                if project.is_empty() {
                    bail!("missing project name in {token:?}");
                }
                cmdline.filter.project = Some(project.to_owned());
            } else if let Some(tag) = token.strip_prefix('+').filter(|tag| !tag.is_empty()) {
                cmdline.filter.tags.insert(tag.to_owned());
            } else if let Some(tag) = token.strip_prefix('-').filter(|tag| !tag.is_empty()) {
                cmdline.filter.antitags.insert(tag.to_owned());
            } else if let Ok(priority) = Priority::from_str(token) {
                cmdline.filter.priority = Some(priority);
            } else if let Some(id) = words.is_empty().then(|| token.parse::<u32>().ok()).flatten() {
                cmdline.filter.ids.insert(id);
            } else {
                words.push(token);
            }
        }

        cmdline.text = words.join(" ");
        cmdline.note = note.join(" ");
        Ok(cmdline)
    }

    /// Filter for listings: the parsed criteria plus the text as a substring match.
    #[must_use]
    pub fn query(&self) -> Filter {
        let mut filter = self.filter.clone();
        if !self.text.is_empty() {
            filter.text = Some(self.text.clone());
        }
        filter
    }

    /// Text and note joined, for commands where both end up in the notes.
    #[must_use]
    pub fn note_text(&self) -> String {
        [self.text.as_str(), self.note.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
