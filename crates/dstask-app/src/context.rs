//! Persisted context filter, stored as JSON outside the task repository.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dstask_core::Filter;
use tracing::debug;

/// File-backed storage for the current context.
#[derive(Debug, Clone)]
pub struct ContextFile {
    path: PathBuf,
}

impl ContextFile {
    /// Create a handle for the context stored at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the stored context; a missing file means no context.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Filter> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Filter::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Filter::default());
        }
        let filter = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse context {}", self.path.display()))?;
        Ok(filter)
    }

    /// Replace the stored context, creating parent directories as needed.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, filter: &Filter) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(filter).context("failed to encode context")?;
        fs::write(&self.path, json).with_context(|| format!("failed to write {}", self.path.display()))?;
        debug!(context = %filter, "Saved context");
        Ok(())
    }
}
