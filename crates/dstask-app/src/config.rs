//! Process and repository configuration.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

const REPO_CONFIG_FILE: &str = ".dstask.toml";
const DEFAULT_REPO: &str = "~/.dstask";
const DEFAULT_CONTEXT_FILE: &str = "~/.cache/dstask/context";
const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_EDITOR: &str = "vi";

/// Process-wide settings resolved once at start-up and passed to constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Work tree holding task records.
    pub repo_dir: PathBuf,
    /// File holding the persisted context filter.
    pub context_file: PathBuf,
    /// Run the editor without an interactive terminal and never retry failed edits.
    pub fake_pty: bool,
    /// Editor command line, split with shell quoting rules.
    pub editor: String,
}

impl Config {
    /// Resolve settings from `DSTASK_*` environment variables.
    ///
    /// # Errors
    /// Returns an error when a default path is needed but the home directory is unknown.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok(), dirs::home_dir())
    }

    /// Resolve settings from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error when a path starts with `~` but `home` is `None`.
    pub fn from_lookup<F>(lookup: F, home: Option<PathBuf>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let repo_dir = non_empty("DSTASK_GIT_REPO").unwrap_or_else(|| DEFAULT_REPO.to_owned());
        let context_file =
            non_empty("DSTASK_CONTEXT_FILE").unwrap_or_else(|| DEFAULT_CONTEXT_FILE.to_owned());
        let editor = non_empty("DSTASK_EDITOR")
            .or_else(|| non_empty("VISUAL"))
            .or_else(|| non_empty("EDITOR"))
            .unwrap_or_else(|| DEFAULT_EDITOR.to_owned());

        Ok(Self {
            repo_dir: expand_home(&repo_dir, home.as_deref())?,
            context_file: expand_home(&context_file, home.as_deref())?,
            fake_pty: non_empty("DSTASK_FAKE_PTY")
                .map(|value| parse_flag("DSTASK_FAKE_PTY", &value))
                .transpose()?
                .unwrap_or(false),
            editor,
        })
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{name} must be a boolean, got {other:?}")),
    }
}

fn expand_home(raw: &str, home: Option<&Path>) -> Result<PathBuf> {
    let Some(rest) = raw.strip_prefix('~') else {
        return Ok(PathBuf::from(raw));
    };
    let home = home.ok_or_else(|| anyhow!("cannot expand {raw}: home directory is unknown"))?;
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        Ok(home.to_path_buf())
    } else {
        Ok(home.join(rest))
    }
}

/// Settings shared by every replica, loaded from `.dstask.toml` in the task repository.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct RepoConfig {
    /// `[sync]` section.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl RepoConfig {
    /// Load configuration from the task repository work tree.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_workdir(workdir: impl AsRef<Path>) -> Result<Self> {
        let config_path = workdir.as_ref().join(REPO_CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        Ok(config)
    }
}

/// Remote used by `sync`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    /// Remote name, `origin` by default.
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Branch to pull and push; the checked-out branch when unset.
    #[serde(default)]
    pub branch: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            branch: None,
        }
    }
}

fn default_remote() -> String {
    DEFAULT_REMOTE.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_live_under_home() {
        let config = Config::from_lookup(lookup(&[]), Some(PathBuf::from("/home/u")))
            .unwrap_or_else(|err| panic!("config: {err}"));
        assert_eq!(config.repo_dir, PathBuf::from("/home/u/.dstask"));
        assert_eq!(config.context_file, PathBuf::from("/home/u/.cache/dstask/context"));
        assert!(!config.fake_pty);
        assert_eq!(config.editor, "vi");
    }

    #[test]
    fn environment_overrides_defaults() {
        let vars = lookup(&[
            ("DSTASK_GIT_REPO", "/srv/tasks"),
            ("DSTASK_CONTEXT_FILE", "~/ctx"),
            ("DSTASK_FAKE_PTY", "1"),
            ("EDITOR", "nano"),
            ("VISUAL", "code --wait"),
        ]);
        let config = Config::from_lookup(vars, Some(PathBuf::from("/home/u")))
            .unwrap_or_else(|err| panic!("config: {err}"));
        assert_eq!(config.repo_dir, PathBuf::from("/srv/tasks"));
        assert_eq!(config.context_file, PathBuf::from("/home/u/ctx"));
        assert!(config.fake_pty);
        assert_eq!(config.editor, "code --wait");
    }

    #[test]
    fn fake_pty_is_parsed_as_a_boolean() {
        let home = Some(PathBuf::from("/home/u"));
        for (value, expected) in [("1", true), ("TRUE", true), ("on", true), ("0", false), ("false", false), ("no", false)] {
            let config = Config::from_lookup(lookup(&[("DSTASK_FAKE_PTY", value)]), home.clone())
                .unwrap_or_else(|err| panic!("config: {err}"));
            assert_eq!(config.fake_pty, expected, "DSTASK_FAKE_PTY={value}");
        }
        assert!(Config::from_lookup(lookup(&[("DSTASK_FAKE_PTY", "maybe")]), home).is_err());
    }

    #[test]
    fn missing_home_is_an_error_only_when_needed() {
        assert!(Config::from_lookup(lookup(&[]), None).is_err());
        let vars = lookup(&[("DSTASK_GIT_REPO", "/a"), ("DSTASK_CONTEXT_FILE", "/b")]);
        assert!(Config::from_lookup(vars, None).is_ok());
    }

    #[test]
    fn repo_config_defaults_without_file() {
        let dir = tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let config = RepoConfig::from_workdir(dir.path()).unwrap_or_else(|err| panic!("load: {err}"));
        assert_eq!(config.sync.remote, "origin");
        assert!(config.sync.branch.is_none());
    }

    #[test]
    fn repo_config_reads_sync_section() {
        let dir = tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        fs::write(
            dir.path().join(REPO_CONFIG_FILE),
            "[sync]\nremote = \"backup\"\nbranch = \"main\"\n",
        )
        .unwrap_or_else(|err| panic!("write: {err}"));
        let config = RepoConfig::from_workdir(dir.path()).unwrap_or_else(|err| panic!("load: {err}"));
        assert_eq!(config.sync.remote, "backup");
        assert_eq!(config.sync.branch.as_deref(), Some("main"));
    }

    #[test]
    fn repo_config_reports_parse_errors() {
        let dir = tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
        fs::write(dir.path().join(REPO_CONFIG_FILE), "[sync\n")
            .unwrap_or_else(|err| panic!("write: {err}"));
        assert!(RepoConfig::from_workdir(dir.path()).is_err());
    }
}
