use anyhow::{Context, Result};
use log::LevelFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Location of the user's configuration file, relative to `$HOME`.
const USER_CONFIG: &str = ".config/pipeshell/config.toml";

/// Interpreter settings.
///
/// Every field has a default, so a config file only needs to name what it
/// changes:
///
/// ```toml
/// history_size = 500
/// log_level = "debug"
/// log_file = "/tmp/pipeshell.log"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum number of lines kept by the `history` log.
    pub history_size: usize,
    /// Longest accepted command line, in bytes; longer lines are truncated.
    pub max_line: usize,
    pub log_level: LevelFilter,
    /// Log into this file instead of standard error.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_size: crate::history::DEFAULT_CAPACITY,
            max_line: 1024,
            log_level: LevelFilter::Warn,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// With an explicit `path` the file must exist and parse. Without one,
    /// `~/.config/pipeshell/config.toml` is read when present; a broken user
    /// file is reported and the defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::load_user().unwrap_or_default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("can't read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn load_user() -> Option<Self> {
        let home = std::env::var_os("HOME")?;
        let path = Path::new(&home).join(USER_CONFIG);
        if !path.exists() {
            return None;
        }
        match Self::from_file(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("{}: {e:#}", crate::PROGRAM_NAME);
                None
            }
        }
    }
}
