use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Host-level configuration read from ~/.stint/config.toml.
/// Everything the user tracks lives in the database; this file only
/// carries knobs that belong to the machine, not the journal.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Command used to show a desktop notification. Default: "notify-send".
    /// It is invoked as `<command> <title> <body>`.
    #[serde(default = "default_notification_command")]
    pub command: String,

    /// Command used to play the session-end sound, invoked with the
    /// sound name as its single argument. Default: none (sound skipped).
    #[serde(default)]
    pub sound_command: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        NotificationConfig {
            command: default_notification_command(),
            sound_command: None,
        }
    }
}

fn default_notification_command() -> String {
    "notify-send".to_string()
}

/// Returns the base stint config directory: ~/.stint/
pub fn base_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".stint"))
}

/// Returns the path to the `SQLite` database
pub fn db_path() -> Result<PathBuf> {
    Ok(base_dir()?.join("stint.db"))
}

/// Returns the path to the recoverable in-progress session draft
pub fn draft_path() -> Result<PathBuf> {
    Ok(base_dir()?.join("draft.json"))
}

/// Ensure all required directories exist
pub fn ensure_dirs() -> Result<()> {
    let base = base_dir()?;
    fs::create_dir_all(&base).context("failed to create ~/.stint/")?;
    Ok(())
}

/// Load config from ~/.stint/config.toml (or return defaults if it doesn't exist)
pub fn load() -> Result<Config> {
    let path = base_dir()?.join("config.toml");
    if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}
