//! Runtime settings for the `agora` binary.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;

/// Deserialised from `agora.toml` (or `--config`), overridden by `AGORA_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub store_path:        PathBuf,
  pub session_ttl_hours: i64,
  pub busy_timeout_ms:   u64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path:        PathBuf::from("~/.local/share/agora/agora.db"),
      session_ttl_hours: 24,
      busy_timeout_ms:   5_000,
    }
  }
}

impl Settings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("AGORA"))
      .build()
      .context("failed to read config file")?;

    let mut settings: Settings = settings
      .try_deserialize()
      .context("failed to deserialise Settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    Ok(settings)
  }

  pub fn session_ttl(&self) -> chrono::Duration {
    chrono::Duration::hours(self.session_ttl_hours)
  }

  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.busy_timeout_ms) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
