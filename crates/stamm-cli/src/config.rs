//! Settings from `stamm.toml` layered under `STAMM_*` environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub store_path: PathBuf,
  pub geocode:    GeocodeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeConfig {
  pub endpoint:     String,
  pub user_agent:   String,
  pub interval_ms:  u64,
  pub timeout_secs: u64,
}

impl GeocodeConfig {
  pub fn interval(&self) -> Duration { Duration::from_millis(self.interval_ms) }

  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

impl Settings {
  /// Read the optional file at `path`, then the environment. Nested keys use
  /// a double underscore, e.g. `STAMM_GEOCODE__INTERVAL_MS`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let user_agent = format!("stamm/{} (genealogy research tool)", env!("CARGO_PKG_VERSION"));
    let settings = config::Config::builder()
      .set_default("store_path", "data/stamm.db")?
      .set_default("geocode.endpoint", "https://nominatim.openstreetmap.org/search")?
      .set_default("geocode.user_agent", user_agent)?
      .set_default("geocode.interval_ms", 1100)?
      .set_default("geocode.timeout_secs", 10)?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("STAMM").separator("__"))
      .build()
      .with_context(|| format!("failed to read config from {}", path.display()))?;

    let mut parsed: Settings = settings.try_deserialize().context("failed to deserialise settings")?;
    parsed.store_path = expand_tilde(&parsed.store_path);
    Ok(parsed)
  }
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
