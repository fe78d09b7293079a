//! Configuration discovery for podsync.

use anyhow::{Context, Result};
use pod_store::Config;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "podsync.toml";

/// Load the configuration.
///
/// An explicit path must exist. Without one, `./podsync.toml` is tried,
/// then the per-user config directory; if neither exists the defaults
/// apply.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::from_file(path).context("Failed to load configuration");
    }

    match discover() {
        Some(path) => Config::from_file(&path).context("Failed to load configuration"),
        None => Ok(Config::default()),
    }
}

fn discover() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    let user = default_config_dir()?.join(CONFIG_FILE);
    user.is_file().then_some(user)
}

/// Get the per-user configuration directory for podsync.
fn default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "podsync", "podsync")
        .map(|dirs| dirs.config_dir().to_path_buf())
}
