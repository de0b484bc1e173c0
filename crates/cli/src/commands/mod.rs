pub mod ask;
pub mod config_cmd;
pub mod seed;
pub mod serve;
pub mod templates;

use anyhow::Context;
use folio_config::AppConfig;
use std::path::{Path, PathBuf};

/// Load configuration from `path`, or from `~/.folio/config.toml`.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(p) => AppConfig::load_with_env(p),
        None => AppConfig::load(),
    };
    config.context("Could not load configuration")
}

/// The config file the CLI reads.
pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}
