// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Environment variable that overrides the default config location.
pub const CONFIG_ENV: &str = "SMPDAG_CONFIG";

/// Read and deserialize a config file without semantic checks.
///
/// Use [`load_and_validate`] unless you want to inspect or patch the raw
/// file before validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let config = parse_raw(&contents)?;
    debug!(
        path = %path.display(),
        tasks = config.task.len(),
        workload = ?config.config.workload,
        "config parsed"
    );
    Ok(config)
}

/// Deserialize TOML text. Defaults are filled in by serde.
pub fn parse_raw(contents: &str) -> Result<RawConfigFile> {
    Ok(toml::from_str(contents)?)
}

/// Parse and validate TOML text in one go.
pub fn parse_and_validate(contents: &str) -> Result<ConfigFile> {
    ConfigFile::try_from(parse_raw(contents)?)
}

/// Load a config file and validate dispatcher settings, graph limits,
/// `after` references and acyclicity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_path(path)?)
}

/// `$SMPDAG_CONFIG` if set and non-empty, else `Smpdag.toml` in the
/// current directory.
pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Smpdag.toml"))
}
