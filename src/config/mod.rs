// src/config/mod.rs

//! Configuration loading and validation for smpdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate dispatcher settings, graph limits and DAG correctness
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    default_config_path, load_and_validate, load_from_path, parse_and_validate, parse_raw,
};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
