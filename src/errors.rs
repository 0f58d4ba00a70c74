// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::dag::GraphError;
use crate::exec::DispatchError;

#[derive(Error, Debug)]
pub enum SmpdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Dispatcher error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("producer has stopped")]
    ProducerStopped,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SmpdagError>;
