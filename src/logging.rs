// src/logging.rs

//! Logging setup for `smpdag` using `tracing` + `tracing-subscriber`.
//!
//! Filter selection, first match wins:
//! 1. `--log-level` CLI flag, applied to every target
//! 2. `SMPDAG_LOG`, in full `EnvFilter` syntax (`info`, `smpdag::exec=trace`)
//! 3. `info`
//!
//! Lines go to stderr and carry the thread name, so each one shows which
//! `smpdag-core-<i>` worker (or the producer runtime) emitted it. The
//! subscriber serializes writes, which keeps worker lines from interleaving.

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV: &str = "SMPDAG_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = select_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

fn select_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(directive(level)));
    }
    match env.map(str::trim).filter(|s| !s.is_empty()) {
        Some(spec) => EnvFilter::try_new(spec)
            .with_context(|| format!("invalid {LOG_ENV} value: {spec:?}")),
        None => Ok(EnvFilter::new("info")),
    }
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_wins_over_environment() {
        let filter = select_filter(Some(LogLevel::Trace), Some("error")).unwrap();
        assert_eq!(filter.to_string(), "trace");
    }

    #[test]
    fn environment_accepts_per_target_directives() {
        let filter = select_filter(None, Some(" smpdag::exec=debug ")).unwrap();
        assert_eq!(filter.to_string(), "smpdag::exec=debug");
        assert_eq!(select_filter(None, Some("")).unwrap().to_string(), "info");
        assert!(select_filter(None, Some("smpdag=[")).is_err());
    }
}
