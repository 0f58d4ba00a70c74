// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::limits::MAX_TASKS_CEILING;
use crate::errors::{Result, SmpdagError};
use crate::types::Workload;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SmpdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.limits, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_limits(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.workload == Workload::Graph && cfg.task.is_empty() {
        return Err(SmpdagError::ConfigError(
            "graph workload needs at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    let c = &cfg.config;
    let checks = [
        ("cores", c.cores as u64),
        ("queue_depth", c.queue_depth as u64),
        ("tick_ms", c.tick_ms),
        ("cycles", c.cycles),
    ];
    for (name, value) in checks {
        if value == 0 {
            return Err(SmpdagError::ConfigError(format!(
                "[config].{name} must be >= 1 (got 0)"
            )));
        }
    }
    match c.worker_stack_kib {
        Some(0) => Err(SmpdagError::ConfigError(
            "[config].worker_stack_kib must be >= 1 when set".to_string(),
        )),
        Some(kib) if c.worker_stack_bytes().is_none() => Err(SmpdagError::ConfigError(format!(
            "[config].worker_stack_kib = {kib} does not fit in memory"
        ))),
        _ => Ok(()),
    }
}

fn validate_limits(cfg: &RawConfigFile) -> Result<()> {
    let limits = &cfg.limits;
    if limits.max_tasks == 0 || limits.max_deps == 0 {
        return Err(SmpdagError::ConfigError(
            "[limits].max_tasks and [limits].max_deps must be >= 1".to_string(),
        ));
    }
    if limits.max_tasks > MAX_TASKS_CEILING {
        return Err(SmpdagError::ConfigError(format!(
            "[limits].max_tasks must be <= {MAX_TASKS_CEILING} (got {})",
            limits.max_tasks
        )));
    }
    if cfg.task.len() > limits.max_tasks {
        return Err(SmpdagError::ConfigError(format!(
            "{} tasks configured but [limits].max_tasks is {}",
            cfg.task.len(),
            limits.max_tasks
        )));
    }
    for (name, task) in cfg.task.iter() {
        if task.after.len() > limits.max_deps {
            return Err(SmpdagError::ConfigError(format!(
                "task '{}' has {} dependencies but [limits].max_deps is {}",
                name,
                task.after.len(),
                limits.max_deps
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for (pos, dep) in task.after.iter().enumerate() {
            if !cfg.task.contains_key(dep) {
                return Err(SmpdagError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(SmpdagError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if task.after[..pos].contains(dep) {
                return Err(SmpdagError::ConfigError(format!(
                    "task '{}' lists dependency '{}' more than once",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task, so for
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(SmpdagError::DagCycle(format!(
                "cycle detected in task DAG involving task '{}'",
                node
            )))
        }
    }
}
