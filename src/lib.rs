// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
mod sync;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::dag::ComputeGraph;
use crate::engine::{Producer, ProducerHandle, ProducerOptions};
use crate::errors::SmpdagError;
use crate::exec::DispatcherRuntime;
use crate::types::Workload;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - the compute graph
/// - the dispatcher (pinned per-core workers)
/// - the producer loop
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    debug!(path = %config_path.display(), "loading config");
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    apply_overrides(&mut cfg, &args)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let graph = Arc::new(ComputeGraph::from_config(&cfg).map_err(SmpdagError::from)?);
    let dispatcher = Arc::new(
        DispatcherRuntime::start_with(cfg.config.dispatch_options()).map_err(SmpdagError::from)?,
    );

    let options = ProducerOptions {
        tick: cfg.config.tick(),
        full_queue_behaviour: cfg.config.full_queue_behaviour,
        workload: cfg.config.workload,
    };
    let (producer, handle) = Producer::new(Arc::clone(&dispatcher), options);
    let producer_task = producer.spawn();

    // Ctrl-C → graceful shutdown.
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; shutting down");
            handle.shutdown();
        });
    }

    if cfg.config.workload == Workload::Graph {
        replay_graph(&handle, &graph, cfg.config.cycles).await?;
        handle.shutdown();
    } else {
        info!(cores = dispatcher.core_count(), "synthetic workload running; Ctrl-C to stop");
    }

    let totals = producer_task.await.context("producer task failed")?;

    let faults = dispatcher.faults();
    tokio::task::spawn_blocking(move || dispatcher.shutdown())
        .await
        .context("dispatcher shutdown failed")?;

    info!(
        dispatched = totals.dispatched,
        dropped = totals.dropped,
        faults,
        "smpdag finished"
    );
    Ok(())
}

/// Reset and run the graph `cycles` times, one cycle at a time.
async fn replay_graph(handle: &ProducerHandle, graph: &Arc<ComputeGraph>, cycles: u64) -> Result<()> {
    info!(
        nodes = graph.node_count(),
        roots = graph.ready_nodes().count(),
        cycles,
        "replaying compute graph"
    );

    for _ in 0..cycles {
        let report = match handle.run_cycle(graph).await {
            Ok(report) => report,
            Err(SmpdagError::ProducerStopped) => {
                info!("producer stopped; no further cycles");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if !report.is_complete() {
            warn!(
                cycle = report.cycle,
                completed = report.completed,
                nodes = report.nodes,
                dropped = report.dropped,
                "cycle abandoned; the graph cannot be replayed"
            );
            break;
        }
        if report.faulted > 0 {
            warn!(cycle = report.cycle, faulted = report.faulted, "cycle finished with faulted nodes");
        }
    }
    Ok(())
}

/// Apply CLI overrides on top of the validated file.
fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> Result<()> {
    if let Some(cores) = args.cores {
        if cores == 0 {
            return Err(SmpdagError::ConfigError("--cores must be >= 1".to_string()).into());
        }
        cfg.config.cores = cores;
    }
    if let Some(cycles) = args.cycles {
        if cycles == 0 {
            return Err(SmpdagError::ConfigError("--cycles must be >= 1".to_string()).into());
        }
        cfg.config.cycles = cycles;
    }
    if let Some(workload) = args.workload {
        if workload == Workload::Graph && cfg.task.is_empty() {
            return Err(SmpdagError::ConfigError(
                "graph workload needs at least one [task.<name>] section".to_string(),
            )
            .into());
        }
        cfg.config.workload = workload;
    }
    Ok(())
}

/// Simple dry-run output: print settings, tasks and their dependencies.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let graph = ComputeGraph::from_config(cfg).map_err(SmpdagError::from)?;
    let c = &cfg.config;

    println!("smpdag dry-run");
    println!("  config.cores = {}", c.cores);
    println!("  config.queue_depth = {}", c.queue_depth);
    println!("  config.tick_ms = {}", c.tick_ms);
    println!("  config.pin_workers = {}", c.pin_workers);
    println!("  config.full_queue_behaviour = {:?}", c.full_queue_behaviour);
    println!("  config.panic_policy = {:?}", c.panic_policy);
    println!("  config.workload = {:?}", c.workload);
    println!("  config.cycles = {}", c.cycles);
    println!(
        "  limits.max_tasks = {}, limits.max_deps = {}",
        cfg.limits.max_tasks, cfg.limits.max_deps
    );
    println!();

    println!("tasks ({}):", graph.node_count());
    for node in graph.nodes() {
        let label = graph.label_of(node).unwrap_or("?");
        println!("  - {label} {node}");
        if let Some(task) = cfg.task.get(label) {
            println!("      work_us: {}", task.work_us);
        }
        let deps: Vec<_> = graph
            .dependencies_of(node)
            .iter()
            .filter_map(|&d| graph.label_of(d))
            .collect();
        if deps.is_empty() {
            println!("      root");
        } else {
            println!("      after: {deps:?}");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
