// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::dag::{BuildGraph, BuildStatus, build_graph};
use crate::engine::{BuildReport, BuildScheduler};
use crate::exec::BuilderRegistry;
use crate::types::Verdict;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading
/// - graph construction for the requested target
/// - the scheduler and its executor pool
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<Verdict> {
    let manifest_path = args.manifest_path();
    let manifest = load_and_validate(&manifest_path)
        .with_context(|| format!("loading manifest {}", manifest_path.display()))?;

    let registry = BuilderRegistry::with_defaults();
    let graph = build_graph(&manifest, &args.target, &registry)?;
    info!(
        target_module = %args.target,
        modules = graph.len(),
        "dependency graph ready"
    );

    if args.dry_run {
        print_build_order(&graph)?;
        return Ok(Verdict::Success);
    }

    let scheduler = BuildScheduler::new(args.session_options());
    let session = scheduler.prepare(graph);

    // Ctrl-C → cancel the session.
    {
        let handle = session.handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received, stopping builds");
            handle.shutdown();
        });
    }

    let report = session.run().await?;
    print_summary(&report)?;
    Ok(report.verdict)
}

/// Dry-run output: modules in the order they would be built.
fn print_build_order(graph: &BuildGraph) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "depbuild dry-run: {}", graph.target_node().module_name())?;
    for (i, module) in graph.build_order().iter().enumerate() {
        writeln!(out, "  {:>3}. {module}", i + 1)?;
    }
    debug!("dry-run complete (nothing built)");
    Ok(())
}

/// Final status of every node; failed nodes also show their detail.
fn print_summary(report: &BuildReport) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "build of {} finished: {}", report.target, report.verdict)?;
    for node in &report.nodes {
        writeln!(out, "  {:<8} {}", node.status.to_string(), node.module)?;
        if node.status == BuildStatus::Error {
            if let Some(detail) = node.detail.as_deref() {
                for line in detail.lines() {
                    writeln!(out, "           | {line}")?;
                }
            }
        }
    }
    Ok(())
}
