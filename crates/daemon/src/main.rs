use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};

use herald_core::{JobRecord, JobState, Origin};
use herald_daemon::announce::AnnounceReporter;
use herald_daemon::options::Options;
use herald_daemon::watch::spawn_config_watcher;
use herald_dispatch::{DispatcherOptions, DispatcherSet, EnableAll, register_dispatcher_with};
use herald_source::InMemoryJobSource;

#[tokio::main]
async fn main() {
    herald_observability::init();

    if let Err(err) = run().await {
        error!(error = %err, "setup failed");
        std::process::exit(1);
    }

    info!("ended gracefully");
}

async fn run() -> anyhow::Result<()> {
    let options = Options::from_env().context("invalid options")?;
    options.validate()?;

    let source = Arc::new(InMemoryJobSource::new());
    let mut set = DispatcherSet::new();

    if options.announce_workers > 0 {
        let mut dispatcher_options = DispatcherOptions::new(options.announce_workers)
            .with_backoff(options.backoff_base, options.backoff_max);
        if let Some(agent) = &options.report_agent {
            dispatcher_options = dispatcher_options.with_agent_filter(agent.clone());
        }

        let handle = register_dispatcher_with(
            source.clone(),
            Arc::new(AnnounceReporter::new(options.dry_run)),
            dispatcher_options,
            Arc::new(EnableAll),
        )?;
        set.register(handle);
    }

    set.ensure_any()?;

    // With no config to watch, the sender must stay alive or `recv` would
    // resolve immediately and end the process.
    let (restart_tx, mut restart_rx) = tokio::sync::mpsc::channel(1);
    let _restart_tx = match options.config_path.clone() {
        Some(path) => {
            spawn_config_watcher(path, restart_tx);
            None
        }
        None => Some(restart_tx),
    };

    if options.smoke {
        run_smoke(&source).await?;
    } else {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("interrupt received"),
            _ = restart_rx.recv() => info!("restarting on configuration change"),
        }
    }

    // Joining worker threads blocks; the runtime is about to exit anyway.
    let final_stats = tokio::task::spawn_blocking(move || set.shutdown_all())
        .await
        .context("shutdown join failed")?;

    for (reporter, stats) in final_stats {
        info!(
            reporter = %reporter,
            delivered = stats.delivered,
            requeued = stats.requeued,
            dropped = stats.dropped,
            "final delivery counts"
        );
    }

    Ok(())
}

/// Seed a few jobs, drive them to completion, and give the announce
/// reporter a moment to deliver. Exercises the full pipeline end to end.
async fn run_smoke(source: &Arc<InMemoryJobSource>) -> anyhow::Result<()> {
    info!("smoke mode: seeding demo jobs");

    let outcomes = [JobState::Success, JobState::Failure, JobState::Aborted];
    for (i, outcome) in outcomes.iter().enumerate() {
        let record = JobRecord::new(
            format!("smoke-job-{i}"),
            Origin::new("herald", "smoke", "kubernetes"),
        );
        let id = source.create(record)?;
        source.transition(id, JobState::Running)?;
        source.transition(id, *outcome)?;
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
