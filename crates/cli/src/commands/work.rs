//! `work` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use observability::DistributionStats;

use crate::cli::WorkArgs;
use crate::setup::{build_dispatchers, build_distributor, load_configuration, print_dispatcher_metrics};

/// Execute the `work` command: one sweep over the durable queue
pub async fn run_work(args: &WorkArgs) -> Result<()> {
    let configuration = load_configuration(&args.config.configs)?;
    let dispatchers = build_dispatchers(&configuration).await?;
    let distributor = build_distributor(&dispatchers, &args.queue_dir).await?;

    info!(
        queue_dir = %args.queue_dir.display(),
        limit = args.limit,
        "Processing deferred jobs"
    );

    let jobs = distributor
        .process_queue(args.limit)
        .await
        .context("Queue sweep failed")?;

    let mut stats = DistributionStats::new();
    for job in &jobs {
        stats.update(job);
    }

    println!();
    print!("{}", stats.summary());
    print_dispatcher_metrics(&dispatchers);

    if let Some(seconds) = args.prune_after {
        let removed = distributor
            .durable_queue()
            .remove_finished(Duration::from_secs(seconds))
            .await
            .context("Pruning finished jobs failed")?;
        println!("Pruned finished jobs: {removed}");
    }

    info!(jobs = jobs.len(), "Queue sweep finished");
    Ok(())
}
