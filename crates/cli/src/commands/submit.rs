//! `submit` command implementation.

use anyhow::{Context as _, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use contracts::{Context, Data};
use distributor::{EndPointStorage, SubmissionHandler};
use observability::DistributionStats;

use crate::cli::SubmitArgs;
use crate::error::CliError;
use crate::setup::{build_dispatchers, build_distributor, load_configuration, print_dispatcher_metrics};

/// Execute the `submit` command
pub async fn run_submit(args: &SubmitArgs) -> Result<()> {
    let configuration = load_configuration(&args.config.configs)?;
    let data = read_data(&args.data)?;
    let context: Context = args.context.iter().cloned().collect();

    info!(
        fields = data.len(),
        context = context.len(),
        end_point = ?args.end_point,
        "Submission loaded"
    );

    let dispatchers = build_dispatchers(&configuration).await?;
    let distributor = build_distributor(&dispatchers, &args.queue_dir).await?;
    let end_points = EndPointStorage::from_configuration(&configuration)?;
    let handler = SubmissionHandler::new(Arc::new(distributor), end_points)
        .with_base_configuration(configuration.clone());

    let jobs = match &args.end_point {
        Some(name) => handler
            .submit_to_end_point_by_name(name, data, context)
            .await
            .with_context(|| format!("Submission to end point '{name}' failed"))?,
        None => handler
            .submit_with_context(configuration, data, context)
            .await
            .context("Submission failed")?,
    };

    let mut stats = DistributionStats::new();
    for job in &jobs {
        stats.update(job);
    }

    println!();
    print!("{}", stats.summary());
    print_dispatcher_metrics(&dispatchers);

    info!(jobs = jobs.len(), "Submission distributed");
    Ok(())
}

/// Read a JSON object of plain field values
fn read_data(path: &Path) -> Result<Data, CliError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| CliError::invalid_data(path.display().to_string(), e.to_string()))?;
    let plain: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| CliError::invalid_data(path.display().to_string(), e.to_string()))?;
    queue_data::data_from_plain(&plain)
        .map_err(|e| CliError::invalid_data(path.display().to_string(), e.to_string()))
}
