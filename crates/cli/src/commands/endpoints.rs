//! `endpoints` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;

use distributor::EndPointStorage;

use crate::cli::EndpointsArgs;
use crate::setup::load_configuration;

#[derive(Serialize)]
struct EndPointSummary {
    name: String,
    enabled: bool,
    disable_context: bool,
    allow_context_override: bool,
}

/// Execute the `endpoints` command
pub fn run_end_points(args: &EndpointsArgs) -> Result<()> {
    let configuration = load_configuration(&args.config.configs)?;
    let storage = EndPointStorage::from_configuration(&configuration)
        .context("Invalid end point configuration")?;

    let summaries: Vec<EndPointSummary> = storage
        .all()
        .into_iter()
        .filter(|end_point| args.all || end_point.enabled)
        .map(|end_point| EndPointSummary {
            name: end_point.name,
            enabled: end_point.enabled,
            disable_context: end_point.disable_context,
            allow_context_override: end_point.allow_context_override,
        })
        .collect();

    if args.json {
        let json = serde_json::to_string_pretty(&summaries)
            .context("Failed to serialize end points")?;
        println!("{}", json);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No end points configured");
        return Ok(());
    }

    println!("End points ({}):", summaries.len());
    for summary in &summaries {
        let mut flags = Vec::new();
        if !summary.enabled {
            flags.push("disabled");
        }
        if summary.disable_context {
            flags.push("no context");
        }
        if summary.allow_context_override {
            flags.push("context override");
        }
        if flags.is_empty() {
            println!("  - {}", summary.name);
        } else {
            println!("  - {} ({})", summary.name, flags.join(", "));
        }
    }
    Ok(())
}
