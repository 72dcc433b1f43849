//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use config_loader::{validate, ConfigurationStack};

use crate::cli::ValidateArgs;
use crate::setup::load_configuration;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    layers: usize,
    route_count: usize,
    pass_count: usize,
    run_async: bool,
    enable_storage: bool,
    data_providers: Vec<String>,
    dispatchers: Vec<String>,
    end_point_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(configs = ?args.config.configs, "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_paths = args
        .config
        .configs
        .iter()
        .map(|path| path.display().to_string())
        .collect();

    let checked = load_configuration(&args.config.configs)
        .map_err(|e| e.to_string())
        .and_then(|stack| {
            let report = validate(&stack).map_err(|e| e.to_string())?;
            let summary = summarize(&stack).map_err(|e| e.to_string())?;
            Ok((report.warnings, summary))
        });

    match checked {
        Ok((warnings, summary)) => ValidationResult {
            valid: true,
            config_paths,
            error: None,
            warnings: if warnings.is_empty() {
                None
            } else {
                Some(warnings)
            },
            summary: Some(summary),
        },
        Err(error) => ValidationResult {
            valid: false,
            config_paths,
            error: Some(error),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(stack: &ConfigurationStack) -> Result<ConfigSummary, contracts::DistributorError> {
    let routes = stack.routes()?;
    let settings = stack.settings()?;
    Ok(ConfigSummary {
        layers: stack.len(),
        route_count: routes.len(),
        pass_count: routes.iter().map(|route| route.pass_count).sum(),
        run_async: settings.run_async,
        enable_storage: settings.enable_storage,
        data_providers: stack.data_provider_keywords(),
        dispatchers: stack
            .dispatchers()?
            .into_iter()
            .map(|dispatcher| dispatcher.name)
            .collect(),
        end_point_count: stack.end_points()?.len(),
    })
}

fn print_validation_result(result: &ValidationResult) {
    let paths = result.config_paths.join(", ");
    if result.valid {
        println!("✓ Configuration is valid: {}", paths);

        if let Some(ref summary) = result.summary {
            println!("\n  Layers: {}", summary.layers);
            println!("  Routes: {} ({} passes)", summary.route_count, summary.pass_count);
            println!("  Async: {}", summary.run_async);
            println!("  Storage: {}", summary.enable_storage);
            println!("  Data providers: {}", summary.data_providers.join(", "));
            println!("  Dispatchers: {}", summary.dispatchers.join(", "));
            println!("  End points: {}", summary.end_point_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", paths);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
