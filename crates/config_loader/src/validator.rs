//! Configuration validation
//!
//! Rules:
//! - route ids and route types non-empty
//! - every pass slice of every route deserializes
//! - referenced data mapper groups exist
//! - referenced conditions exist (gates and nested conditions)
//! - data provider configurations deserialize
//! - end point names valid and unique
//!
//! Combinations that run but are probably not intended are reported as
//! warnings instead of errors.

use std::collections::HashSet;

use contracts::{ConfigurationStack, DistributorError};
use serde_json::Value;
use validator::Validate;

/// Non fatal findings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Validate a configuration stack
///
/// Returns the first error encountered, or the collected warnings.
pub fn validate(stack: &ConfigurationStack) -> Result<ValidationReport, DistributorError> {
    let mut report = ValidationReport::default();
    validate_settings(stack, &mut report)?;
    validate_routes(stack, &mut report)?;
    validate_conditions(stack)?;
    validate_data_providers(stack)?;
    validate_end_points(stack)?;
    Ok(report)
}

fn validate_settings(
    stack: &ConfigurationStack,
    report: &mut ValidationReport,
) -> Result<(), DistributorError> {
    let settings = stack.settings()?;
    if settings.run_async && !settings.enable_storage {
        report.warn(
            "distributor.async is set while distributor.enableStorage is off; \
             deferred jobs are stored on the durable queue anyway",
        );
    }
    Ok(())
}

fn validate_routes(
    stack: &ConfigurationStack,
    report: &mut ValidationReport,
) -> Result<(), DistributorError> {
    let settings = stack.settings()?;
    for route in stack.routes()? {
        let field = format!("distributor.routes.{}", route.route_id);
        if route.route_id.trim().is_empty() {
            return Err(DistributorError::config_validation(
                "distributor.routes",
                "route id cannot be empty",
            ));
        }
        if route.keyword.trim().is_empty() {
            return Err(DistributorError::config_validation(
                format!("{field}.type"),
                "route type cannot be empty",
            ));
        }

        for pass in route.passes() {
            let config = stack.route_config(&route.route_id, pass)?;
            let resolved = settings.for_route(&config);
            let overridden = config.run_async.is_some() || config.enable_storage.is_some();
            if overridden && resolved.run_async && !resolved.enable_storage {
                report.warn(format!(
                    "{field} (pass {pass}) is async with storage off; \
                     its jobs are stored on the durable queue anyway"
                ));
            }
            if !config.enabled {
                continue;
            }
            if config.data.is_empty() {
                report.warn(format!(
                    "{field} (pass {pass}) is enabled but has no data mapper group"
                ));
            } else if stack.data_mapper_group(&config.data).is_none() {
                return Err(DistributorError::config_validation(
                    format!("{field}.config.data"),
                    format!("data mapper group '{}' not found", config.data),
                ));
            }
            if let Some(gate) = config.gate_condition() {
                check_condition_references(stack, gate, &format!("{field}.config.gate"))?;
            }
        }
    }
    Ok(())
}

fn validate_conditions(stack: &ConfigurationStack) -> Result<(), DistributorError> {
    let Some(Value::Object(conditions)) = stack.get(&["dataProcessing", "conditions"]) else {
        return Ok(());
    };
    for (condition_id, condition) in &conditions {
        check_condition_references(
            stack,
            condition,
            &format!("dataProcessing.conditions.{condition_id}"),
        )?;
    }
    Ok(())
}

/// Walk a condition tree and check every `reference` resolves
fn check_condition_references(
    stack: &ConfigurationStack,
    condition: &Value,
    field: &str,
) -> Result<(), DistributorError> {
    match condition {
        Value::Object(map) => {
            if map.get("type").and_then(Value::as_str) == Some("reference") {
                let id = map.get("conditionId").and_then(Value::as_str).unwrap_or_default();
                if stack.condition(id).is_none() {
                    return Err(DistributorError::config_validation(
                        field,
                        format!("referenced condition '{id}' not found"),
                    ));
                }
            }
            for (key, nested) in map {
                if key == "condition" || key == "conditions" {
                    check_condition_references(stack, nested, field)?;
                }
            }
            Ok(())
        }
        Value::Array(items) => items
            .iter()
            .try_for_each(|item| check_condition_references(stack, item, field)),
        _ => Ok(()),
    }
}

fn validate_data_providers(stack: &ConfigurationStack) -> Result<(), DistributorError> {
    for keyword in stack.data_provider_keywords() {
        stack.data_provider_config(&keyword)?;
    }
    Ok(())
}

fn validate_end_points(stack: &ConfigurationStack) -> Result<(), DistributorError> {
    let mut seen = HashSet::new();
    for (idx, end_point) in stack.end_points()?.iter().enumerate() {
        end_point.validate().map_err(|e| {
            DistributorError::config_validation(format!("endpoints[{idx}]"), e.to_string())
        })?;
        if !seen.insert(end_point.name.clone()) {
            return Err(DistributorError::config_validation(
                format!("endpoints[name={}]", end_point.name),
                "duplicate end point name",
            ));
        }
    }
    Ok(())
}
