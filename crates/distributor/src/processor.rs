//! Built-in condition evaluator and data mapper
//!
//! Conditions are JSON objects tagged by `type`:
//!
//! | type            | keys                    | true when                                  |
//! |-----------------|-------------------------|--------------------------------------------|
//! | `true`/`false`  |                         | constant                                   |
//! | `equals`        | `field`, `value`        | field (or any multi item) equals `value`   |
//! | `notEmpty`      | `field`                 | field present and not empty                |
//! | `contextEquals` | `key`, `value`          | context entry equals `value`               |
//! | `and` / `or`    | `conditions`            | all / any nested condition holds           |
//! | `not`           | `condition`             | nested condition does not hold             |
//! | `reference`     | `conditionId`           | named condition in `dataProcessing.conditions` holds |
//!
//! Booleans and the strings `"true"` / `"false"` are accepted as constants.

use serde_json::{Map, Value};
use tracing::trace;

use contracts::{
    ConditionEvaluator, Data, DataProcessor, DistributorError, FieldValue, ProcessorContext,
};

/// Maximum nesting of `reference` conditions
const MAX_REFERENCE_DEPTH: usize = 32;

/// Condition evaluator and mapper-group engine shipped with the distributor
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleDataProcessor;

impl SimpleDataProcessor {
    pub fn new() -> Self {
        Self
    }

    fn eval(
        &self,
        condition: &Value,
        context: &ProcessorContext<'_>,
        depth: usize,
    ) -> Result<bool, DistributorError> {
        let condition = match condition {
            Value::Bool(b) => return Ok(*b),
            Value::String(s) if s == "true" => return Ok(true),
            Value::String(s) if s == "false" => return Ok(false),
            Value::Object(map) => map,
            other => {
                return Err(DistributorError::data_processing(format!(
                    "invalid condition {other}"
                )))
            }
        };

        let kind = condition
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DistributorError::data_processing("condition without type"))?;

        match kind {
            "true" => Ok(true),
            "false" => Ok(false),
            "equals" => {
                let field = required_str(condition, kind, "field")?;
                let expected = plain_str(condition.get("value"));
                Ok(match context.data.get(field) {
                    Some(value) => field_matches(value, &expected),
                    None => expected.is_empty(),
                })
            }
            "notEmpty" => {
                let field = required_str(condition, kind, "field")?;
                Ok(context.data.get(field).is_some_and(|value| !value.is_empty()))
            }
            "contextEquals" => {
                let key = required_str(condition, kind, "key")?;
                let expected = plain_str(condition.get("value"));
                Ok(context
                    .context
                    .get(key)
                    .is_some_and(|value| plain_str(Some(value)) == expected))
            }
            "and" => {
                for nested in nested_list(condition, kind)? {
                    if !self.eval(nested, context, depth)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            "or" => {
                for nested in nested_list(condition, kind)? {
                    if self.eval(nested, context, depth)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            "not" => {
                let nested = condition.get("condition").ok_or_else(|| {
                    DistributorError::data_processing("condition \"not\" requires \"condition\"")
                })?;
                Ok(!self.eval(nested, context, depth)?)
            }
            "reference" => {
                let id = required_str(condition, kind, "conditionId")?;
                if depth >= MAX_REFERENCE_DEPTH {
                    return Err(DistributorError::data_processing(format!(
                        "condition reference \"{id}\" nested too deeply"
                    )));
                }
                let referenced = context.configuration.condition(id).ok_or_else(|| {
                    DistributorError::data_processing(format!("condition \"{id}\" not found"))
                })?;
                trace!(condition_id = id, "Resolving condition reference");
                self.eval(&referenced, context, depth + 1)
            }
            other => Err(DistributorError::data_processing(format!(
                "unknown condition type \"{other}\""
            ))),
        }
    }
}

impl ConditionEvaluator for SimpleDataProcessor {
    fn evaluate(
        &self,
        condition: &Value,
        context: &ProcessorContext<'_>,
    ) -> Result<bool, DistributorError> {
        self.eval(condition, context, 0)
    }
}

impl DataProcessor for SimpleDataProcessor {
    /// `passthroughFields` copies every field, then `fields` entries are
    /// written on top (`{field}` copies a source field, `{constant}` a literal)
    fn apply_mapper_group(
        &self,
        group: &Value,
        context: &ProcessorContext<'_>,
    ) -> Result<Data, DistributorError> {
        let group = group.as_object().ok_or_else(|| {
            DistributorError::data_processing(format!("data mapper group must be a table, got {group}"))
        })?;

        let mut output = Data::new();

        if group.get("passthroughFields").and_then(Value::as_bool).unwrap_or(false) {
            for (name, value) in context.data.iter() {
                output.insert(name.clone(), value.clone());
            }
        }

        match group.get("fields") {
            None | Some(Value::Null) => {}
            Some(Value::Object(fields)) => {
                for (out_field, mapping) in fields {
                    if let Some(value) = map_field(out_field, mapping, context.data)? {
                        output.insert(out_field.clone(), value);
                    }
                }
            }
            Some(other) => {
                return Err(DistributorError::data_processing(format!(
                    "data mapper fields must be a table, got {other}"
                )))
            }
        }

        Ok(output)
    }
}

/// Resolve one output field; a missing source field produces nothing
fn map_field(
    out_field: &str,
    mapping: &Value,
    data: &Data,
) -> Result<Option<FieldValue>, DistributorError> {
    match mapping {
        // shorthand: `out = "sourceField"`
        Value::String(source) => Ok(data.get(source).cloned()),
        Value::Object(map) => {
            if let Some(constant) = map.get("constant") {
                return Ok(Some(FieldValue::String(plain_str(Some(constant)))));
            }
            match map.get("field").and_then(Value::as_str) {
                Some(source) => Ok(data.get(source).cloned()),
                None => Err(DistributorError::data_processing(format!(
                    "mapping for field \"{out_field}\" needs \"field\" or \"constant\""
                ))),
            }
        }
        other => Err(DistributorError::data_processing(format!(
            "invalid mapping for field \"{out_field}\": {other}"
        ))),
    }
}

fn field_matches(value: &FieldValue, expected: &str) -> bool {
    match value {
        FieldValue::Multi(items) | FieldValue::DiscreteMulti(items) => {
            items.iter().any(|item| field_matches(item, expected))
        }
        other => other.to_string() == expected,
    }
}

fn required_str<'a>(
    condition: &'a Map<String, Value>,
    kind: &str,
    key: &str,
) -> Result<&'a str, DistributorError> {
    condition.get(key).and_then(Value::as_str).ok_or_else(|| {
        DistributorError::data_processing(format!("condition \"{kind}\" requires \"{key}\""))
    })
}

fn nested_list<'a>(
    condition: &'a Map<String, Value>,
    kind: &str,
) -> Result<&'a Vec<Value>, DistributorError> {
    condition
        .get("conditions")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            DistributorError::data_processing(format!(
                "condition \"{kind}\" requires a \"conditions\" list"
            ))
        })
}

fn plain_str(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
