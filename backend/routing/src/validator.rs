//! Output validation against action type schemas, including inherited ones.

use serde_json::{Map, Value};
use tracing::debug;
use trellis_core::{Operation, OutputsMode, Result, RouterError};

use jsonschema::error::ValidationErrorKind;

use crate::catalog::KindCatalog;

/// Merge an action type's own schema over its base's effective schema.
///
/// Properties are combined key by key. A property declared by both sides must
/// satisfy both, so it becomes an `allOf` of the two. `required` is the union
/// of both lists, so a base requirement is never dropped. Any other keyword
/// the two sides set differently keeps the base's value, and `own` is then
/// added to `allOf` so that outputs must satisfy it as well.
pub fn merge_schemas(own: &Value, base: &Value) -> Value {
    let (Value::Object(own_map), Value::Object(base_map)) = (own, base) else {
        return serde_json::json!({ "allOf": [base, own] });
    };

    let mut merged = base_map.clone();
    let mut conflicting = false;
    for (key, value) in own_map {
        match key.as_str() {
            "properties" => {
                let properties = merge_properties(base_map.get(key), value);
                merged.insert(key.clone(), properties);
            }
            "required" => {
                merged.insert(key.clone(), merge_required(base_map.get(key), value));
            }
            "allOf" => {
                let mut all_of = all_of(base_map.get(key));
                all_of.extend(all_of_items(value));
                merged.insert(key.clone(), Value::Array(all_of));
            }
            _ => match base_map.get(key) {
                Some(existing) if existing != value => conflicting = true,
                _ => {
                    merged.insert(key.clone(), value.clone());
                }
            },
        }
    }
    if conflicting {
        let mut all_of = all_of(merged.get("allOf"));
        all_of.push(own.clone());
        merged.insert("allOf".to_string(), Value::Array(all_of));
    }
    Value::Object(merged)
}

fn all_of(value: Option<&Value>) -> Vec<Value> {
    value.map(all_of_items).unwrap_or_default()
}

fn all_of_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn merge_properties(base: Option<&Value>, own: &Value) -> Value {
    let (Some(Value::Object(base)), Value::Object(own)) = (base, own) else {
        return own.clone();
    };
    let mut merged: Map<String, Value> = base.clone();
    for (name, schema) in own {
        let combined = match base.get(name) {
            Some(existing) if existing != schema => {
                serde_json::json!({ "allOf": [existing, schema] })
            }
            _ => schema.clone(),
        };
        merged.insert(name.clone(), combined);
    }
    Value::Object(merged)
}

fn merge_required(base: Option<&Value>, own: &Value) -> Value {
    let mut required: Vec<Value> = base
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    for name in own.as_array().into_iter().flatten() {
        if !required.contains(name) {
            required.push(name.clone());
        }
    }
    Value::Array(required)
}

/// The schema outputs of `action_type` must satisfy in `mode`: its own schema
/// merged over every ancestor's. `None` when no type in the chain declares one.
pub fn effective_schema<O: Operation>(
    catalog: &KindCatalog<O>,
    action_type: &str,
    mode: OutputsMode,
) -> Option<Value> {
    catalog
        .lineage(action_type)
        .iter()
        .rev()
        .filter_map(|entry| entry.definition.outputs_schema(mode))
        .fold(None, |inherited, own| {
            Some(match inherited {
                Some(base) => merge_schemas(own, &base),
                None => own.clone(),
            })
        })
}

/// Validate `outputs` of an action of `action_type` named `action_name`.
///
/// Outputs of a known type without any schema in its chain are accepted
/// as-is. An unknown type is a configuration error.
pub fn validate_outputs<O: Operation>(
    catalog: &KindCatalog<O>,
    action_type: &str,
    action_name: &str,
    mode: OutputsMode,
    outputs: &Value,
) -> Result<()> {
    if !catalog.contains(action_type) {
        return Err(RouterError::config(format!(
            "Cannot validate outputs of {} action '{}': type '{}' is not declared",
            O::KIND,
            action_name,
            action_type
        )));
    }

    let Some(schema) = effective_schema(catalog, action_type, mode) else {
        debug!(kind = O::KIND.as_str(), action_type, %mode, "No outputs schema; skipping validation");
        return Ok(());
    };

    let validator = jsonschema::validator_for(&schema).map_err(|e| RouterError::InvalidSchema {
        kind: O::KIND,
        action_type: action_type.to_string(),
        mode,
        message: e.to_string(),
    })?;

    let first = validator.iter_errors(outputs).next();
    match first {
        None => Ok(()),
        Some(error) => {
            let mut key = error.instance_path.to_string().replace('/', ".");
            if let ValidationErrorKind::Required { property } = &error.kind {
                let property = property.as_str().map(String::from).unwrap_or_else(|| property.to_string());
                key = format!("{key}.{property}");
            }
            if key.is_empty() {
                key = ".".to_string();
            }
            Err(RouterError::OutputValidation {
                kind: O::KIND,
                action: action_name.to_string(),
                mode,
                key,
                message: error.to_string(),
            })
        }
    }
}
