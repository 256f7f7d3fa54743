//! `${key.path}` template resolution over JSON value trees.
//!
//! A string that consists of exactly one reference resolves to the referenced
//! value itself, so non-string values survive. Anything else is interpolated.
//! `$${` escapes to a literal `${`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use thiserror::Error;

static TEMPLATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\$?)\$\{\s*([A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]+)*)\s*\}").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Could not resolve template key '{key}' at {path}. Available keys: {available}")]
    MissingKey {
        key: String,
        path: String,
        available: String,
    },
}

/// Resolve every template string in `value` against `context`.
pub fn resolve_template_value(value: &Value, context: &Value) -> Result<Value, TemplateError> {
    resolve_at(value, context, "")
}

/// Resolve a single string. See the module docs for the full-reference rule.
pub fn resolve_template_string(
    s: &str,
    context: &Value,
    path: &str,
) -> Result<Value, TemplateError> {
    if !s.contains("${") {
        return Ok(Value::String(s.to_string()));
    }

    if let Some(caps) = TEMPLATE_PATTERN.captures(s) {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        if whole == s && caps[1].is_empty() {
            return lookup_required(context, &caps[2], path).cloned();
        }
    }

    let mut error: Option<TemplateError> = None;
    let rendered = TEMPLATE_PATTERN.replace_all(s, |caps: &Captures| {
        if !caps[1].is_empty() {
            return format!("${{{}}}", &caps[2]);
        }
        match lookup_required(context, &caps[2], path) {
            Ok(Value::String(v)) => v.clone(),
            Ok(other) => other.to_string(),
            Err(e) => {
                error.get_or_insert(e);
                String::new()
            }
        }
    });

    match error {
        Some(e) => Err(e),
        None => Ok(Value::String(rendered.into_owned())),
    }
}

/// Look up a dotted key path. Numeric segments index into arrays.
pub fn lookup<'a>(context: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(context, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn lookup_required<'a>(context: &'a Value, key: &str, path: &str) -> Result<&'a Value, TemplateError> {
    lookup(context, key).ok_or_else(|| TemplateError::MissingKey {
        key: key.to_string(),
        path: if path.is_empty() { "<root>".to_string() } else { path.to_string() },
        available: available_keys(context),
    })
}

fn available_keys(context: &Value) -> String {
    match context {
        Value::Object(map) => {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys.join(", ")
        }
        _ => String::new(),
    }
}

fn resolve_at(value: &Value, context: &Value, path: &str) -> Result<Value, TemplateError> {
    match value {
        Value::String(s) => resolve_template_string(s, context, path),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| resolve_at(v, context, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                resolved.insert(k.clone(), resolve_at(v, context, &child_path)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Value {
        json!({
            "project": { "name": "demo" },
            "var": { "replicas": 3, "tags": ["a", "b"] },
            "environment": { "name": "local" }
        })
    }

    #[test]
    fn interpolates_strings() {
        let v = resolve_template_string("${project.name}-${environment.name}", &ctx(), "").unwrap();
        assert_eq!(v, json!("demo-local"));
    }

    #[test]
    fn full_reference_keeps_type() {
        let v = resolve_template_value(&json!({"replicas": "${var.replicas}"}), &ctx()).unwrap();
        assert_eq!(v["replicas"], json!(3));
    }

    #[test]
    fn array_index_lookup() {
        let v = resolve_template_string("tag=${var.tags.1}", &ctx(), "").unwrap();
        assert_eq!(v, json!("tag=b"));
    }

    #[test]
    fn escaped_reference_is_literal() {
        let v = resolve_template_string("$${project.name}", &ctx(), "").unwrap();
        assert_eq!(v, json!("${project.name}"));
    }

    #[test]
    fn missing_key_reports_path_and_available_keys() {
        let err = resolve_template_value(&json!({"spec": {"image": "${var.image}"}}), &ctx()).unwrap_err();
        let TemplateError::MissingKey { key, path, available } = err;
        assert_eq!(key, "var.image");
        assert_eq!(path, "spec.image");
        assert_eq!(available, "environment, project, var");
    }

    #[test]
    fn plain_values_pass_through() {
        let input = json!({"n": 1, "flag": true, "s": "no templates here"});
        assert_eq!(resolve_template_value(&input, &ctx()).unwrap(), input);
    }
}
