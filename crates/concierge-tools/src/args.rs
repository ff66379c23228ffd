// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argument normalization ahead of schema validation.
//!
//! Models routinely send `"5"` for an integer or `null` for an omitted
//! optional field. Declared properties are coerced toward their schema type
//! and defaults filled in. Undeclared properties are dropped unless the schema
//! forbids them, in which case validation reports them.

use jsonschema::Validator;
use serde_json::{Map, Number, Value};

use crate::spec::ToolSpec;

/// Turn raw model arguments into an object ready for validation.
pub(crate) fn normalize_arguments(spec: &ToolSpec, raw: Value) -> Result<Map<String, Value>, Vec<String>> {
    let mut args = match raw {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(vec![format!(
                "arguments must be a JSON object, got {}",
                type_name(&other)
            )]);
        }
    };

    let schema = spec.schema();
    let empty = Map::new();
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let forbid_extra = schema.get("additionalProperties") == Some(&Value::Bool(false));

    if !forbid_extra {
        args.retain(|key, _| properties.contains_key(key));
    }

    for (name, property) in properties {
        let declared = property.get("type").and_then(Value::as_str);
        match args.remove(name) {
            Some(Value::Null) if !required.contains(&name.as_str()) => {
                if let Some(default) = property.get("default") {
                    args.insert(name.clone(), default.clone());
                }
            }
            Some(value) => {
                let value = match declared {
                    Some(ty) => coerce(value, ty),
                    None => value,
                };
                args.insert(name.clone(), value);
            }
            None => {
                if let Some(default) = property.get("default") {
                    args.insert(name.clone(), default.clone());
                }
            }
        }
    }

    Ok(args)
}

/// Validation messages for `args`, empty when valid.
pub(crate) fn schema_errors(validator: &Validator, args: &Map<String, Value>) -> Vec<String> {
    let instance = Value::Object(args.clone());
    validator
        .iter_errors(&instance)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{path}: {e}")
            }
        })
        .collect()
}

fn coerce(value: Value, ty: &str) -> Value {
    match (ty, value) {
        ("integer", Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => Value::String(s),
        },
        ("integer", Value::Number(n)) if n.as_i64().is_none() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::Number((f as i64).into()),
            _ => Value::Number(n),
        },
        ("number", Value::String(s)) => match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => Value::Number(n),
            None => Value::String(s),
        },
        ("string", Value::Number(n)) => Value::String(n.to_string()),
        ("string", Value::Bool(b)) => Value::String(b.to_string()),
        ("string", Value::String(s)) => Value::String(s.trim().to_string()),
        ("boolean", Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Value::Bool(true),
            "false" | "no" | "0" => Value::Bool(false),
            _ => Value::String(s),
        },
        (_, value) => value,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
