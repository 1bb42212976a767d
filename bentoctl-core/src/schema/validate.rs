use serde_json::{Map, Number, Value};

use super::rule::{Coercion, Rule, ScalarType, Schema, Shape, type_name};
use crate::error::FieldErrors;

impl Schema {
    /// Validate and normalize a spec mapping.
    ///
    /// Unknown fields are rejected, absent fields take their `default`,
    /// `coerce` runs before the type check, and nested rules recurse with
    /// the same semantics. Returns the normalized mapping or every field error
    /// found.
    pub fn validate(&self, document: &Map<String, Value>) -> Result<Map<String, Value>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let normalized = validate_fields(self, document, "", &mut errors);
        if errors.is_empty() {
            Ok(normalized)
        } else {
            Err(errors)
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_fields(
    schema: &Schema,
    document: &Map<String, Value>,
    prefix: &str,
    errors: &mut FieldErrors,
) -> Map<String, Value> {
    for name in document.keys() {
        if !schema.fields.contains_key(name) {
            errors.push(join(prefix, name), "unknown field");
        }
    }

    let mut normalized = Map::new();
    for (name, rule) in &schema.fields {
        let path = join(prefix, name);
        match document.get(name) {
            Some(value) => {
                if let Some(value) = validate_value(value, rule, &path, errors) {
                    normalized.insert(name.clone(), value);
                }
            }
            None => match &rule.default {
                Some(default) => {
                    if let Some(value) = validate_value(default, rule, &path, errors) {
                        normalized.insert(name.clone(), value);
                    }
                }
                None if rule.required => errors.push(path, "required field"),
                None => {}
            },
        }
    }
    normalized
}

fn validate_value(value: &Value, rule: &Rule, path: &str, errors: &mut FieldErrors) -> Option<Value> {
    if value.is_null() {
        if rule.nullable {
            return Some(Value::Null);
        }
        errors.push(path, "null value not allowed");
        return None;
    }

    let value = match rule.coerce {
        Some(coercion) => match coerce(value, coercion) {
            Ok(coerced) => coerced,
            Err(reason) => {
                errors.push(path, format!("cannot be coerced: {reason}"));
                return None;
            }
        },
        None => value.clone(),
    };

    let value = match &rule.shape {
        Shape::Scalar(expected) => {
            if !matches_scalar(&value, *expected) {
                errors.push(path, format!("must be of {expected} type"));
                return None;
            }
            value
        }
        Shape::Dict(schema) => {
            let Value::Object(fields) = &value else {
                errors.push(path, "must be of dict type");
                return None;
            };
            Value::Object(validate_fields(schema, fields, path, errors))
        }
        Shape::Map { keys, values } => {
            let Value::Object(entries) = &value else {
                errors.push(path, "must be of dict type");
                return None;
            };
            let mut normalized = Map::with_capacity(entries.len());
            for (key, item) in entries {
                let item_path = join(path, key);
                if let Some(key_rule) = keys {
                    validate_value(&Value::String(key.clone()), key_rule, &item_path, errors);
                }
                let item = match values {
                    Some(value_rule) => validate_value(item, value_rule, &item_path, errors),
                    None => Some(item.clone()),
                };
                if let Some(item) = item {
                    normalized.insert(key.clone(), item);
                }
            }
            Value::Object(normalized)
        }
        Shape::List(element) => {
            let Value::Array(items) = &value else {
                errors.push(path, "must be of list type");
                return None;
            };
            let normalized = match element {
                Some(element_rule) => items
                    .iter()
                    .enumerate()
                    .filter_map(|(index, item)| {
                        validate_value(item, element_rule, &join(path, &index.to_string()), errors)
                    })
                    .collect(),
                None => items.clone(),
            };
            Value::Array(normalized)
        }
    };

    check_constraints(&value, rule, path, errors);
    Some(value)
}

fn matches_scalar(value: &Value, expected: ScalarType) -> bool {
    match expected {
        ScalarType::String => value.is_string(),
        ScalarType::Integer => value.is_i64() || value.is_u64(),
        ScalarType::Float => value.is_f64(),
        ScalarType::Number => value.is_number(),
        ScalarType::Boolean => value.is_boolean(),
    }
}

fn check_constraints(value: &Value, rule: &Rule, path: &str, errors: &mut FieldErrors) {
    if let Some(allowed) = &rule.allowed {
        match value {
            Value::Array(items) => {
                for item in items.iter().filter(|item| !allowed.contains(item)) {
                    errors.push(path, format!("unallowed value {item}"));
                }
            }
            other if !allowed.contains(other) => {
                errors.push(path, format!("unallowed value {other}"));
            }
            _ => {}
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = rule.min.filter(|min| number < *min) {
            errors.push(path, format!("min value is {}", format_bound(min)));
        }
        if let Some(max) = rule.max.filter(|max| number > *max) {
            errors.push(path, format!("max value is {}", format_bound(max)));
        }
    }

    if let (Some(regex), Some(text)) = (&rule.regex, value.as_str()) {
        if !regex.is_match(text) {
            let pattern = regex.as_str();
            let pattern = pattern
                .strip_prefix("^(?:")
                .and_then(|p| p.strip_suffix(")$"))
                .unwrap_or(pattern);
            errors.push(path, format!("value does not match regex '{pattern}'"));
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_bound(bound: f64) -> String {
    if bound.fract() == 0.0 && bound.abs() < 1e15 {
        format!("{}", bound as i64)
    } else {
        bound.to_string()
    }
}

// -2^63 and 2^63, both exact in f64
#[allow(clippy::cast_precision_loss)]
const I64_LOWER: f64 = i64::MIN as f64;
const I64_UPPER: f64 = -I64_LOWER;

#[allow(clippy::cast_possible_truncation)]
fn coerce(value: &Value, coercion: Coercion) -> Result<Value, String> {
    match coercion {
        Coercion::Integer => match value {
            Value::Number(n) if n.is_i64() => Ok(value.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() != 0.0 => Err(format!("{n} is not a whole number")),
                Some(f) if (I64_LOWER..I64_UPPER).contains(&f) => Ok(Value::from(f as i64)),
                _ => Err(format!("{n} is out of integer range")),
            },
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("'{s}' is not an integer")),
            other => Err(format!("cannot convert {} to integer", type_name(other))),
        },
        Coercion::Float => match value {
            Value::Number(n) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("{n} is not a finite float")),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| format!("'{s}' is not a float")),
            other => Err(format!("cannot convert {} to float", type_name(other))),
        },
        Coercion::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("'{s}' is not a boolean")),
            },
            Value::Number(n) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(format!("{n} is not a boolean")),
            },
            other => Err(format!("cannot convert {} to boolean", type_name(other))),
        },
        Coercion::String => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(format!("cannot convert {} to string", type_name(other))),
        },
        Coercion::List => match value {
            Value::Array(_) => Ok(value.clone()),
            Value::String(s) => Ok(Value::Array(
                s.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| Value::String(item.to_string()))
                    .collect(),
            )),
            other => Err(format!("cannot convert {} to list", type_name(other))),
        },
    }
}
