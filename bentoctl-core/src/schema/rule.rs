use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};

use super::clean::HELP_MESSAGE_KEY;
use crate::error::{Error, Result};

/// Compiled operator schema: field name → rule
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub(crate) fields: BTreeMap<String, Rule>,
}

/// One validation rule node
#[derive(Debug, Clone)]
pub struct Rule {
    pub shape: Shape,
    pub required: bool,
    pub nullable: bool,
    pub default: Option<Value>,
    pub coerce: Option<Coercion>,
    pub allowed: Option<Vec<Value>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub regex: Option<Regex>,
}

#[derive(Debug, Clone)]
pub enum Shape {
    Scalar(ScalarType),
    /// `dict` with fixed, declared keys
    Dict(Schema),
    /// `dict` with open keys; either side may be unconstrained
    Map {
        keys: Option<Box<Rule>>,
        values: Option<Box<Rule>>,
    },
    List(Option<Box<Rule>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Number,
    Boolean,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::Number => "number",
            ScalarType::Boolean => "boolean",
        })
    }
}

/// Built-in coercers, named by the `coerce` rule key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Integer,
    Float,
    Boolean,
    String,
    /// Comma-separated string → list of trimmed strings
    List,
}

impl Coercion {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" | "integer" => Some(Coercion::Integer),
            "float" => Some(Coercion::Float),
            "bool" | "boolean" => Some(Coercion::Boolean),
            "str" | "string" => Some(Coercion::String),
            "list" => Some(Coercion::List),
            _ => None,
        }
    }
}

const RULE_KEYS: &[&str] = &[
    "type",
    "required",
    "nullable",
    "default",
    "coerce",
    "allowed",
    "min",
    "max",
    "regex",
    "schema",
    "keysrules",
    "valuesrules",
];

fn schema_error(path: &str, reason: impl fmt::Display) -> Error {
    Error::InvalidSchema {
        reason: format!("{path}: {reason}"),
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

impl Schema {
    /// Compile a cleaned schema document.
    ///
    /// Unknown rule keys are errors, including `help_message`: run
    /// [`remove_help_message`](super::remove_help_message) first.
    pub fn parse(value: &Value) -> Result<Self> {
        match value {
            Value::Object(fields) => parse_fields(fields, ""),
            Value::Null => Ok(Schema::default()),
            other => Err(Error::InvalidSchema {
                reason: format!("schema must be a mapping of field rules, got {}", type_name(other)),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&Rule> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

fn parse_fields(fields: &Map<String, Value>, prefix: &str) -> Result<Schema> {
    let mut compiled = BTreeMap::new();
    for (name, rule) in fields {
        let path = join(prefix, name);
        compiled.insert(name.clone(), parse_rule(rule, &path)?);
    }
    Ok(Schema { fields: compiled })
}

fn parse_rule(value: &Value, path: &str) -> Result<Rule> {
    let Value::Object(rule) = value else {
        return Err(schema_error(path, "rule must be a mapping"));
    };

    if let Some(key) = rule.keys().find(|k| !RULE_KEYS.contains(&k.as_str())) {
        let hint = if key == HELP_MESSAGE_KEY {
            " (help messages must be removed before compiling)"
        } else {
            ""
        };
        return Err(schema_error(path, format!("unknown rule '{key}'{hint}")));
    }

    let type_name = rule
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| schema_error(path, "missing 'type'"))?;

    let shape = match type_name {
        "string" => Shape::Scalar(ScalarType::String),
        "integer" => Shape::Scalar(ScalarType::Integer),
        "float" => Shape::Scalar(ScalarType::Float),
        "number" => Shape::Scalar(ScalarType::Number),
        "boolean" => Shape::Scalar(ScalarType::Boolean),
        "dict" => parse_dict_shape(rule, path)?,
        "list" => {
            let element = match rule.get("schema") {
                Some(element) => Some(Box::new(parse_rule(element, &join(path, "*"))?)),
                None => None,
            };
            Shape::List(element)
        }
        other => return Err(schema_error(path, format!("unsupported type '{other}'"))),
    };

    if !matches!(shape, Shape::Dict(_) | Shape::List(_))
        && rule.get("schema").is_some()
    {
        return Err(schema_error(path, "'schema' is only valid for dict and list rules"));
    }
    if !matches!(shape, Shape::Dict(_) | Shape::Map { .. })
        && (rule.contains_key("keysrules") || rule.contains_key("valuesrules"))
    {
        return Err(schema_error(path, "'keysrules' and 'valuesrules' are only valid for dict rules"));
    }

    let coerce = match rule.get("coerce") {
        None => None,
        Some(Value::String(name)) => Some(
            Coercion::from_name(name)
                .ok_or_else(|| schema_error(path, format!("unknown coercion '{name}'")))?,
        ),
        Some(_) => return Err(schema_error(path, "'coerce' must name a coercion")),
    };

    let allowed = match rule.get("allowed") {
        None => None,
        Some(Value::Array(values)) => Some(values.clone()),
        Some(_) => return Err(schema_error(path, "'allowed' must be a list")),
    };

    let regex = match rule.get("regex") {
        None => None,
        Some(Value::String(pattern)) => Some(
            Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|e| schema_error(path, format!("invalid regex: {e}")))?,
        ),
        Some(_) => return Err(schema_error(path, "'regex' must be a string")),
    };

    Ok(Rule {
        shape,
        required: bool_key(rule, "required", path)?,
        nullable: bool_key(rule, "nullable", path)?,
        default: rule.get("default").cloned(),
        coerce,
        allowed,
        min: number_key(rule, "min", path)?,
        max: number_key(rule, "max", path)?,
        regex,
    })
}

fn parse_dict_shape(rule: &Map<String, Value>, path: &str) -> Result<Shape> {
    let has_open_rules = rule.contains_key("keysrules") || rule.contains_key("valuesrules");
    match rule.get("schema") {
        Some(_) if has_open_rules => Err(schema_error(
            path,
            "dict rules take either 'schema' or 'keysrules'/'valuesrules', not both",
        )),
        Some(Value::Object(fields)) => Ok(Shape::Dict(parse_fields(fields, path)?)),
        Some(_) => Err(schema_error(path, "dict 'schema' must be a mapping of field rules")),
        None => {
            let keys = match rule.get("keysrules") {
                Some(keys) => Some(Box::new(parse_rule(keys, &join(path, "<key>"))?)),
                None => None,
            };
            let values = match rule.get("valuesrules") {
                Some(values) => Some(Box::new(parse_rule(values, &join(path, "<value>"))?)),
                None => None,
            };
            Ok(Shape::Map { keys, values })
        }
    }
}

fn bool_key(rule: &Map<String, Value>, key: &str, path: &str) -> Result<bool> {
    match rule.get(key) {
        None => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(_) => Err(schema_error(path, format!("'{key}' must be a boolean"))),
    }
}

fn number_key(rule: &Map<String, Value>, key: &str, path: &str) -> Result<Option<f64>> {
    match rule.get(key) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(_) => Err(schema_error(path, format!("'{key}' must be a number"))),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_all_shapes() {
        let schema = Schema::parse(&json!({
            "region": {"type": "string", "required": true, "allowed": ["us-east-1", "eu-west-1"]},
            "memory": {"type": "integer", "default": 512, "coerce": "int", "min": 128, "max": 10240},
            "scaling": {"type": "dict", "schema": {"max": {"type": "integer", "required": true}}},
            "tags": {"type": "dict", "keysrules": {"type": "string", "regex": "[a-z]+"}},
            "ports": {"type": "list", "schema": {"type": "integer"}}
        }))
        .unwrap();

        assert_eq!(schema.field_names().count(), 5);

        let region = schema.field("region").unwrap();
        assert!(region.required);
        assert!(matches!(region.shape, Shape::Scalar(ScalarType::String)));

        let memory = schema.field("memory").unwrap();
        assert_eq!(memory.coerce, Some(Coercion::Integer));
        assert_eq!(memory.default, Some(json!(512)));
        assert_eq!(memory.min, Some(128.0));

        match &schema.field("scaling").unwrap().shape {
            Shape::Dict(nested) => assert!(nested.field("max").unwrap().required),
            other => panic!("expected dict shape, got {other:?}"),
        }
        match &schema.field("tags").unwrap().shape {
            Shape::Map { keys, values } => {
                assert!(keys.is_some());
                assert!(values.is_none());
            }
            other => panic!("expected map shape, got {other:?}"),
        }
        assert!(matches!(
            schema.field("ports").unwrap().shape,
            Shape::List(Some(_))
        ));
    }

    #[test]
    fn test_rejects_help_message() {
        let err = Schema::parse(&json!({
            "region": {"type": "string", "help_message": "where"}
        }))
        .unwrap_err();
        assert_eq!(err.kind(), "InvalidSchema");
        assert!(err.to_string().contains("help_message"));
    }

    #[test]
    fn test_rejects_unknown_type_and_coercion() {
        let err = Schema::parse(&json!({"a": {"type": "tuple"}})).unwrap_err();
        assert!(err.to_string().contains("unsupported type 'tuple'"));

        let err = Schema::parse(&json!({"a": {"type": "string", "coerce": "uppercase"}})).unwrap_err();
        assert!(err.to_string().contains("unknown coercion 'uppercase'"));
    }

    #[test]
    fn test_nested_errors_carry_path() {
        let err = Schema::parse(&json!({
            "scaling": {"type": "dict", "schema": {"max": {"required": true}}}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("scaling.max: missing 'type'"));
    }

    #[test]
    fn test_null_schema_is_empty() {
        assert!(Schema::parse(&Value::Null).unwrap().is_empty());
    }
}
