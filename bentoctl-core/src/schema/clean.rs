use serde_json::{Map, Value};

pub const HELP_MESSAGE_KEY: &str = "help_message";

/// Strip `help_message` from every rule node, at any depth.
///
/// Descends into `dict` rules' `schema` (fixed fields), `keysrules` and
/// `valuesrules`, and into `list` rules' element `schema`. Every other key is
/// carried over untouched. Values that are not rule objects are returned as-is,
/// so the compiler can report them.
pub fn remove_help_message(schema: &Value) -> Value {
    match schema {
        Value::Object(fields) => Value::Object(clean_fields(fields)),
        other => other.clone(),
    }
}

fn clean_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, rule)| (name.clone(), clean_rule(rule)))
        .collect()
}

fn clean_rule(rule: &Value) -> Value {
    let Value::Object(rule) = rule else {
        return rule.clone();
    };

    let is_list = rule.get("type").and_then(Value::as_str) == Some("list");
    let mut cleaned = Map::with_capacity(rule.len());

    for (key, value) in rule {
        match key.as_str() {
            HELP_MESSAGE_KEY => {}
            // a list's `schema` is a single element rule; a dict's is a field map
            "schema" if is_list => {
                cleaned.insert(key.clone(), clean_rule(value));
            }
            "schema" => {
                let nested = match value {
                    Value::Object(fields) => Value::Object(clean_fields(fields)),
                    other => other.clone(),
                };
                cleaned.insert(key.clone(), nested);
            }
            "keysrules" | "valuesrules" => {
                cleaned.insert(key.clone(), clean_rule(value));
            }
            _ => {
                cleaned.insert(key.clone(), value.clone());
            }
        }
    }

    Value::Object(cleaned)
}
