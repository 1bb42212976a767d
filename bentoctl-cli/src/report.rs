//! Human-readable output for operator listings and deployment results

use std::collections::BTreeMap;
use std::fmt::Write as _;

use bentoctl_core::OperatorRecord;
use serde_json::{Map, Value};

/// Render the installed operators as an aligned table.
pub fn operator_table(operators: &BTreeMap<String, OperatorRecord>) -> String {
    if operators.is_empty() {
        return "ℹ️  No operators installed\n".to_string();
    }

    let rows: Vec<[String; 4]> = operators
        .iter()
        .map(|(name, record)| {
            let remote = record
                .origin
                .remote()
                .map(|source| match source.branch {
                    Some(branch) => format!("{}@{branch}", source.url),
                    None => source.url,
                })
                .unwrap_or_default();
            [
                name.clone(),
                record.origin.label().to_string(),
                record.version.clone().unwrap_or_else(|| "-".to_string()),
                if remote.is_empty() {
                    record.path.display().to_string()
                } else {
                    remote
                },
            ]
        })
        .collect();

    let header = ["NAME", "ORIGIN", "VERSION", "SOURCE"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &header.map(str::to_string), &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    let _ = writeln!(out, "{}", line.trim_end());
}

/// Render a JSON object as `key: value` lines, nesting by indentation.
pub fn key_values(values: &Map<String, Value>) -> String {
    let mut out = String::new();
    write_map(&mut out, values, 1);
    out
}

fn write_map(out: &mut String, values: &Map<String, Value>, depth: usize) {
    let indent = "  ".repeat(depth);
    for (key, value) in values {
        match value {
            Value::Object(nested) if !nested.is_empty() => {
                let _ = writeln!(out, "{indent}{key}:");
                write_map(out, nested, depth + 1);
            }
            Value::String(s) => {
                let _ = writeln!(out, "{indent}{key}: {s}");
            }
            other => {
                let _ = writeln!(out, "{indent}{key}: {other}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bentoctl_core::OperatorOrigin;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_empty_table() {
        assert!(operator_table(&BTreeMap::new()).contains("No operators installed"));
    }

    #[test]
    fn test_operator_table() {
        let mut operators = BTreeMap::new();
        operators.insert(
            "aws-lambda".to_string(),
            OperatorRecord {
                path: PathBuf::from("/home/me/bentoctl/operators/aws-lambda"),
                origin: OperatorOrigin::Official {
                    url: "https://github.com/bentoml/aws-lambda-deploy.git".into(),
                    branch: Some("v0.2.0".into()),
                },
                version: Some("0.2.0".into()),
            },
        );
        operators.insert(
            "my-op".to_string(),
            OperatorRecord {
                path: PathBuf::from("/src/my-op"),
                origin: OperatorOrigin::Local,
                version: None,
            },
        );

        let table = operator_table(&operators);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[1].starts_with("aws-lambda  official  0.2.0"));
        assert!(lines[1].ends_with("aws-lambda-deploy.git@v0.2.0"));
        assert!(lines[2].starts_with("my-op"));
        assert!(lines[2].ends_with("/src/my-op"));
    }

    #[test]
    fn test_key_values_nesting() {
        let values = json!({"region": "us-east-1", "scaling": {"min": 1}, "public": true});
        let rendered = key_values(values.as_object().unwrap());
        assert_eq!(
            rendered,
            "  public: true\n  region: us-east-1\n  scaling:\n    min: 1\n"
        );
    }
}
