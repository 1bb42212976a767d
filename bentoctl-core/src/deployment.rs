//! Deployment config documents
//!
//! ```yaml
//! api_version: v1
//! name: iris-classifier
//! operator:
//!   name: aws-lambda
//! template: terraform
//! spec:
//!   bento: ./bentos/iris
//!   region: us-east-1
//! ```
//!
//! Construction checks the document shape, resolves the operator through the
//! registry and pulls the bundle path out of `spec`. Validating the rest of
//! `spec` against the operator's schema is a separate step,
//! [`DeploymentConfig::validate_operator_spec`].

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::error::{
    DeploymentConfigNotFoundSnafu, Error, FieldErrors, IoSnafu, Result, invalid_config,
};
use crate::operator::{OperatorHandle, OperatorKind};
use crate::registry::OperatorRegistry;
use crate::schema::{Schema, remove_help_message};

pub const API_VERSION: &str = "v1";
/// Spec field holding the bundle reference
pub const BUNDLE_FIELD: &str = "bento";

const TOP_LEVEL_FIELDS: &[&str] = &["api_version", "name", "operator", "template", "spec"];

#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    deployment_name: String,
    operator_name: String,
    template: String,
    operator: OperatorHandle,
    bundle_path: Option<PathBuf>,
    raw_spec: Map<String, Value>,
    source_path: Option<PathBuf>,
}

impl DeploymentConfig {
    /// Read a YAML or JSON document. Relative bundle paths resolve against
    /// the file's directory.
    pub fn from_file(path: impl AsRef<Path>, registry: &OperatorRegistry) -> Result<Self> {
        let path = path.as_ref();
        ensure!(path.is_file(), DeploymentConfigNotFoundSnafu { path });

        let content = fs::read_to_string(path).context(IoSnafu { path })?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut config = Self::parse(&content, base_dir, registry)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse document text (YAML, which includes JSON).
    pub fn parse(content: &str, base_dir: &Path, registry: &OperatorRegistry) -> Result<Self> {
        let document: Value = serde_yaml::from_str(content)
            .map_err(|e| invalid_config(format!("malformed deployment config: {e}")))?;
        Self::from_value(document, base_dir, registry)
    }

    /// Build from an already-parsed document.
    pub fn from_value(document: Value, base_dir: &Path, registry: &OperatorRegistry) -> Result<Self> {
        let Value::Object(mut document) = document else {
            return Err(invalid_config("deployment config must be a mapping"));
        };

        let mut unknown = FieldErrors::new();
        for key in document.keys().filter(|k| !TOP_LEVEL_FIELDS.contains(&k.as_str())) {
            unknown.push(key.as_str(), "unknown field");
        }
        if !unknown.is_empty() {
            return Err(Error::InvalidDeploymentConfig {
                reason: "deployment config has unknown top-level fields".to_string(),
                errors: unknown,
            });
        }

        let api_version = required_string(&document, "api_version")?;
        if api_version != API_VERSION {
            return Err(invalid_config(format!(
                "unsupported api_version '{api_version}' (expected '{API_VERSION}')"
            )));
        }

        let deployment_name = required_string(&document, "name")?;
        let operator_name = operator_name(&document)?;
        let template = required_string(&document, "template")?;

        let mut raw_spec = match document.remove("spec") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(spec)) => spec,
            Some(_) => return Err(invalid_config("'spec' must be a mapping")),
        };

        // resolution loads the operator as it is on disk right now
        let operator = registry.load(&operator_name)?;

        if !operator.templates().is_empty() && !operator.templates().contains(&template) {
            return Err(invalid_config(format!(
                "template '{template}' is not supported by operator '{operator_name}' (supported: {})",
                operator.templates().join(", ")
            )));
        }

        let bundle_path = match operator.kind() {
            OperatorKind::Direct => None,
            OperatorKind::Bundle => Some(resolve_bundle(&mut raw_spec, base_dir)?),
        };

        debug!(
            deployment = %deployment_name,
            operator = %operator_name,
            bundle = ?bundle_path,
            "resolved deployment config"
        );

        Ok(Self {
            deployment_name,
            operator_name,
            template,
            operator,
            bundle_path,
            raw_spec,
            source_path: None,
        })
    }

    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }

    pub fn operator_name(&self) -> &str {
        &self.operator_name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn operator(&self) -> &OperatorHandle {
        &self.operator
    }

    /// `None` for direct operators
    pub fn bundle_path(&self) -> Option<&Path> {
        self.bundle_path.as_deref()
    }

    /// Operator-specific spec fields, bundle reference removed, not validated
    pub fn raw_spec(&self) -> &Map<String, Value> {
        &self.raw_spec
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Validate the spec against an operator schema as its author wrote it.
    ///
    /// Help messages are stripped before compiling. Returns the spec with
    /// coercions applied and defaults filled in.
    pub fn validate_operator_spec(&self, schema: &Value) -> Result<Map<String, Value>> {
        let schema = Schema::parse(&remove_help_message(schema))?;
        schema
            .validate(&self.raw_spec)
            .map_err(|errors| Error::InvalidDeploymentConfig {
                reason: format!("spec is invalid for operator '{}'", self.operator_name),
                errors,
            })
    }

    /// Validate against the resolved operator's own schema.
    pub fn validated_spec(&self) -> Result<Map<String, Value>> {
        self.validate_operator_spec(self.operator.parameter_schema())
    }
}

fn required_string(document: &Map<String, Value>, field: &str) -> Result<String> {
    match document.get(field) {
        None | Some(Value::Null) => Err(invalid_config(format!("'{field}' is required"))),
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.clone()),
        Some(Value::String(_)) => Err(invalid_config(format!("'{field}' must not be empty"))),
        Some(_) => Err(invalid_config(format!("'{field}' must be a string"))),
    }
}

fn operator_name(document: &Map<String, Value>) -> Result<String> {
    match document.get("operator") {
        None | Some(Value::Null) => Err(invalid_config("'operator' is required")),
        Some(Value::Object(operator)) => {
            if let Some(key) = operator.keys().find(|k| k.as_str() != "name") {
                let mut errors = FieldErrors::new();
                errors.push(format!("operator.{key}"), "unknown field");
                return Err(Error::InvalidDeploymentConfig {
                    reason: "operator section has unknown fields".to_string(),
                    errors,
                });
            }
            required_string(operator, "name")
                .map_err(|_| invalid_config("'operator.name' is required and must be a string"))
        }
        Some(_) => Err(invalid_config("'operator' must be a mapping with a 'name'")),
    }
}

fn resolve_bundle(spec: &mut Map<String, Value>, base_dir: &Path) -> Result<PathBuf> {
    let field = format!("spec.{BUNDLE_FIELD}");
    let reference = match spec.remove(BUNDLE_FIELD) {
        Some(Value::String(reference)) if !reference.trim().is_empty() => reference,
        None | Some(Value::Null) => return Err(invalid_config(format!("'{field}' is required"))),
        Some(_) => {
            return Err(invalid_config(format!(
                "'{field}' must be a path to the bundle"
            )));
        }
    };

    let candidate = PathBuf::from(shellexpand::tilde(&reference).as_ref());
    let candidate = if candidate.is_relative() {
        base_dir.join(candidate)
    } else {
        candidate
    };

    if !candidate.exists() {
        let mut errors = FieldErrors::new();
        errors.push(field, format!("{} does not exist", candidate.display()));
        return Err(Error::InvalidDeploymentConfig {
            reason: format!("bundle '{reference}' cannot be found"),
            errors,
        });
    }
    fs::canonicalize(&candidate).context(IoSnafu { path: &candidate })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::home::BentoctlHome;
    use serde_json::json;

    fn empty_registry() -> (tempfile::TempDir, OperatorRegistry) {
        let tmp = tempfile::tempdir().unwrap();
        let registry = OperatorRegistry::open(BentoctlHome::new(tmp.path())).unwrap();
        (tmp, registry)
    }

    fn build(document: Value) -> Result<DeploymentConfig> {
        let (tmp, registry) = empty_registry();
        DeploymentConfig::from_value(document, tmp.path(), &registry)
    }

    fn reason(err: &Error) -> String {
        err.to_string()
    }

    #[test]
    fn test_missing_operator_fails_construction() {
        let err = build(json!({
            "api_version": "v1",
            "name": "iris",
            "template": "terraform",
            "spec": {"region": "us-east-1"}
        }))
        .unwrap_err();
        assert_eq!(err.kind(), "InvalidDeploymentConfig");
        assert_eq!(reason(&err), "'operator' is required");
        assert!(err.field_errors().is_none());
    }

    #[test]
    fn test_version_marker_is_checked_first() {
        let err = build(json!({"api_version": "v2", "name": "iris"})).unwrap_err();
        assert_eq!(reason(&err), "unsupported api_version 'v2' (expected 'v1')");

        let err = build(json!({"name": "iris"})).unwrap_err();
        assert_eq!(reason(&err), "'api_version' is required");
    }

    #[test]
    fn test_identity_fields() {
        let err = build(json!({"api_version": "v1", "operator": {"name": "x"}})).unwrap_err();
        assert_eq!(reason(&err), "'name' is required");

        let err = build(json!({
            "api_version": "v1",
            "name": "iris",
            "operator": {"name": "x"}
        }))
        .unwrap_err();
        assert_eq!(reason(&err), "'template' is required");

        let err = build(json!({
            "api_version": "v1",
            "name": "iris",
            "operator": "aws-lambda",
            "template": "terraform"
        }))
        .unwrap_err();
        assert_eq!(reason(&err), "'operator' must be a mapping with a 'name'");
    }

    #[test]
    fn test_unknown_top_level_field() {
        let err = build(json!({
            "api_version": "v1",
            "name": "iris",
            "operator": {"name": "x"},
            "template": "terraform",
            "metadata": {}
        }))
        .unwrap_err();
        assert!(err.field_errors().unwrap().contains_field("metadata"));
    }

    #[test]
    fn test_unregistered_operator() {
        let err = build(json!({
            "api_version": "v1",
            "name": "iris",
            "operator": {"name": "aws-lambda"},
            "template": "terraform"
        }))
        .unwrap_err();
        assert_eq!(err.kind(), "OperatorNotFound");
    }

    #[test]
    fn test_malformed_yaml() {
        let (tmp, registry) = empty_registry();
        let err = DeploymentConfig::parse("api_version: [v1\n", tmp.path(), &registry).unwrap_err();
        assert_eq!(err.kind(), "InvalidDeploymentConfig");
        assert!(reason(&err).starts_with("malformed deployment config"));
    }

    #[test]
    fn test_missing_file() {
        let (tmp, registry) = empty_registry();
        let err = DeploymentConfig::from_file(tmp.path().join("nope.yaml"), &registry).unwrap_err();
        assert_eq!(err.kind(), "DeploymentConfigNotFound");
    }
}
