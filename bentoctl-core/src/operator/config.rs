//! `operator_config.toml`: the declaration every operator directory carries

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use snafu::{ResultExt, ensure};

use crate::error::{Error, IoSnafu, OperatorConfigNotFoundSnafu, Result};
use crate::schema::{Schema, remove_help_message};

pub const OPERATOR_CONFIG_FILE: &str = "operator_config.toml";

/// Whether deployments through this operator ship a bundle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorKind {
    #[default]
    Bundle,
    /// Deploys straight from the spec; no `bento` field is expected
    Direct,
}

/// Command the registry spawns for every action
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Entrypoint {
    /// Whitespace-separated command line, e.g. `"bin/operator --quiet"`
    Command(String),
    Argv(Vec<String>),
}

impl Entrypoint {
    fn parts(&self) -> Vec<String> {
        match self {
            Entrypoint::Command(line) => line.split_whitespace().map(str::to_string).collect(),
            Entrypoint::Argv(argv) => argv.clone(),
        }
    }

    /// Program and arguments, with a relative program path anchored at `operator_dir`.
    pub fn resolve(&self, operator_dir: &Path) -> Option<(PathBuf, Vec<String>)> {
        let mut parts = self.parts().into_iter();
        let program = parts.next()?;
        let program_path = Path::new(&program);
        // bare names like `python3` are left for PATH lookup
        let program = if program_path.is_relative() && program_path.components().count() > 1 {
            operator_dir.join(program_path)
        } else {
            PathBuf::from(program)
        };
        Some((program, parts.collect()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperatorConfig {
    pub name: String,
    pub entrypoint: Entrypoint,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub kind: OperatorKind,
    #[serde(default)]
    pub templates: Vec<String>,
    /// Parameter schema exactly as the operator author wrote it
    #[serde(default)]
    pub schema: Value,
}

fn load_error(dir: &Path, reason: impl Into<String>) -> Error {
    Error::OperatorLoad {
        path: dir.to_path_buf(),
        reason: reason.into(),
    }
}

impl OperatorConfig {
    /// Read and check the declaration in `dir`.
    ///
    /// Fails with `OperatorConfigNotFound` when the file is absent and with
    /// `OperatorLoad` when it is present but unusable.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(OPERATOR_CONFIG_FILE);
        ensure!(config_path.is_file(), OperatorConfigNotFoundSnafu { path: dir });

        let content = fs::read_to_string(&config_path).context(IoSnafu { path: &config_path })?;
        let config: OperatorConfig =
            toml::from_str(&content).map_err(|e| load_error(dir, e.message().to_string()))?;

        config.check(dir)?;
        Ok(config)
    }

    fn check(&self, dir: &Path) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(load_error(dir, "operator name must not be empty"));
        }
        // names double as directory names under the registry home
        let valid_name = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$")
            .map_err(|e| load_error(dir, e.to_string()))?;
        if !valid_name.is_match(&self.name) {
            return Err(load_error(
                dir,
                format!("operator name '{}' may only contain letters, digits, '.', '_' and '-'", self.name),
            ));
        }
        if self.entrypoint.resolve(dir).is_none() {
            return Err(load_error(dir, "entrypoint must not be empty"));
        }
        if let Some(version) = &self.version {
            semver::Version::parse(version.trim_start_matches('v'))
                .map_err(|e| load_error(dir, format!("invalid version '{version}': {e}")))?;
        }
        Ok(())
    }

    /// Compile the declared schema after stripping help messages.
    pub fn compile_schema(&self, dir: &Path) -> Result<Schema> {
        Schema::parse(&remove_help_message(&self.schema))
            .map_err(|e| load_error(dir, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_config(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(OPERATOR_CONFIG_FILE), content).unwrap();
        dir
    }

    #[test]
    fn test_load_full_declaration() {
        let dir = write_config(
            r#"
name = "aws-lambda"
entrypoint = ["python3", "-m", "aws_lambda_deploy"]
description = "Deploy bundles to AWS Lambda"
version = "0.2.1"
templates = ["terraform", "cloudformation"]

[schema.region]
type = "string"
required = true
help_message = "AWS region"
"#,
        );

        let config = OperatorConfig::load(dir.path()).unwrap();
        assert_eq!(config.name, "aws-lambda");
        assert_eq!(config.kind, OperatorKind::Bundle);
        assert_eq!(config.templates, vec!["terraform", "cloudformation"]);
        assert_eq!(
            config.schema,
            json!({"region": {"type": "string", "required": true, "help_message": "AWS region"}})
        );
        assert!(config.compile_schema(dir.path()).unwrap().field("region").is_some());
    }

    #[test]
    fn test_missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = OperatorConfig::load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), "OperatorConfigNotFound");
    }

    #[test]
    fn test_syntax_error_is_load_error() {
        let dir = write_config("name = \"broken\nentrypoint = ");
        let err = OperatorConfig::load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), "OperatorLoadException");
    }

    #[test]
    fn test_missing_declarations_are_load_errors() {
        let dir = write_config("name = \"no-entrypoint\"\n");
        assert_eq!(
            OperatorConfig::load(dir.path()).unwrap_err().kind(),
            "OperatorLoadException"
        );

        let dir = write_config("name = \"\"\nentrypoint = \"run\"\n");
        assert!(
            OperatorConfig::load(dir.path())
                .unwrap_err()
                .to_string()
                .contains("name must not be empty")
        );

        let dir = write_config("name = \"../escape\"\nentrypoint = \"run\"\n");
        assert!(
            OperatorConfig::load(dir.path())
                .unwrap_err()
                .to_string()
                .contains("may only contain")
        );

        let dir = write_config("name = \"x\"\nentrypoint = []\n");
        assert!(
            OperatorConfig::load(dir.path())
                .unwrap_err()
                .to_string()
                .contains("entrypoint must not be empty")
        );
    }

    #[test]
    fn test_entrypoint_resolution() {
        let dir = Path::new("/operators/aws-lambda");

        let (program, args) = Entrypoint::Command("bin/operator --quiet".into())
            .resolve(dir)
            .unwrap();
        assert_eq!(program, PathBuf::from("/operators/aws-lambda/bin/operator"));
        assert_eq!(args, vec!["--quiet"]);

        let (program, args) = Entrypoint::Argv(vec!["python3".into(), "main.py".into()])
            .resolve(dir)
            .unwrap();
        assert_eq!(program, PathBuf::from("python3"));
        assert_eq!(args, vec!["main.py"]);
    }

    #[test]
    fn test_direct_kind_and_bad_version() {
        let dir = write_config("name = \"direct\"\nentrypoint = \"run\"\nkind = \"direct\"\n");
        assert_eq!(OperatorConfig::load(dir.path()).unwrap().kind, OperatorKind::Direct);

        let dir = write_config("name = \"x\"\nentrypoint = \"run\"\nversion = \"latest\"\n");
        assert!(
            OperatorConfig::load(dir.path())
                .unwrap_err()
                .to_string()
                .contains("invalid version 'latest'")
        );
    }
}
