use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use snafu::{ResultExt, ensure};
use tracing::{debug, instrument};

use super::config::{OperatorConfig, OperatorKind};
use super::protocol::{Action, DeployResponse, InvocationRequest};
use crate::error::{Error, IoSnafu, OperatorNameMismatchSnafu, Result};
use crate::schema::Schema;

/// An operator loaded from its directory
///
/// Handles are cheap and short-lived: build one per command. Every invocation
/// re-reads `operator_config.toml` and spawns a fresh process, so code
/// refreshed by a registry update is picked up without a restart.
#[derive(Debug, Clone)]
pub struct OperatorHandle {
    path: PathBuf,
    config: OperatorConfig,
    schema: Schema,
}

impl OperatorHandle {
    /// Load the operator declared in `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = OperatorConfig::load(path.as_ref())?;
        // entrypoints run with the operator directory as cwd; pin it down
        let path = fs::canonicalize(path.as_ref()).context(IoSnafu {
            path: path.as_ref(),
        })?;
        let schema = config.compile_schema(&path)?;
        debug!(operator = %config.name, path = %path.display(), "loaded operator");
        Ok(Self {
            path,
            config,
            schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The schema as the operator author wrote it, help messages included
    pub fn parameter_schema(&self) -> &Value {
        &self.config.schema
    }

    pub fn compiled_schema(&self) -> &Schema {
        &self.schema
    }

    pub fn kind(&self) -> OperatorKind {
        self.config.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.config.description.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.config.version.as_deref()
    }

    pub fn templates(&self) -> &[String] {
        &self.config.templates
    }

    /// Deploy a bundle. Returns the path of a transient build artifact, if the
    /// operator produced one; the caller removes it.
    ///
    /// `bundle_path` is `None` only for direct operators.
    pub fn deploy(
        &self,
        bundle_path: Option<&Path>,
        deployment_name: &str,
        spec: &Map<String, Value>,
    ) -> Result<Option<PathBuf>> {
        self.deploy_like(Action::Deploy, bundle_path, deployment_name, spec)
    }

    /// Redeploy an existing deployment. Same contract as [`Self::deploy`].
    pub fn update(
        &self,
        bundle_path: Option<&Path>,
        deployment_name: &str,
        spec: &Map<String, Value>,
    ) -> Result<Option<PathBuf>> {
        self.deploy_like(Action::Update, bundle_path, deployment_name, spec)
    }

    pub fn describe(
        &self,
        deployment_name: &str,
        spec: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let request = InvocationRequest {
            action: Action::Describe,
            deployment_name,
            bundle_path: None,
            spec,
        };
        match self.invoke(&request)? {
            Value::Null => Ok(Map::new()),
            Value::Object(info) => Ok(info),
            other => Err(self.invocation_error(
                Action::Describe,
                format!("expected a JSON object, got {other}"),
            )),
        }
    }

    pub fn delete(&self, deployment_name: &str, spec: &Map<String, Value>) -> Result<()> {
        let request = InvocationRequest {
            action: Action::Delete,
            deployment_name,
            bundle_path: None,
            spec,
        };
        self.invoke(&request)?;
        Ok(())
    }

    fn deploy_like(
        &self,
        action: Action,
        bundle_path: Option<&Path>,
        deployment_name: &str,
        spec: &Map<String, Value>,
    ) -> Result<Option<PathBuf>> {
        let request = InvocationRequest {
            action,
            deployment_name,
            bundle_path,
            spec,
        };
        let response = self.invoke(&request)?;
        if response.is_null() {
            return Ok(None);
        }
        let response: DeployResponse = serde_json::from_value(response)
            .map_err(|e| self.invocation_error(action, format!("unexpected response: {e}")))?;
        Ok(response.artifact_path)
    }

    #[instrument(skip(self, request), fields(operator = %self.name(), action = %request.action))]
    fn invoke(&self, request: &InvocationRequest<'_>) -> Result<Value> {
        let action = request.action;

        // re-read the declaration: an update may have replaced the code underneath us
        let current = OperatorConfig::load(&self.path)?;
        ensure!(
            current.name == self.config.name,
            OperatorNameMismatchSnafu {
                expected: self.config.name.as_str(),
                declared: current.name.as_str(),
            }
        );
        let (program, mut args) = current
            .entrypoint
            .resolve(&self.path)
            .ok_or_else(|| self.invocation_error(action, "entrypoint is empty"))?;
        args.push(action.as_str().to_string());

        let payload = serde_json::to_vec(request)
            .map_err(|e| self.invocation_error(action, format!("cannot encode request: {e}")))?;

        debug!(program = %program.display(), ?args, "spawning operator");
        let output = duct::cmd(program.as_os_str(), &args)
            .dir(&self.path)
            .stdin_bytes(payload)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .context(IoSnafu { path: &program })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.invocation_error(
                action,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(stdout)
            .map_err(|e| self.invocation_error(action, format!("invalid JSON output: {e}")))
    }

    fn invocation_error(&self, action: Action, reason: impl Into<String>) -> Error {
        Error::OperatorInvocation {
            name: self.config.name.clone(),
            action: action.to_string(),
            reason: reason.into(),
        }
    }
}
