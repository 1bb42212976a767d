//! Error taxonomy for the operator registry and deployment config pipeline
//!
//! Every variant is user-facing: the CLI renders it as a single
//! `Kind: message` line via [`Error::kind`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Field-level validation failures keyed by dotted path (`scaling.max`, `env.0`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{field}: {}", messages.join(", "))?;
        }
        Ok(())
    }
}

fn describe_field_errors(errors: &FieldErrors) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(" ({errors})")
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("operator '{name}' is not installed"))]
    OperatorNotFound { name: String },

    #[snafu(display("operator '{name}' is already installed"))]
    OperatorExists { name: String },

    #[snafu(display("{} already belongs to operator '{owner}'", path.display()))]
    OperatorPathInUse { path: PathBuf, owner: String },

    #[snafu(display("operator '{name}' was installed from a local path and has no remote to update from"))]
    OperatorIsLocal { name: String },

    #[snafu(display("no operator_config.toml found in {}", path.display()))]
    OperatorConfigNotFound { path: PathBuf },

    #[snafu(display("failed to load operator from {}: {reason}", path.display()))]
    OperatorLoad { path: PathBuf, reason: String },

    #[snafu(display("operator declares name '{declared}' but was requested as '{expected}'"))]
    OperatorNameMismatch { expected: String, declared: String },

    #[snafu(display("'{name}' is not an official operator"))]
    UnknownOfficialOperator { name: String },

    #[snafu(display("cannot resolve operator source '{source_ref}': {reason}"))]
    InvalidSource { source_ref: String, reason: String },

    #[snafu(display("operator '{name}' failed during {action}: {reason}"))]
    OperatorInvocation {
        name: String,
        action: String,
        reason: String,
    },

    #[snafu(display("{reason}{}", describe_field_errors(errors)))]
    InvalidDeploymentConfig { reason: String, errors: FieldErrors },

    #[snafu(display("deployment config {} does not exist", path.display()))]
    DeploymentConfigNotFound { path: PathBuf },

    #[snafu(display("invalid operator schema: {reason}"))]
    InvalidSchema { reason: String },

    #[snafu(display("failed to fetch {url}: {reason}"))]
    Fetch { url: String, reason: String },

    #[snafu(display("registry file {} is corrupt", path.display()))]
    RegistryCorrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("failed to write registry file {}", path.display()))]
    RegistryWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot determine a home directory; set BENTOCTL_HOME"))]
    HomeNotFound,

    #[snafu(display("I/O error on {}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Stable kind name used when rendering errors at the CLI boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::OperatorNotFound { .. } => "OperatorNotFound",
            Error::OperatorExists { .. } | Error::OperatorPathInUse { .. } => "OperatorExists",
            Error::OperatorIsLocal { .. } => "OperatorIsLocal",
            Error::OperatorConfigNotFound { .. } => "OperatorConfigNotFound",
            Error::OperatorLoad { .. } => "OperatorLoadException",
            Error::OperatorNameMismatch { .. } => "OperatorNameMismatch",
            Error::UnknownOfficialOperator { .. } => "UnknownOfficialOperator",
            Error::InvalidSource { .. } => "InvalidSource",
            Error::OperatorInvocation { .. } => "OperatorInvocation",
            Error::InvalidDeploymentConfig { .. } => "InvalidDeploymentConfig",
            Error::DeploymentConfigNotFound { .. } => "DeploymentConfigNotFound",
            Error::InvalidSchema { .. } => "InvalidSchema",
            Error::Fetch { .. } => "FetchFailed",
            Error::RegistryCorrupt { .. } => "RegistryCorrupt",
            Error::RegistryWrite { .. } => "RegistryWrite",
            Error::HomeNotFound => "HomeNotFound",
            Error::Io { .. } => "IoError",
        }
    }

    /// Field errors carried by a failed spec validation, if any.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Error::InvalidDeploymentConfig { errors, .. } if !errors.is_empty() => Some(errors),
            _ => None,
        }
    }
}

/// Shorthand for a document-level failure with no field detail.
pub(crate) fn invalid_config(reason: impl Into<String>) -> Error {
    Error::InvalidDeploymentConfig {
        reason: reason.into(),
        errors: FieldErrors::new(),
    }
}
