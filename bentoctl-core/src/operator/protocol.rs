//! JSON exchanged with an operator process
//!
//! The request is written to the entrypoint's stdin; the action name is also
//! passed as its last argument. The response is whatever JSON the process
//! prints on stdout (empty output counts as `null`).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Deploy,
    Update,
    Describe,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Deploy => "deploy",
            Action::Update => "update",
            Action::Describe => "describe",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
pub struct InvocationRequest<'a> {
    pub action: Action,
    pub deployment_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<&'a Path>,
    pub spec: &'a Map<String, Value>,
}

/// deploy/update answer; a missing or null path means no artifact was produced
#[derive(Debug, Default, Deserialize)]
pub struct DeployResponse {
    #[serde(default)]
    pub artifact_path: Option<PathBuf>,
}
