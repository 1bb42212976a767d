use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::source::GitSource;

/// Where a registered operator came from; decides whether it can be updated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OperatorOrigin {
    Official {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
    },
    /// User-owned directory registered in place
    Local,
    Git {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch: Option<String>,
    },
}

impl OperatorOrigin {
    /// The remote to refresh from; `None` for local operators.
    pub fn remote(&self) -> Option<GitSource> {
        match self {
            OperatorOrigin::Official { url, branch } | OperatorOrigin::Git { url, branch } => {
                Some(GitSource::new(url.as_str(), branch.as_deref()))
            }
            OperatorOrigin::Local => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, OperatorOrigin::Local)
    }

    pub fn is_official(&self) -> bool {
        matches!(self, OperatorOrigin::Official { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperatorOrigin::Official { .. } => "official",
            OperatorOrigin::Local => "local",
            OperatorOrigin::Git { .. } => "git",
        }
    }
}

/// One catalog entry; the operator name is the catalog key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorRecord {
    pub path: PathBuf,
    pub origin: OperatorOrigin,
    /// Release version, for operators installed from a tagged release
    #[serde(default)]
    pub version: Option<String>,
}
