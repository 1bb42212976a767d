//! bentoctl home directory resolution and skeleton
//!
//! The home holds the operator registry (`operators/`) and generated
//! deployment artifacts (`deployments/`). `BENTOCTL_HOME` overrides the
//! default `~/bentoctl`.

use std::fs;
use std::path::{Path, PathBuf};

use snafu::{OptionExt, ResultExt};
use tracing::debug;

use crate::error::{HomeNotFoundSnafu, IoSnafu, Result};

pub const HOME_ENV_VAR: &str = "BENTOCTL_HOME";
pub const DEFAULT_HOME_DIR: &str = "bentoctl";
pub const OPERATORS_DIR: &str = "operators";
pub const DEPLOYMENTS_DIR: &str = "deployments";
pub const REGISTRY_FILE: &str = "operator_list.json";

/// Resolved bentoctl home directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BentoctlHome {
    root: PathBuf,
}

impl BentoctlHome {
    /// Use an explicit root; `~` is expanded.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: expand_path(root.as_ref()),
        }
    }

    /// Resolve from an optional override, then `BENTOCTL_HOME`, then `~/bentoctl`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        if let Some(path) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
            return Ok(Self::new(PathBuf::from(path)));
        }
        let home = dirs::home_dir().context(HomeNotFoundSnafu)?;
        Ok(Self {
            root: home.join(DEFAULT_HOME_DIR),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn operators_dir(&self) -> PathBuf {
        self.root.join(OPERATORS_DIR)
    }

    pub fn deployments_dir(&self) -> PathBuf {
        self.root.join(DEPLOYMENTS_DIR)
    }

    pub fn registry_file(&self) -> PathBuf {
        self.operators_dir().join(REGISTRY_FILE)
    }

    /// Create `operators/` and `deployments/` if absent.
    ///
    /// Returns the directories that were newly created.
    pub fn ensure_skeleton(&self) -> Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for dir in [self.operators_dir(), self.deployments_dir()] {
            if create_directory(&dir)? {
                debug!(path = %dir.display(), "created home directory");
                created.push(dir);
            }
        }
        Ok(created)
    }
}

/// Expand a leading `~` to the user's home directory
fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(raw) if raw.starts_with('~') => PathBuf::from(shellexpand::tilde(raw).as_ref()),
        _ => path.to_path_buf(),
    }
}

/// Create a single directory, reporting whether it was newly created
fn create_directory(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path).context(IoSnafu { path })?;
    Ok(true)
}
