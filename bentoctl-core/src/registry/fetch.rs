//! Materializing remote operator code on disk

use std::ffi::OsString;
use std::path::Path;

use tracing::debug;

use super::source::GitSource;
use crate::error::{Error, Result};

/// Fetches a git source into a local directory
///
/// `dest` does not exist when `fetch` is called; on success it holds the
/// checked-out tree. Implementations must not touch anything outside `dest`.
pub trait SourceFetcher {
    fn fetch(&self, source: &GitSource, dest: &Path) -> Result<()>;
}

/// Shallow clones through the `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl GitCli {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn clone_args(source: &GitSource, dest: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["clone".into(), "--depth".into(), "1".into()];
        if let Some(branch) = &source.branch {
            args.push("--branch".into());
            args.push(branch.into());
        }
        args.push("--".into());
        args.push(source.url.as_str().into());
        args.push(dest.as_os_str().to_owned());
        args
    }
}

impl SourceFetcher for GitCli {
    fn fetch(&self, source: &GitSource, dest: &Path) -> Result<()> {
        let args = Self::clone_args(source, dest);
        debug!(program = %self.program, ?args, "running git");

        let output = duct::cmd(self.program.as_str(), &args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|e| Error::Fetch {
                url: source.url.clone(),
                reason: format!("failed to execute {}: {e}", self.program),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Fetch {
                url: source.url.clone(),
                reason: format!("git clone exited with {}: {}", output.status, stderr.trim()),
            });
        }
        Ok(())
    }
}
