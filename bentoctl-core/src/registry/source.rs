//! Where operator code comes from
//!
//! User input such as `aws-lambda`, `aws-lambda@0.2.0`, `./my-operator`,
//! `bentoml/aws-lambda-deploy:main` or a full git URL is classified into an
//! [`OperatorSource`] before the registry touches the network or disk.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};

pub const GITHUB_BASE_URL: &str = "https://github.com";

/// Official operator name → GitHub `owner/repo`
pub const OFFICIAL_OPERATORS: &[(&str, &str)] = &[
    ("aws-lambda", "bentoml/aws-lambda-deploy"),
    ("aws-sagemaker", "bentoml/aws-sagemaker-deploy"),
    ("aws-ec2", "bentoml/aws-ec2-deploy"),
    ("azure-functions", "bentoml/azure-functions-deploy"),
    ("azure-container-instances", "bentoml/azure-container-instances-deploy"),
    ("google-cloud-run", "bentoml/google-cloud-run-deploy"),
    ("google-compute-engine", "bentoml/google-compute-engine-deploy"),
    ("heroku", "bentoml/heroku-deploy"),
];

pub fn official_repo(name: &str) -> Option<&'static str> {
    OFFICIAL_OPERATORS
        .iter()
        .find(|(official, _)| *official == name)
        .map(|(_, repo)| *repo)
}

fn invalid_source(source_ref: &str, reason: impl Into<String>) -> Error {
    Error::InvalidSource {
        source_ref: source_ref.to_string(),
        reason: reason.into(),
    }
}

/// A git remote plus an optional branch or tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    pub url: String,
    pub branch: Option<String>,
}

impl GitSource {
    pub fn new(url: impl Into<String>, branch: Option<&str>) -> Self {
        Self {
            url: url.into(),
            branch: branch.map(str::to_string),
        }
    }

    /// Clone URL for a GitHub `owner/repo`.
    pub fn github_repo(repo: &str, branch: Option<&str>) -> Self {
        Self::new(format!("{GITHUB_BASE_URL}/{repo}.git"), branch)
    }

    /// Parse `owner/repo[:branch]` shorthand.
    pub fn github(shorthand: &str) -> Result<Self> {
        let re = Regex::new(
            r"^(?P<owner>[A-Za-z0-9][A-Za-z0-9-]*)/(?P<repo>[A-Za-z0-9._-]+?)(?:\.git)?(?::(?P<branch>[^\s:]+))?$",
        )
        .map_err(|e| invalid_source(shorthand, e.to_string()))?;

        let caps = re
            .captures(shorthand.trim())
            .ok_or_else(|| invalid_source(shorthand, "expected GitHub shorthand 'owner/repo[:branch]'"))?;

        let repo = format!("{}/{}", &caps["owner"], &caps["repo"]);
        Ok(Self::github_repo(
            &repo,
            caps.name("branch").map(|m| m.as_str()),
        ))
    }
}

/// Classified install request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorSource {
    Path(PathBuf),
    Official {
        name: String,
        version: Option<semver::Version>,
    },
    Git(GitSource),
}

impl OperatorSource {
    /// Classify user input.
    ///
    /// Resolution order: an existing directory, a git URL, an official name
    /// (`name` or `name@X.Y.Z`), then GitHub shorthand. `branch` applies to
    /// git sources only.
    pub fn parse(input: &str, branch: Option<&str>) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(invalid_source(input, "empty operator source"));
        }

        let as_path = Path::new(input);
        if as_path.is_dir() {
            if branch.is_some() {
                return Err(invalid_source(input, "a branch cannot be used with a local path"));
            }
            return Ok(OperatorSource::Path(as_path.to_path_buf()));
        }

        if looks_like_git_url(input) {
            return Ok(OperatorSource::Git(GitSource::new(input, branch)));
        }

        let (name, version) = match input.split_once('@') {
            Some((name, version)) => (name, Some(version)),
            None => (input, None),
        };
        if official_repo(name).is_some() {
            if branch.is_some() {
                return Err(invalid_source(
                    input,
                    "official operators are pinned with 'name@version', not a branch",
                ));
            }
            let version = version
                .map(|v| parse_release_version(input, v))
                .transpose()?;
            return Ok(OperatorSource::Official {
                name: name.to_string(),
                version,
            });
        }

        if input.contains('/') {
            let mut source = GitSource::github(input)?;
            if let Some(branch) = branch {
                if source.branch.is_some() {
                    return Err(invalid_source(input, "branch given twice"));
                }
                source.branch = Some(branch.to_string());
            }
            return Ok(OperatorSource::Git(source));
        }

        if as_path.exists() {
            return Err(invalid_source(input, "path exists but is not a directory"));
        }
        Err(invalid_source(
            input,
            "not a local directory, official operator, GitHub repo or git URL",
        ))
    }
}

/// Accepts `1.2.3` and `v1.2.3`.
pub fn parse_release_version(source_ref: &str, version: &str) -> Result<semver::Version> {
    semver::Version::parse(version.trim().trim_start_matches('v'))
        .map_err(|e| invalid_source(source_ref, format!("invalid version '{version}': {e}")))
}

fn looks_like_git_url(input: &str) -> bool {
    input.contains("://") || input.starts_with("git@") || input.ends_with(".git")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_shorthand() {
        assert_eq!(
            GitSource::github("bentoml/aws-lambda-deploy").unwrap(),
            GitSource::new("https://github.com/bentoml/aws-lambda-deploy.git", None)
        );
        assert_eq!(
            GitSource::github("bentoml/aws-lambda-deploy:v0.2.0").unwrap(),
            GitSource::new("https://github.com/bentoml/aws-lambda-deploy.git", Some("v0.2.0"))
        );
        assert_eq!(
            GitSource::github("acme/op.git:feature/x").unwrap(),
            GitSource::new("https://github.com/acme/op.git", Some("feature/x"))
        );
        assert_eq!(
            GitSource::github("not a repo").unwrap_err().kind(),
            "InvalidSource"
        );
    }

    #[test]
    fn test_official_lookup() {
        assert_eq!(official_repo("aws-lambda"), Some("bentoml/aws-lambda-deploy"));
        assert_eq!(official_repo("digital-ocean"), None);
    }

    #[test]
    fn test_parse_official_with_version() {
        assert_eq!(
            OperatorSource::parse("aws-lambda@v0.2.1", None).unwrap(),
            OperatorSource::Official {
                name: "aws-lambda".into(),
                version: Some(semver::Version::new(0, 2, 1)),
            }
        );
        assert_eq!(
            OperatorSource::parse("heroku", None).unwrap(),
            OperatorSource::Official {
                name: "heroku".into(),
                version: None
            }
        );
        assert!(OperatorSource::parse("heroku@latest", None).is_err());
        assert!(OperatorSource::parse("heroku", Some("main")).is_err());
    }

    #[test]
    fn test_parse_git_and_github() {
        assert_eq!(
            OperatorSource::parse("https://git.example.com/ops/op.git", Some("main")).unwrap(),
            OperatorSource::Git(GitSource::new("https://git.example.com/ops/op.git", Some("main")))
        );
        assert_eq!(
            OperatorSource::parse("acme/custom-op", Some("dev")).unwrap(),
            OperatorSource::Git(GitSource::new("https://github.com/acme/custom-op.git", Some("dev")))
        );
        assert!(OperatorSource::parse("acme/custom-op:dev", Some("main")).is_err());
    }

    #[test]
    fn test_parse_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().to_str().unwrap();
        assert_eq!(
            OperatorSource::parse(input, None).unwrap(),
            OperatorSource::Path(dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_parse_garbage() {
        let err = OperatorSource::parse("definitely-not-an-operator", None).unwrap_err();
        assert_eq!(err.kind(), "InvalidSource");
    }
}
