//! Operator registry
//!
//! A single JSON file (`<home>/operators/operator_list.json`) maps operator
//! names to where their code lives and where it came from. The registry reads
//! it once at construction and rewrites it whole after every mutation.
//!
//! Remote code is always fetched into a `.staging-*` directory next to the
//! installed operators first, so a failed clone never touches installed code.
//! There is no file locking: one writer at a time.

mod fetch;
mod record;
mod source;

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use snafu::{OptionExt, ResultExt, ensure};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::error::{
    Error, IoSnafu, OperatorExistsSnafu, OperatorIsLocalSnafu, OperatorNameMismatchSnafu,
    OperatorNotFoundSnafu, OperatorPathInUseSnafu, RegistryCorruptSnafu, RegistryWriteSnafu, Result,
    UnknownOfficialOperatorSnafu,
};
use crate::home::BentoctlHome;
use crate::operator::OperatorHandle;

pub use fetch::{GitCli, SourceFetcher};
pub use record::{OperatorOrigin, OperatorRecord};
pub use source::{
    GITHUB_BASE_URL, GitSource, OFFICIAL_OPERATORS, OperatorSource, official_repo,
    parse_release_version,
};

const STAGING_PREFIX: &str = ".staging-";

pub struct OperatorRegistry {
    home: BentoctlHome,
    operators: BTreeMap<String, OperatorRecord>,
    fetcher: Box<dyn SourceFetcher>,
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("home", &self.home)
            .field("operators", &self.operators)
            .finish_non_exhaustive()
    }
}

impl OperatorRegistry {
    /// Open the registry under `home`, cloning remotes with the `git` binary.
    pub fn open(home: BentoctlHome) -> Result<Self> {
        Self::with_fetcher(home, GitCli::default())
    }

    /// Open the registry with a custom fetcher.
    ///
    /// Creates the home skeleton and an empty registry file on first use.
    pub fn with_fetcher(home: BentoctlHome, fetcher: impl SourceFetcher + 'static) -> Result<Self> {
        home.ensure_skeleton()?;
        let registry_file = home.registry_file();

        let mut registry = Self {
            home,
            operators: BTreeMap::new(),
            fetcher: Box::new(fetcher),
        };

        if registry_file.exists() {
            let content = fs::read(&registry_file).context(IoSnafu {
                path: &registry_file,
            })?;
            registry.operators = serde_json::from_slice(&content).context(RegistryCorruptSnafu {
                path: &registry_file,
            })?;
            debug!(count = registry.operators.len(), "loaded operator registry");
        } else {
            registry.persist()?;
        }
        Ok(registry)
    }

    pub fn home(&self) -> &BentoctlHome {
        &self.home
    }

    /// Every registered operator, as read from disk
    pub fn list(&self) -> &BTreeMap<String, OperatorRecord> {
        &self.operators
    }

    pub fn get(&self, name: &str) -> Result<&OperatorRecord> {
        self.operators
            .get(name)
            .context(OperatorNotFoundSnafu { name })
    }

    /// Load a fresh handle for a registered operator.
    pub fn load(&self, name: &str) -> Result<OperatorHandle> {
        let record = self.get(name)?;
        OperatorHandle::load(&record.path)
    }

    /// Install from any classified source.
    pub fn add(&mut self, source: OperatorSource) -> Result<String> {
        match source {
            OperatorSource::Path(path) => self.add_from_path(&path),
            OperatorSource::Official { name, version } => {
                let version = version.map(|v| v.to_string());
                self.add_from_official(&name, version.as_deref())
            }
            OperatorSource::Git(git) => self.add_from_git(&git.url, git.branch.as_deref()),
        }
    }

    /// Register a user-owned directory in place.
    ///
    /// The name is whatever the directory's config declares.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn add_from_path(&mut self, path: &Path) -> Result<String> {
        let handle = OperatorHandle::load(path)?;
        let name = handle.name().to_string();
        ensure!(
            !self.operators.contains_key(&name),
            OperatorExistsSnafu { name: &name }
        );

        let record = OperatorRecord {
            path: handle.path().to_path_buf(),
            origin: OperatorOrigin::Local,
            version: None,
        };
        self.insert_record(&name, record)?;
        self.sweep_staging();
        info!(operator = %name, "registered local operator");
        Ok(name)
    }

    /// Install an official operator, optionally pinned to a release.
    #[instrument(skip(self))]
    pub fn add_from_official(&mut self, name: &str, version: Option<&str>) -> Result<String> {
        let repo = official_repo(name).context(UnknownOfficialOperatorSnafu { name })?;
        let version = version
            .map(|v| parse_release_version(name, v))
            .transpose()?;

        let tag = version.as_ref().map(|v| format!("v{v}"));
        let source = GitSource::github_repo(repo, tag.as_deref());
        let origin = OperatorOrigin::Official {
            url: source.url.clone(),
            branch: source.branch.clone(),
        };
        self.install_remote(&source, Some(name), origin, version.map(|v| v.to_string()))
    }

    /// Install from a git remote. The name comes from the fetched config.
    #[instrument(skip(self))]
    pub fn add_from_git(&mut self, url: &str, branch: Option<&str>) -> Result<String> {
        let source = GitSource::new(url, branch);
        let origin = OperatorOrigin::Git {
            url: source.url.clone(),
            branch: source.branch.clone(),
        };
        self.install_remote(&source, None, origin, None)
    }

    /// Install from `owner/repo[:branch]` on GitHub.
    pub fn add_from_github(&mut self, shorthand: &str) -> Result<String> {
        let source = GitSource::github(shorthand)?;
        self.add_from_git(&source.url, source.branch.as_deref())
    }

    /// Refresh a remote operator's code in place.
    ///
    /// The new tree is fetched and loaded in staging before the live
    /// directory is touched; on any failure the installed code and the
    /// catalog stay exactly as they were.
    #[instrument(skip(self))]
    pub fn update(&mut self, name: &str) -> Result<()> {
        let record = self.get(name)?.clone();
        let source = record
            .origin
            .remote()
            .context(OperatorIsLocalSnafu { name })?;

        let staging = self.staging_dir()?;
        let checkout = staging.path().join("checkout");
        info!(url = %source.url, branch = ?source.branch, "fetching operator update");
        self.fetcher.fetch(&source, &checkout)?;

        let handle = OperatorHandle::load(&checkout)?;
        ensure!(
            handle.name() == name,
            OperatorNameMismatchSnafu {
                expected: name,
                declared: handle.name(),
            }
        );

        swap_directories(&record.path, &checkout, &staging.path().join("previous"))?;
        drop(staging);
        self.sweep_staging();
        info!(operator = %name, "updated operator");
        Ok(())
    }

    /// Drop a catalog entry, deleting its directory only when asked.
    ///
    /// Local operators live in user-owned directories; those are never
    /// deleted, whatever `delete_from_disk` says.
    #[instrument(skip(self))]
    pub fn remove(&mut self, name: &str, delete_from_disk: bool) -> Result<OperatorRecord> {
        let record = self
            .operators
            .remove(name)
            .context(OperatorNotFoundSnafu { name })?;

        if let Err(e) = self.persist() {
            self.operators.insert(name.to_string(), record);
            return Err(e);
        }

        if delete_from_disk && record.origin.is_local() {
            warn!(operator = %name, path = %record.path.display(), "not deleting user-owned operator directory");
        } else if delete_from_disk && record.path.exists() {
            fs::remove_dir_all(&record.path).context(IoSnafu { path: &record.path })?;
            info!(operator = %name, path = %record.path.display(), "deleted operator files");
        }
        Ok(record)
    }

    fn install_remote(
        &mut self,
        source: &GitSource,
        expected_name: Option<&str>,
        origin: OperatorOrigin,
        version: Option<String>,
    ) -> Result<String> {
        // fail before cloning when the name is known up front
        if let Some(expected) = expected_name {
            ensure!(
                !self.operators.contains_key(expected),
                OperatorExistsSnafu { name: expected }
            );
            self.ensure_path_unowned(&self.home.operators_dir().join(expected))?;
        }

        let staging = self.staging_dir()?;
        let checkout = staging.path().join("checkout");
        info!(url = %source.url, branch = ?source.branch, "fetching operator");
        self.fetcher.fetch(source, &checkout)?;

        let handle = OperatorHandle::load(&checkout)?;
        let name = handle.name().to_string();
        if let Some(expected) = expected_name {
            ensure!(
                name == expected,
                OperatorNameMismatchSnafu {
                    expected,
                    declared: &name,
                }
            );
        }
        ensure!(
            !self.operators.contains_key(&name),
            OperatorExistsSnafu { name: &name }
        );

        let target = self.home.operators_dir().join(&name);
        self.ensure_path_unowned(&target)?;
        if target.exists() {
            warn!(path = %target.display(), "replacing unregistered operator directory");
            fs::remove_dir_all(&target).context(IoSnafu { path: &target })?;
        }
        fs::rename(&checkout, &target).context(IoSnafu { path: &target })?;

        let record = OperatorRecord {
            path: target.clone(),
            origin,
            version,
        };
        if let Err(e) = self.insert_record(&name, record) {
            if let Err(cleanup) = fs::remove_dir_all(&target) {
                warn!(path = %target.display(), error = %cleanup, "could not roll back operator directory");
            }
            return Err(e);
        }

        drop(staging);
        self.sweep_staging();
        info!(operator = %name, "installed operator");
        Ok(name)
    }

    /// Fail if any registered operator lives in `dir`.
    fn ensure_path_unowned(&self, dir: &Path) -> Result<()> {
        let canonical = fs::canonicalize(dir).ok();
        let owner = self.operators.iter().find(|(_, record)| {
            record.path == dir || canonical.as_deref().is_some_and(|c| record.path == c)
        });
        match owner {
            Some((owner, _)) => OperatorPathInUseSnafu { path: dir, owner }.fail(),
            None => Ok(()),
        }
    }

    fn insert_record(&mut self, name: &str, record: OperatorRecord) -> Result<()> {
        self.operators.insert(name.to_string(), record);
        if let Err(e) = self.persist() {
            self.operators.remove(name);
            return Err(e);
        }
        Ok(())
    }

    fn staging_dir(&self) -> Result<TempDir> {
        let operators_dir = self.home.operators_dir();
        tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&operators_dir)
            .context(IoSnafu {
                path: &operators_dir,
            })
    }

    /// Remove staging directories left behind by interrupted runs.
    fn sweep_staging(&self) {
        let operators_dir = self.home.operators_dir();
        let Ok(entries) = fs::read_dir(&operators_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let is_staging = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(STAGING_PREFIX));
            if !is_staging {
                continue;
            }
            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match removed {
                Ok(()) => debug!(path = %path.display(), "removed stale staging entry"),
                Err(e) => warn!(path = %path.display(), error = %e, "could not remove staging entry"),
            }
        }
    }

    /// Rewrite the whole registry file through a temp file + rename.
    fn persist(&self) -> Result<()> {
        let path = self.home.registry_file();
        let content = serde_json::to_vec_pretty(&self.operators)
            .map_err(std::io::Error::other)
            .context(RegistryWriteSnafu { path: &path })?;

        let mut tmp = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(self.home.operators_dir())
            .context(RegistryWriteSnafu { path: &path })?;
        tmp.write_all(&content)
            .and_then(|()| tmp.as_file().sync_all())
            .context(RegistryWriteSnafu { path: &path })?;
        tmp.persist(&path)
            .map_err(|e| e.error)
            .context(RegistryWriteSnafu { path: &path })?;
        Ok(())
    }
}

/// Put `replacement` at `live`, parking the old tree at `backup`.
///
/// If the second rename fails the old tree is moved back.
fn swap_directories(live: &Path, replacement: &Path, backup: &Path) -> Result<()> {
    let had_live = live.exists();
    if had_live {
        fs::rename(live, backup).context(IoSnafu { path: live })?;
    }
    if let Err(source) = fs::rename(replacement, live) {
        if had_live {
            if let Err(restore) = fs::rename(backup, live) {
                warn!(path = %live.display(), error = %restore, "could not restore operator directory");
            }
        }
        return Err(Error::Io {
            path: live.to_path_buf(),
            source,
        });
    }
    Ok(())
}
