#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bentoctl_core::error::Error;
use bentoctl_core::operator::OPERATOR_CONFIG_FILE;
use bentoctl_core::{BentoctlHome, GitSource, OperatorRegistry, SourceFetcher};

pub const REGION_SCHEMA: &str = r#"
[schema.region]
type = "string"
required = true
help_message = "Region to deploy into"
"#;

/// Operator script: echoes a deploy artifact, the describe request, nothing on delete
pub const ECHO_SCRIPT: &str = r#"input=$(cat)
case "$1" in
  deploy|update) echo "{\"artifact_path\": \"$PWD/build-$1\"}" ;;
  describe) echo "{\"request\": $input, \"revision\": \"$(cat revision 2>/dev/null)\"}" ;;
  delete) ;;
esac
"#;

pub fn operator_config(name: &str, extra: &str) -> String {
    format!("name = \"{name}\"\nentrypoint = [\"sh\", \"operator.sh\"]\n{extra}\n{REGION_SCHEMA}")
}

/// Write an operator directory at `dir`.
pub fn write_operator(dir: &Path, name: &str, extra: &str, revision: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(OPERATOR_CONFIG_FILE), operator_config(name, extra)).unwrap();
    fs::write(dir.join("operator.sh"), ECHO_SCRIPT).unwrap();
    fs::write(dir.join("revision"), revision).unwrap();
}

#[derive(Debug, Default)]
pub struct FakeRemote {
    /// Declared operator name written into every checkout
    pub name: String,
    pub revision: String,
    pub fail: bool,
    pub calls: Vec<GitSource>,
}

/// Fetcher that "clones" by writing an operator tree into the destination
#[derive(Debug, Clone, Default)]
pub struct FakeFetcher(pub Rc<RefCell<FakeRemote>>);

impl FakeFetcher {
    pub fn serving(name: &str, revision: &str) -> Self {
        Self(Rc::new(RefCell::new(FakeRemote {
            name: name.to_string(),
            revision: revision.to_string(),
            ..FakeRemote::default()
        })))
    }

    pub fn set_revision(&self, revision: &str) {
        self.0.borrow_mut().revision = revision.to_string();
    }

    pub fn set_name(&self, name: &str) {
        self.0.borrow_mut().name = name.to_string();
    }

    pub fn fail_next(&self, fail: bool) {
        self.0.borrow_mut().fail = fail;
    }

    pub fn calls(&self) -> Vec<GitSource> {
        self.0.borrow().calls.clone()
    }
}

impl SourceFetcher for FakeFetcher {
    fn fetch(&self, source: &GitSource, dest: &Path) -> bentoctl_core::Result<()> {
        let mut remote = self.0.borrow_mut();
        remote.calls.push(source.clone());
        if remote.fail {
            // a half-written clone, like git leaves behind when killed
            fs::create_dir_all(dest).unwrap();
            fs::write(dest.join("partial"), "x").unwrap();
            return Err(Error::Fetch {
                url: source.url.clone(),
                reason: "simulated network failure".to_string(),
            });
        }
        write_operator(dest, &remote.name, "", &remote.revision);
        Ok(())
    }
}

pub struct TestHome {
    pub tmp: tempfile::TempDir,
    pub home: BentoctlHome,
}

impl TestHome {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let home = BentoctlHome::new(tmp.path().join("bentoctl"));
        Self { tmp, home }
    }

    pub fn registry(&self, fetcher: &FakeFetcher) -> OperatorRegistry {
        OperatorRegistry::with_fetcher(self.home.clone(), fetcher.clone()).unwrap()
    }

    /// Path for scratch content outside the bentoctl home
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.tmp.path().join(name)
    }
}

/// Every file under `dir`, relative path → contents
pub fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut files = Vec::new();
    collect(dir, dir, &mut files);
    files.sort();
    files
}

fn collect(root: &Path, dir: &Path, files: &mut Vec<(PathBuf, Vec<u8>)>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let relative = path.strip_prefix(root).unwrap().to_path_buf();
            files.push((relative, fs::read(&path).unwrap()));
        }
    }
}

pub fn staging_dirs(home: &BentoctlHome) -> Vec<PathBuf> {
    fs::read_dir(home.operators_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(".staging-"))
        })
        .collect()
}
