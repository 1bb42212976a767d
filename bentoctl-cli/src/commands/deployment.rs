//! Deployment lifecycle commands driven by a deployment config file

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use bentoctl_core::{BentoctlHome, DeploymentConfig, OperatorRegistry};
use clap::Parser;
use tracing::{debug, warn};

use crate::report::key_values;

pub const DEFAULT_CONFIG_FILE: &str = "deployment_config.yaml";

#[derive(Debug, Parser, Clone)]
pub enum DeploymentCommands {
    /// Check a deployment config against its operator's schema
    Validate {
        /// Deployment config file
        #[clap(short, long, default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// Create a deployment
    Deploy {
        #[clap(short, long, default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// Push a new bundle or spec to an existing deployment
    Update {
        #[clap(short, long, default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// Show the operator's view of a deployment
    Describe {
        #[clap(short, long, default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },

    /// Tear a deployment down
    Delete {
        #[clap(short, long, default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
    },
}

impl DeploymentCommands {
    fn file(&self) -> &Path {
        match self {
            DeploymentCommands::Validate { file }
            | DeploymentCommands::Deploy { file }
            | DeploymentCommands::Update { file }
            | DeploymentCommands::Describe { file }
            | DeploymentCommands::Delete { file } => file,
        }
    }
}

/// Handle deployment commands
pub fn handle_deployment_command(cmd: DeploymentCommands, home: BentoctlHome) -> Result<()> {
    let registry = OperatorRegistry::open(home)?;
    let config = DeploymentConfig::from_file(cmd.file(), &registry)?;
    let spec = config.validated_spec()?;

    let operator = config.operator();
    let name = config.deployment_name();

    match cmd {
        DeploymentCommands::Validate { file } => {
            println!(
                "✅ {} is valid for operator '{}'",
                file.display(),
                config.operator_name()
            );
            print!("{}", key_values(&spec));
        }
        DeploymentCommands::Deploy { .. } => {
            println!("🚀 Deploying '{name}' with operator '{}'...", operator.name());
            let artifact = operator.deploy(config.bundle_path(), name, &spec)?;
            remove_artifact(artifact, &disposable_roots(&registry, &config));
            println!("✅ Deployed '{name}'");
        }
        DeploymentCommands::Update { .. } => {
            println!("🔄 Updating '{name}' with operator '{}'...", operator.name());
            let artifact = operator.update(config.bundle_path(), name, &spec)?;
            remove_artifact(artifact, &disposable_roots(&registry, &config));
            println!("✅ Updated '{name}'");
        }
        DeploymentCommands::Describe { .. } => {
            let info = operator.describe(name, &spec)?;
            println!("📋 {name} ({})", operator.name());
            print!("{}", key_values(&info));
        }
        DeploymentCommands::Delete { .. } => {
            operator.delete(name, &spec)?;
            println!("🗑️  Deleted '{name}'");
        }
    }
    Ok(())
}

/// Directories an operator may leave build artifacts in
fn disposable_roots(registry: &OperatorRegistry, config: &DeploymentConfig) -> Vec<PathBuf> {
    vec![
        std::env::temp_dir(),
        registry.home().deployments_dir(),
        config.operator().path().to_path_buf(),
    ]
}

/// Remove a build artifact reported by an operator.
///
/// Paths outside `roots` are left alone. Failures are logged, never fatal:
/// the deployment itself already succeeded.
fn remove_artifact(artifact: Option<PathBuf>, roots: &[PathBuf]) {
    let Some(artifact) = artifact else {
        return;
    };
    let Ok(resolved) = fs::canonicalize(&artifact) else {
        debug!(path = %artifact.display(), "build artifact already gone");
        return;
    };
    let inside = roots.iter().any(|root| {
        fs::canonicalize(root)
            .map(|root| resolved.starts_with(&root) && resolved != root)
            .unwrap_or(false)
    });
    if !inside {
        warn!(path = %resolved.display(), "not removing build artifact outside temp, deployments or operator directories");
        return;
    }

    let result = if resolved.is_dir() {
        fs::remove_dir_all(&resolved)
    } else {
        fs::remove_file(&resolved)
    };
    match result {
        Ok(()) => debug!(path = %resolved.display(), "removed build artifact"),
        Err(e) => warn!(path = %resolved.display(), error = %e, "could not remove build artifact"),
    }
}
