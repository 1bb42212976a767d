//! `bentoctl operator ...`: manage the operator registry

use anyhow::{Context, Result};
use bentoctl_core::{BentoctlHome, OperatorRegistry, OperatorSource};
use clap::Parser;

use crate::report::operator_table;

#[derive(Debug, Parser, Clone)]
pub enum OperatorCommands {
    /// List installed operators
    #[clap(alias = "ls")]
    List {
        /// Print the registry as JSON
        #[clap(long)]
        json: bool,
    },

    /// Install an operator: official name[@version], local directory, GitHub owner/repo[:branch] or git URL
    #[clap(alias = "add")]
    Install {
        source: String,

        /// Branch or tag to clone (git sources only)
        #[clap(long)]
        branch: Option<String>,
    },

    /// Remove an operator from the registry
    #[clap(alias = "remove")]
    Uninstall {
        name: String,

        /// Also delete the operator's directory (never done for local operators)
        #[clap(long)]
        delete_from_disk: bool,
    },

    /// Fetch the latest code for an operator installed from a remote
    Update { name: String },
}

/// Handle operator commands
pub fn handle_operator_command(cmd: OperatorCommands, home: BentoctlHome) -> Result<()> {
    let mut registry = OperatorRegistry::open(home)?;

    match cmd {
        OperatorCommands::List { json } => {
            if json {
                let rendered = serde_json::to_string_pretty(registry.list())
                    .context("Failed to render operator list")?;
                println!("{rendered}");
            } else {
                print!("{}", operator_table(registry.list()));
            }
        }
        OperatorCommands::Install { source, branch } => {
            let source = OperatorSource::parse(&source, branch.as_deref())?;
            println!("📦 Installing operator from {}...", describe_source(&source));
            let name = registry.add(source)?;
            let record = registry.get(&name)?;
            println!("✅ Installed '{name}' at {}", record.path.display());
        }
        OperatorCommands::Uninstall {
            name,
            delete_from_disk,
        } => {
            let record = registry.remove(&name, delete_from_disk)?;
            if delete_from_disk && !record.origin.is_local() {
                println!("🗑️  Removed '{name}' and deleted {}", record.path.display());
            } else {
                println!("✅ Removed '{name}' (files kept at {})", record.path.display());
            }
        }
        OperatorCommands::Update { name } => {
            println!("🔄 Updating '{name}'...");
            registry.update(&name)?;
            println!("✅ '{name}' is up to date");
        }
    }
    Ok(())
}

fn describe_source(source: &OperatorSource) -> String {
    match source {
        OperatorSource::Path(path) => path.display().to_string(),
        OperatorSource::Official {
            name,
            version: Some(version),
        } => format!("official {name}@{version}"),
        OperatorSource::Official { name, version: None } => format!("official {name}"),
        OperatorSource::Git(git) => match &git.branch {
            Some(branch) => format!("{} ({branch})", git.url),
            None => git.url.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bentoctl_core::GitSource;
    use std::path::PathBuf;

    #[test]
    fn test_describe_source() {
        assert_eq!(
            describe_source(&OperatorSource::parse("aws-lambda@0.2.0", None).unwrap()),
            "official aws-lambda@0.2.0"
        );
        assert_eq!(
            describe_source(&OperatorSource::Git(GitSource::new(
                "https://github.com/acme/op.git",
                Some("dev")
            ))),
            "https://github.com/acme/op.git (dev)"
        );
        assert_eq!(
            describe_source(&OperatorSource::Path(PathBuf::from("/src/op"))),
            "/src/op"
        );
    }
}
