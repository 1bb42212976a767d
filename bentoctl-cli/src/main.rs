use std::path::PathBuf;

use anyhow::Result;
use bentoctl_cli::commands::{
    DeploymentCommands, OperatorCommands, handle_deployment_command, handle_operator_command,
};
use bentoctl_core::BentoctlHome;
use bentoctl_core::home::HOME_ENV_VAR;
use clap::{Parser, Subcommand};

const LOG_ENV_VAR: &str = "BENTOCTL_LOG";

#[derive(Debug, Parser)]
#[clap(name = "bentoctl", version, about = "Deploy bentos through pluggable operators")]
struct Cli {
    /// bentoctl home directory (default: ~/bentoctl)
    #[clap(long, global = true, env = HOME_ENV_VAR)]
    home: Option<PathBuf>,

    /// Enable debug logging
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install, list, update and remove operators
    #[clap(subcommand)]
    Operator(OperatorCommands),

    #[clap(flatten)]
    Deployment(DeploymentCommands),
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or(LOG_ENV_VAR, default_filter))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let home = BentoctlHome::resolve(cli.home.as_deref())?;
    tracing::debug!(home = %home.root().display(), "using bentoctl home");

    match cli.command {
        Commands::Operator(cmd) => handle_operator_command(cmd, home),
        Commands::Deployment(cmd) => handle_deployment_command(cmd, home),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        match err.downcast_ref::<bentoctl_core::Error>() {
            Some(core) => {
                let mut message = format!("{}: {core}", core.kind());
                let mut cause = std::error::Error::source(core);
                while let Some(inner) = cause {
                    message.push_str(&format!(": {inner}"));
                    cause = inner.source();
                }
                eprintln!("❌ {message}");
            }
            None => eprintln!("❌ Error: {err:#}"),
        }
        std::process::exit(1);
    }
}
