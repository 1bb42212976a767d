//! Operators: pluggable deployment backends
//!
//! An operator is a directory holding `operator_config.toml` plus whatever
//! code its entrypoint runs. The registry hands out [`OperatorHandle`]s; the
//! handle talks to the operator over stdin/stdout JSON, one process per action.

pub mod config;
mod handle;
pub mod protocol;

pub use config::{Entrypoint, OPERATOR_CONFIG_FILE, OperatorConfig, OperatorKind};
pub use handle::OperatorHandle;
pub use protocol::Action;
