pub mod deployment;
pub mod operator;

pub use deployment::{DeploymentCommands, handle_deployment_command};
pub use operator::{OperatorCommands, handle_operator_command};
