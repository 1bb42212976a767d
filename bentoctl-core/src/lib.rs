//! bentoctl core: operator registry and deployment config resolution
//!
//! - [`registry::OperatorRegistry`]: persistent catalog of installed operators
//!   and the install/update/remove lifecycle
//! - [`operator::OperatorHandle`]: a loaded operator and its deploy, update,
//!   describe and delete actions
//! - [`schema`]: operator parameter schemas (help stripping, compilation,
//!   validation)
//! - [`deployment::DeploymentConfig`]: a user deployment document bound to a
//!   registered operator
//!
//! Nothing here keeps global state. Callers build one [`home::BentoctlHome`]
//! and one registry per command and pass them down.

pub mod deployment;
pub mod error;
pub mod home;
pub mod operator;
pub mod registry;
pub mod schema;

pub use deployment::DeploymentConfig;
pub use error::{Error, FieldErrors, Result};
pub use home::BentoctlHome;
pub use operator::{OperatorHandle, OperatorKind};
pub use registry::{GitSource, OperatorOrigin, OperatorRecord, OperatorRegistry, OperatorSource, SourceFetcher};
