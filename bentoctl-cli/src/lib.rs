//! bentoctl command-line front-end
//!
//! Each command builds its own [`bentoctl_core::OperatorRegistry`] from the
//! resolved home directory; nothing is shared between invocations.

pub mod commands;
pub mod report;
