//! Operator parameter schemas
//!
//! Operators declare their accepted spec fields as data: a mapping from field
//! name to a rule object (`type`, `required`, `default`, `coerce`, ...), with
//! `dict` and `list` rules nesting further rules. The pipeline is:
//!
//! 1. [`remove_help_message`] strips presentation-only `help_message` keys
//! 2. [`Schema::parse`] compiles the cleaned data into typed [`Rule`]s,
//!    rejecting unknown rule keys
//! 3. [`Schema::validate`] checks a spec mapping, filling defaults and
//!    running coercions

mod clean;
mod rule;
mod validate;

pub use clean::{HELP_MESSAGE_KEY, remove_help_message};
pub use rule::{Coercion, Rule, ScalarType, Schema, Shape};
