//! Shared utilities: deferred value parsing and plan validation helpers.

pub mod tokens;
pub mod validation;

pub use tokens::{deferred_token, parse_binding, parse_block, parse_locale};
pub use validation::{validate_log_level, validate_unique_names};
