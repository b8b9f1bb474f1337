//! CLI-specific functionality for the dockhand binary
//!
//! Argument parsing and request body loading.

pub mod args;
pub mod input;

pub use args::{ActionConfig, Args, ExecutionMode};
pub use input::{InputError, RequestSource};
