//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the storyteller binary.

mod commands;
mod generate;
mod list;
mod logging;

pub use commands::{Cli, Commands};
pub use generate::{generate_story, render_outcome, stage_message};
pub use list::{list_command, render_listing};
pub use logging::{init_tracing, log_directive};
