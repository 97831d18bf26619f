//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the marketmate binary.

mod catalog;
mod check;
mod commands;
mod simulate;

pub use catalog::show_catalog;
pub use check::check_config;
pub use commands::{Cli, Commands};
pub use simulate::run_simulation;
