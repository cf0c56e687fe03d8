//! Command-line interface components
//!
//! This module contains CLI-specific code for the pixfetch binary:
//! argument parsing and command handlers.

pub mod args;
pub mod commands;

pub use args::{CacheAction, CacheArgs, Cli, Commands, FetchArgs, GlobalArgs, StatsArgs};
pub use commands::{handle_cache, handle_fetch, handle_stats};
