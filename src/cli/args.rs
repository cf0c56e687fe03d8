//! Command-line argument parsing for pixfetch
//!
//! This module defines the CLI structure using clap derive macros:
//! fetching images into the cache, cache administration, and statistics.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// pixfetch - fetch, cache and transform images
#[derive(Parser, Debug)]
#[command(
    name = "pixfetch",
    version,
    about = "Fetch remote images, cache them locally, and resize/crop for display",
    long_about = "A concurrent image fetcher with a persistent disk cache and a deterministic
crop/fit/rotate pipeline. Fetch concurrency is bounded process-wide."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Parse arguments from the process environment
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level derived from the verbosity flags
    pub fn log_level(&self) -> &'static str {
        if self.global.very_verbose {
            "debug"
        } else if self.global.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch one or more images into the cache
    Fetch(FetchArgs),

    /// Cache management
    Cache(CacheArgs),

    /// Cache and scheduler statistics
    Stats(StatsArgs),
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Image URLs or file paths
    #[arg(required = true)]
    pub locators: Vec<String>,

    /// Target box width in pixels
    #[arg(short = 'W', long)]
    pub width: Option<f64>,

    /// Target box height in pixels
    #[arg(short = 'H', long)]
    pub height: Option<f64>,

    /// Scale to cover the box and crop (instead of fitting inside)
    #[arg(long)]
    pub cover: bool,

    /// Fill the box exactly, ignoring the aspect ratio
    #[arg(long)]
    pub stretch: bool,

    /// Never scale images up
    #[arg(long)]
    pub no_enlarge: bool,

    /// Crop anchor (e.g. "center", "top-left", "bottom-right")
    #[arg(long, value_name = "ANCHOR")]
    pub anchor: Option<String>,

    /// Auto-rotate landscape images ("none", "left" or "right")
    #[arg(long, value_name = "MODE")]
    pub landscape: Option<String>,

    /// Pixel density variant to request (1, 2 or 3)
    #[arg(long)]
    pub scale: Option<u8>,

    /// Skip the local cache entirely
    #[arg(long)]
    pub no_cache: bool,

    /// Extra HTTP header, "Name: value" (repeatable)
    #[arg(long = "header", value_name = "NAME: VALUE")]
    pub headers: Vec<String>,

    /// Write the resulting image(s) here (file for one input, directory for
    /// several)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Maximum concurrent fetches
    #[arg(short = 'j', long, value_name = "N")]
    pub concurrency: Option<usize>,
}

/// Arguments for the cache command
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache management actions
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Remove every cached variant of one locator
    Remove {
        /// Image URL or file path
        locator: String,
    },

    /// Delete every cached artifact
    Clear,

    /// Print the cache path an artifact for this locator would use
    Path {
        /// Image URL or file path
        locator: String,

        /// Thumbnail width
        #[arg(short = 'W', long)]
        width: Option<u32>,

        /// Thumbnail height
        #[arg(short = 'H', long)]
        height: Option<u32>,
    },
}

/// Arguments for the stats command
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Emit statistics as JSON
    #[arg(long)]
    pub json: bool,
}
