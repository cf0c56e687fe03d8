//! pixfetch CLI application
//!
//! Command-line front end for the image loading engine: fetch images into
//! the cache with resize/crop options, manage the cache, and inspect
//! scheduler and cache statistics.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use pixfetch::cli::{handle_cache, handle_fetch, handle_stats, Cli, Commands};
use pixfetch::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(&cli);

    info!("pixfetch v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Fetch(args) => handle_fetch(args, &cli.global).await,
        Commands::Cache(args) => handle_cache(args, &cli.global).await,
        Commands::Stats(args) => handle_stats(args, &cli.global).await,
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli) {
    let log_level = cli.log_level();

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("pixfetch={}", log_level).parse().unwrap());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
