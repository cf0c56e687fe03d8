//! Command handlers for the pixfetch CLI

use std::path::PathBuf;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tracing::info;

use crate::app::cache::CacheStats;
use crate::app::key::ScaleHint;
use crate::app::loader::Loader;
use crate::app::locator::SourceLocator;
use crate::app::request::{LoadCompletion, LoadOptions};
use crate::config::LoaderConfig;
use crate::errors::{AppError, Result};

use super::args::{CacheAction, CacheArgs, FetchArgs, GlobalArgs, StatsArgs};

/// Handle the fetch command
pub async fn handle_fetch(args: FetchArgs, global: &GlobalArgs) -> Result<()> {
    let mut config = build_config(global)?;
    if let Some(concurrency) = args.concurrency {
        config.max_concurrency = concurrency;
    }
    if args.no_cache {
        config.cache_enabled = false;
    }

    let loader = Loader::new(config).await?;
    let options = fetch_options(&loader, &args)?;

    let mut handles = Vec::new();
    for input in &args.locators {
        let locator = SourceLocator::parse(input)?;
        handles.push((input.clone(), loader.load(locator, options.clone())));
    }

    let completions =
        futures::future::join_all(handles.iter_mut().map(|(_, handle)| handle.completion())).await;

    let mut failures = 0;
    for ((input, _), completion) in handles.iter().zip(completions) {
        match completion {
            LoadCompletion::Delivered(delivery) => {
                println!(
                    "{}: {}x{}{}",
                    input,
                    delivery.final_size.0,
                    delivery.final_size.1,
                    if delivery.from_cache { " (cached)" } else { "" }
                );
                if let Some(output) = &args.output {
                    let path = output_path(output, input, args.locators.len());
                    delivery
                        .bitmap
                        .save(&path)
                        .map_err(|e| AppError::generic(format!("cannot save {}: {}", path.display(), e)))?;
                    info!("Saved {} to {}", input, path.display());
                }
            }
            LoadCompletion::Failed(error) => {
                eprintln!("{}: {}", input, error);
                failures += 1;
            }
            LoadCompletion::Cancelled => {
                eprintln!("{}: cancelled", input);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(AppError::generic(format!(
            "{}/{} fetches failed",
            failures,
            args.locators.len()
        )));
    }
    Ok(())
}

/// Handle the cache command
pub async fn handle_cache(args: CacheArgs, global: &GlobalArgs) -> Result<()> {
    let loader = Loader::new(build_config(global)?).await?;

    match args.action {
        CacheAction::Remove { locator } => {
            let locator = SourceLocator::parse(&locator)?;
            let removed = loader.remove_cached(&locator).await?;
            println!("Removed {} cached artifact(s) for {}", removed, locator);
        }
        CacheAction::Clear => {
            loader.clear_cache().await?;
            println!("Cache cleared");
        }
        CacheAction::Path {
            locator,
            width,
            height,
        } => {
            let locator = SourceLocator::parse(&locator)?;
            let thumbnail = match (width, height) {
                (Some(w), Some(h)) => Some((w, h)),
                (None, None) => None,
                _ => {
                    return Err(AppError::generic(
                        "thumbnail paths need both --width and --height",
                    ))
                }
            };
            let path = loader.cache_path(&locator, ScaleHint::Unspecified, thumbnail);
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Handle the stats command
pub async fn handle_stats(args: StatsArgs, global: &GlobalArgs) -> Result<()> {
    let loader = Loader::new(build_config(global)?).await?;
    let stats = StatsReport {
        cache: loader.cache_stats().await,
        max_concurrency: loader.max_concurrency().await,
        active_fetches: loader.active_count().await,
        total_fetches: loader.total_count().await,
    };

    if args.json {
        let rendered = serde_json::to_string_pretty(&stats)
            .map_err(|e| AppError::generic(format!("stats serialization failed: {}", e)))?;
        println!("{}", rendered);
    } else {
        println!("Cache root:      {}", stats.cache.cache_root.display());
        println!("Artifacts:       {}", stats.cache.artifact_count);
        println!("Total size:      {} bytes", stats.cache.total_bytes);
        println!("Max concurrency: {}", stats.max_concurrency);
        println!("Active fetches:  {}", stats.active_fetches);
        println!("Total fetches:   {}", stats.total_fetches);
    }
    Ok(())
}

/// Statistics output shape
#[derive(Debug, Serialize)]
struct StatsReport {
    cache: CacheStats,
    max_concurrency: usize,
    active_fetches: usize,
    total_fetches: usize,
}

/// Resolve configuration from the global flags
fn build_config(global: &GlobalArgs) -> Result<LoaderConfig> {
    let mut config = LoaderConfig::load_or_default(global.config.as_deref())?;
    if let Some(cache_dir) = &global.cache_dir {
        config.cache_root = Some(cache_dir.clone());
    }
    Ok(config)
}

/// Translate fetch flags into request options
fn fetch_options(loader: &Loader, args: &FetchArgs) -> Result<LoadOptions> {
    let mut options = loader.options();

    if args.width.is_some() || args.height.is_some() {
        options = options.with_target(args.width.unwrap_or(0.0), args.height.unwrap_or(0.0));
    }
    if args.cover {
        options.fit.fit_from_outside = true;
    }
    if args.stretch {
        options.fit.keep_aspect_ratio = false;
    }
    if args.no_enlarge {
        options.fit.allow_enlarge = false;
    }
    if let Some(anchor) = &args.anchor {
        options.fit.crop_anchor = anchor.parse().map_err(AppError::generic)?;
    }
    if let Some(landscape) = &args.landscape {
        options.fit.landscape_mode = landscape.parse().map_err(AppError::generic)?;
    }
    if let Some(scale) = args.scale {
        options.scale = match scale {
            1 => ScaleHint::X1,
            2 => ScaleHint::X2,
            3 => ScaleHint::X3,
            other => {
                return Err(AppError::generic(format!(
                    "unsupported scale {}; expected 1, 2 or 3",
                    other
                )))
            }
        };
    }
    if !args.headers.is_empty() {
        options.headers = Some(parse_headers(&args.headers)?);
    }

    Ok(options)
}

/// Parse repeated "Name: value" header flags
fn parse_headers(raw: &[String]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for entry in raw {
        let (name, value) = entry
            .split_once(':')
            .ok_or_else(|| AppError::generic(format!("malformed header: {}", entry)))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| AppError::generic(format!("bad header name in {:?}: {}", entry, e)))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| AppError::generic(format!("bad header value in {:?}: {}", entry, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Where to save one fetched image
fn output_path(output: &PathBuf, input: &str, input_count: usize) -> PathBuf {
    if input_count == 1 {
        return output.clone();
    }
    let name = input
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("image.png");
    output.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers =
            parse_headers(&["Authorization: Bearer token".to_string(), "X-Tag: a".to_string()])
                .unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer token");
        assert_eq!(headers.get("x-tag").unwrap(), "a");
    }

    #[test]
    fn test_parse_headers_rejects_malformed() {
        assert!(parse_headers(&["no-colon-here".to_string()]).is_err());
    }

    #[test]
    fn test_output_path_single_vs_many() {
        let output = PathBuf::from("/tmp/out.png");
        assert_eq!(
            output_path(&output, "https://example.com/a.jpg", 1),
            PathBuf::from("/tmp/out.png")
        );

        let dir = PathBuf::from("/tmp/out");
        assert_eq!(
            output_path(&dir, "https://example.com/a.jpg", 2),
            PathBuf::from("/tmp/out/a.jpg")
        );
    }
}
