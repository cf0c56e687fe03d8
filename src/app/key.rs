//! Cache key derivation
//!
//! Keys are derived, stable file names: the md5 digest of the locator string,
//! followed by a density suffix for non-1x scales and a `_thumb_<w>x<h>`
//! suffix for thumbnail variants. Derivation is pure and deterministic, and
//! distinct (scale, thumbnail) pairs for one locator never collide. The
//! locator digest doubles as the prefix the cache store scans when removing
//! every variant of one locator.

use std::fmt;

use crate::app::locator::SourceLocator;
use crate::constants::files;

/// Pixel-density multiplier variant of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScaleHint {
    /// Infer the density from the locator's file name marker
    #[default]
    Unspecified,
    /// Standard density
    X1,
    /// Double density (`@2x`)
    X2,
    /// Triple density (`@3x`)
    X3,
}

impl ScaleHint {
    /// Density multiplier for this scale
    pub fn multiplier(&self) -> u32 {
        match self {
            ScaleHint::Unspecified | ScaleHint::X1 => 1,
            ScaleHint::X2 => 2,
            ScaleHint::X3 => 3,
        }
    }

    /// Detect the density marker in a file name
    ///
    /// Matches the platform discovery convention of an `@2x`/`@3x` marker
    /// immediately before the extension. Names without a marker are 1x.
    pub fn from_name(name: &str) -> ScaleHint {
        let stem = match name.rfind('.') {
            Some(dot) => &name[..dot],
            None => name,
        };
        if stem.ends_with("@3x") {
            ScaleHint::X3
        } else if stem.ends_with("@2x") {
            ScaleHint::X2
        } else {
            ScaleHint::X1
        }
    }

    /// Resolve `Unspecified` against the locator's file name
    pub fn resolve(self, locator: &SourceLocator) -> ScaleHint {
        match self {
            ScaleHint::Unspecified => locator
                .file_name()
                .map(|name| ScaleHint::from_name(&name))
                .unwrap_or(ScaleHint::X1),
            resolved => resolved,
        }
    }

    /// Key suffix for this scale; 1x is unmarked
    fn key_suffix(&self) -> &'static str {
        match self {
            ScaleHint::Unspecified | ScaleHint::X1 => "",
            ScaleHint::X2 => "@2x",
            ScaleHint::X3 => "@3x",
        }
    }
}

/// Derived identifier of one cached artifact
///
/// The name is a flat file name inside the cache root; the prefix is shared
/// by every variant of one locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    prefix: String,
    name: String,
}

impl CacheKey {
    /// The full derived file name
    pub fn file_name(&self) -> &str {
        &self.name
    }

    /// The locator-derived prefix shared by all variants of one source
    pub fn locator_prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The collision-resistant prefix every key derived from `locator` carries
pub fn locator_prefix(locator: &SourceLocator) -> String {
    format!("{:x}", md5::compute(locator.to_string().as_bytes()))
}

/// Derive the cache key for a locator, scale and optional thumbnail size
///
/// Pure and deterministic. The thumbnail suffix embeds width and height
/// discretely so two aspect ratios with the same area never collide.
pub fn derive_key(
    locator: &SourceLocator,
    scale: ScaleHint,
    thumbnail: Option<(u32, u32)>,
) -> CacheKey {
    debug_assert!(
        !locator.to_string().is_empty(),
        "empty locators are rejected at the request boundary"
    );

    let prefix = locator_prefix(locator);
    let mut name = prefix.clone();
    name.push_str(scale.resolve(locator).key_suffix());
    if let Some((width, height)) = thumbnail {
        name.push_str(files::THUMB_MARKER);
        name.push_str(&format!("{}x{}", width, height));
    }

    CacheKey { prefix, name }
}
