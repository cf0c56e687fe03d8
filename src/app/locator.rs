//! Source locator handling
//!
//! A locator is the opaque, comparable identifier for an image origin:
//! either a network URL or a local file reference. Locators are immutable
//! once a request starts; all cache keys derive from the locator string.

use std::fmt;
use std::path::{Path, PathBuf};

use url::Url;

use crate::errors::{LoadError, LoadResult};

/// Opaque identifier for an image origin
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceLocator {
    /// A remote image reachable over HTTP(S)
    Url(Url),
    /// A local file on disk
    File(PathBuf),
}

impl SourceLocator {
    /// Parse a locator from a string
    ///
    /// Accepts `http(s)://` URLs, `file://` URLs and bare filesystem paths.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidLocator` for empty input or malformed URLs.
    /// An empty locator is a caller contract violation and fails fast here,
    /// at the boundary, before any key derivation happens.
    pub fn parse(input: &str) -> LoadResult<Self> {
        if input.is_empty() {
            return Err(LoadError::InvalidLocator {
                reason: "locator must not be empty".to_string(),
            });
        }

        if input.starts_with("file://") {
            let url = Url::parse(input).map_err(|e| LoadError::InvalidLocator {
                reason: format!("{}: {}", input, e),
            })?;
            let path = url.to_file_path().map_err(|_| LoadError::InvalidLocator {
                reason: format!("{}: not a valid file URL", input),
            })?;
            return Ok(SourceLocator::File(path));
        }

        if input.contains("://") {
            let url = Url::parse(input).map_err(|e| LoadError::InvalidLocator {
                reason: format!("{}: {}", input, e),
            })?;
            return Ok(SourceLocator::Url(url));
        }

        Ok(SourceLocator::File(PathBuf::from(input)))
    }

    /// The locator for a local file path
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        SourceLocator::File(path.into())
    }

    /// True when this locator points at a local file
    pub fn is_file(&self) -> bool {
        matches!(self, SourceLocator::File(_))
    }

    /// The local path, when this is a file locator
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            SourceLocator::File(path) => Some(path),
            SourceLocator::Url(_) => None,
        }
    }

    /// The URL, when this is a network locator
    pub fn as_url(&self) -> Option<&Url> {
        match self {
            SourceLocator::Url(url) => Some(url),
            SourceLocator::File(_) => None,
        }
    }

    /// The trailing file name component, if any
    ///
    /// Used for density-marker discovery (`@2x` before the extension).
    pub fn file_name(&self) -> Option<String> {
        match self {
            SourceLocator::Url(url) => url
                .path_segments()
                .and_then(|segments| segments.last())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            SourceLocator::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }

    /// A sibling locator with a density marker inserted before the extension
    ///
    /// `photo.png` with marker `@2x` becomes `photo@2x.png`. Returns `None`
    /// when the file name cannot be derived or already carries a marker.
    /// Only file locators participate in variant discovery.
    pub fn with_density_marker(&self, marker: &str) -> Option<SourceLocator> {
        let path = self.as_path()?;
        let name = path.file_name()?.to_str()?;
        if name.contains("@2x") || name.contains("@3x") {
            return None;
        }

        let variant_name = match name.rfind('.') {
            Some(dot) => format!("{}{}{}", &name[..dot], marker, &name[dot..]),
            None => format!("{}{}", name, marker),
        };
        Some(SourceLocator::File(path.with_file_name(variant_name)))
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Url(url) => write!(f, "{}", url),
            SourceLocator::File(path) => write!(f, "{}", path.display()),
        }
    }
}
