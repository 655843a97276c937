//! Post-processing for chapter image URL lists.
//!
//! [`ImagePipeline::process`] applies, in order:
//!
//! 1. **Prefix join** - lists shaped `[prefix, relative, relative, ...]` become full URLs
//! 2. **Dead-node repair** - rewrites hosts of known unreachable CDN nodes
//! 3. **Oversized slicing** - replaces very tall images with cropped proxy URLs
//!
//! Slicing always sees the repaired URL.
//!
//! # Examples
//!
//! ```rust
//! use hondana::images::ImagePipeline;
//!
//! let pipeline = ImagePipeline::mangapark();
//! let urls = pipeline.process(vec![
//!     "https://k03.mbwbm.org/media/a/1.jpg".to_string(),
//! ]);
//! assert_eq!(urls, vec!["https://n03.mbwbm.org/media/a/1.jpg"]);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::net::{is_absolute, join_url};

/// Extensions that mark a URL as a complete image rather than a path prefix.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp"];

/// `..._{width}_{height}_{size}.{ext}`
static DIMENSIONS: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"_(\d+)_(\d+)_(\d+)\.[A-Za-z0-9]+$").ok());

/// Lowercased file extension of a URL, ignoring query and fragment.
///
/// ```rust
/// use hondana::images::extract_extension;
///
/// assert_eq!(extract_extension("https://x.org/a/B.JPG?w=1"), Some("jpg".to_string()));
/// assert_eq!(extract_extension("https://x.org/data/abc"), None);
/// ```
pub fn extract_extension(url: &str) -> Option<String> {
    let clean_url = url.split('?').next()?.split('#').next()?;
    let file = clean_url.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 10).then(|| ext.to_lowercase())
}

fn has_image_extension(url: &str) -> bool {
    extract_extension(url).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Joins `[prefix, relative...]` lists; anything else passes through.
///
/// The first element counts as a prefix only when it is absolute, has no
/// image extension and the second element is relative.
///
/// ```rust
/// use hondana::images::join_prefixed;
///
/// let joined = join_prefixed(vec![
///     "https://uploads.mangadex.org/data/abc".into(),
///     "1-x.png".into(),
///     "2-y.png".into(),
/// ]);
/// assert_eq!(joined[0], "https://uploads.mangadex.org/data/abc/1-x.png");
/// assert_eq!(joined.len(), 2);
/// ```
pub fn join_prefixed(urls: Vec<String>) -> Vec<String> {
    let urls: Vec<String> = urls
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    let is_prefixed = match urls.as_slice() {
        [first, second, ..] => {
            is_absolute(first) && !has_image_extension(first) && !is_absolute(second)
        }
        _ => false,
    };

    if !is_prefixed {
        return urls;
    }

    let prefix = &urls[0];
    urls[1..].iter().map(|path| join_url(prefix, path)).collect()
}

/// A regex rewrite for URLs pointing at unreachable image nodes.
#[derive(Debug, Clone)]
pub struct DeadNodeRule {
    pattern: Regex,
    replacement: String,
}

impl DeadNodeRule {
    /// # Errors
    ///
    /// [`Error::Config`] when `pattern` is not a valid regex.
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::config(format!("invalid dead-node pattern: {}", e)))?;
        Ok(Self {
            pattern,
            replacement: replacement.into(),
        })
    }

    /// MangaPark's `k<digits>.mb*` nodes, served again from `n<digits>.mb*`.
    pub fn mangapark() -> Option<Self> {
        Self::new(r"^(https?://)k(\d+)\.mb", "${1}n${2}.mb").ok()
    }

    pub fn repair(&self, url: &str) -> String {
        self.pattern
            .replace(url, self.replacement.as_str())
            .into_owned()
    }
}

/// Settings for cutting tall images into proxy-cropped slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceConfig {
    /// Tallest image passed through untouched
    pub max_height: u32,
    /// Image proxy base, e.g. `https://wsrv.nl/`
    pub proxy: String,
    /// Forced output format of every slice
    pub output: String,
    /// Images needing more slices than this are assumed to carry a bogus
    /// height and pass through untouched
    pub max_slices: u32,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            max_height: 3000,
            proxy: "https://wsrv.nl/".to_string(),
            output: "jpg".to_string(),
            max_slices: 64,
        }
    }
}

impl SliceConfig {
    /// Width and height encoded in the file name, if any.
    pub fn dimensions(url: &str) -> Option<(u32, u32)> {
        let path = url.split(['?', '#']).next()?;
        let captures = DIMENSIONS.as_ref()?.captures(path)?;
        let width = captures.get(1)?.as_str().parse().ok()?;
        let height = captures.get(2)?.as_str().parse().ok()?;
        Some((width, height))
    }

    /// The URLs replacing `url`: itself when it fits, otherwise one cropped
    /// proxy URL per slice, top to bottom.
    pub fn slice(&self, url: &str) -> Vec<String> {
        let Some((width, height)) = Self::dimensions(url) else {
            return vec![url.to_string()];
        };
        if self.max_height == 0 || height <= self.max_height {
            return vec![url.to_string()];
        }

        let count = height.div_ceil(self.max_height);
        if count > self.max_slices {
            debug!(url, height, count, "Implausible image height, not slicing");
            return vec![url.to_string()];
        }

        let encoded = urlencoding::encode(url);
        (0..count)
            .map(|i| {
                let top = i * self.max_height;
                let slice_height = self.max_height.min(height - top);
                format!(
                    "{}?url={}&cx=0&cy={}&cw={}&ch={}&output={}",
                    self.proxy, encoded, top, width, slice_height, self.output
                )
            })
            .collect()
    }
}

/// Ordered chain of image URL transforms for one source.
#[derive(Debug, Clone, Default)]
pub struct ImagePipeline {
    pub repair: Option<DeadNodeRule>,
    pub slicing: Option<SliceConfig>,
}

impl ImagePipeline {
    /// Prefix join only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dead-node repair and slicing with default settings.
    pub fn mangapark() -> Self {
        Self {
            repair: DeadNodeRule::mangapark(),
            slicing: Some(SliceConfig::default()),
        }
    }

    pub fn with_repair(mut self, rule: DeadNodeRule) -> Self {
        self.repair = Some(rule);
        self
    }

    pub fn with_slicing(mut self, config: SliceConfig) -> Self {
        self.slicing = Some(config);
        self
    }

    pub fn process(&self, urls: Vec<String>) -> Vec<String> {
        join_prefixed(urls)
            .into_iter()
            .map(|url| match &self.repair {
                Some(rule) => rule.repair(&url),
                None => url,
            })
            .flat_map(|url| match &self.slicing {
                Some(config) => config.slice(&url),
                None => vec![url],
            })
            .collect()
    }
}
