//! Provider adapters with conditional compilation support.
//!
//! Each bundled adapter is protected by a feature flag so minimal builds only
//! include the providers they need.
//!
//! # Feature Flags
//!
//! - `source-mangapark` - MangaPark (GraphQL, mirror-resolved)
//! - `source-mangadex` - MangaDex (REST JSON)
//! - `source-madara` - Madara WordPress theme sites, including the KissManga preset
//! - `all-sources` - All of the above (default)
//!
//! ```bash
//! cargo build --no-default-features --features source-mangadex
//! ```
//!
//! The helpers in this module are shared by all adapters: identifier
//! resolution, the chapter language policy and chapter ordering.

use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Reverse;
use tracing::debug;

use crate::net::is_absolute;
use crate::types::{Chapter, MangaRef};

#[cfg(feature = "source-madara")]
pub mod madara;

#[cfg(feature = "source-mangadex")]
pub mod mangadex;

#[cfg(feature = "source-mangapark")]
pub mod mangapark;

#[cfg(feature = "source-madara")]
pub use madara::{MadaraConfig, MadaraSelectors, MadaraSource};

#[cfg(feature = "source-mangadex")]
pub use mangadex::MangaDexSource;

#[cfg(feature = "source-mangapark")]
pub use mangapark::MangaParkSource;

static LEADING_DIGITS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(\d+)").ok());

/// The form an identifier was given in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdInput {
    /// A plain provider id, possibly taken from a `source:id` reference
    Bare(String),
    /// Path segments of a full URL
    Url(Vec<String>),
}

/// Splits a user-supplied identifier into a bare id or URL path segments.
///
/// A `source:` prefix naming a different source is logged and ignored.
/// Returns `None` for blank input.
///
/// ```rust
/// use hondana::sources::{classify_id, IdInput};
///
/// assert_eq!(classify_id("mangapark:123", "mangapark"), Some(IdInput::Bare("123".into())));
/// assert_eq!(
///     classify_id("https://mangapark.net/title/123-en-x", "mangapark"),
///     Some(IdInput::Url(vec!["title".into(), "123-en-x".into()]))
/// );
/// ```
pub fn classify_id(input: &str, source_id: &str) -> Option<IdInput> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if is_absolute(input) {
        let url = url::Url::parse(input).ok()?;
        let segments: Vec<String> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).map(String::from).collect())
            .unwrap_or_default();
        return Some(IdInput::Url(segments));
    }

    let reference = MangaRef::parse(input);
    if let Some(source) = reference.source.as_deref() {
        if source != source_id {
            debug!(expected = source_id, given = source, "Reference names another source");
        }
    }
    let id = reference.id.trim().trim_matches('/').to_string();
    (!id.is_empty()).then_some(IdInput::Bare(id))
}

/// Resolves an identifier from a bare id, a `source:id` reference or a URL.
///
/// `from_url` extracts the id from URL path segments; bare ids are passed
/// through `from_bare`.
pub fn resolve_id<B, U>(input: &str, source_id: &str, from_bare: B, from_url: U) -> Option<String>
where
    B: FnOnce(&str) -> Option<String>,
    U: FnOnce(&[String]) -> Option<String>,
{
    let resolved = match classify_id(input, source_id)? {
        IdInput::Bare(id) => from_bare(&id),
        IdInput::Url(segments) => from_url(&segments),
    };
    if resolved.is_none() {
        debug!(source = source_id, input, "Could not resolve identifier");
    }
    resolved
}

/// Leading run of ASCII digits, e.g. `"343921-en-solo-leveling"` gives `"343921"`.
pub fn leading_digits(value: &str) -> Option<String> {
    LEADING_DIGITS
        .as_ref()?
        .captures(value)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// The segment following the first segment equal to one of `markers`.
pub fn segment_after<'a>(segments: &'a [String], markers: &[&str]) -> Option<&'a str> {
    segments
        .iter()
        .position(|s| markers.contains(&s.as_str()))
        .and_then(|i| segments.get(i + 1))
        .map(String::as_str)
}

/// Canonical spelling of a language code: lowercase, `-` separated, with
/// common long forms folded to their short code.
fn canonical_language(code: &str) -> String {
    let code = code.trim().to_lowercase().replace('_', "-");
    let folded = match code.as_str() {
        "english" | "eng" | "en-us" | "en-gb" => "en",
        "japanese" | "jpn" | "jp" => "ja",
        "spanish" | "spa" | "es-la" | "es-419" => "es",
        "portuguese" | "por" | "pt-br" | "pt-pt" => "pt",
        "french" | "fra" | "fre" => "fr",
        "korean" | "kor" | "kr" => "ko",
        "chinese" | "zho" | "chi" | "zh-hk" | "zh-cn" | "zh-tw" => "zh",
        other => other.split('-').next().unwrap_or(other),
    };
    folded.to_string()
}

/// Chapter language policy: a permissive union.
///
/// A chapter passes when its language is missing, when it names `target` in
/// any common spelling, or when the parent work is in `target`.
///
/// ```rust
/// use hondana::sources::language_matches;
///
/// assert!(language_matches(None, "en", None));
/// assert!(language_matches(Some("English"), "en", None));
/// assert!(language_matches(Some("ja"), "en", Some("en")));
/// assert!(!language_matches(Some("fr"), "en", Some("ja")));
/// ```
pub fn language_matches(chapter: Option<&str>, target: &str, parent: Option<&str>) -> bool {
    let target = canonical_language(target);
    let chapter_ok = match chapter.map(str::trim) {
        None | Some("") => true,
        Some(code) => canonical_language(code) == target,
    };
    chapter_ok
        || parent
            .map(str::trim)
            .is_some_and(|p| !p.is_empty() && canonical_language(p) == target)
}

/// Orders chapters newest first by descending numeric id.
///
/// Ids are treated as a recency proxy; non-numeric ids count as 0. Reused or
/// non-monotonic ids give a wrong order, which is accepted.
pub fn sort_by_numeric_id_desc(chapters: &mut [Chapter]) {
    chapters.sort_by_key(|c| {
        Reverse(
            leading_digits(&c.id)
                .and_then(|d| d.parse::<u64>().ok())
                .unwrap_or(0),
        )
    });
}

/// Resolves `href` against `base`, handling protocol-relative and rooted paths.
pub(crate) fn absolute_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || is_absolute(href) {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        crate::net::join_url(base, href)
    }
}
