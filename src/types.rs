//! Core data types for manga, chapters, health and search filters.
//!
//! - [`Manga`] - A series as listed by one source
//! - [`Chapter`] - A single chapter entry of a series
//! - [`MangaDetails`] - A series together with its chapter list
//! - [`SourceHealth`] - Rolling success/error signal for one source
//! - [`SearchFilters`] - Optional filters for a search
//! - [`MangaRef`] - A parsed `source:id` reference
//!
//! # Examples
//!
//! ```rust
//! use hondana::types::*;
//!
//! let manga = Manga {
//!     id: "343921".to_string(),
//!     title: "Solo Leveling".to_string(),
//!     source: "mangapark".to_string(),
//!     ..Default::default()
//! };
//! assert!(manga.genres.is_empty());
//! ```

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// A manga/comic series as reported by a single source.
///
/// `id` is only unique within `source`. Two entries from different sources
/// are never known to be the same work; title matching is a heuristic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manga {
    /// Provider-scoped identifier
    pub id: String,

    /// Main title
    pub title: String,

    /// Series page URL
    #[serde(default)]
    pub url: String,

    /// Cover image URL
    #[serde(default)]
    pub cover: String,

    /// Genre names
    #[serde(default)]
    pub genres: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_chapter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_chapter_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_chapter_id: Option<String>,

    /// Description/summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Authors and artists
    #[serde(default)]
    pub authors: Vec<String>,

    /// Publication status as the provider spells it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,

    /// Name of the source this entry came from
    pub source: String,
}

/// A single chapter entry.
///
/// Chapters are built fresh on every details fetch and are never cached here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Provider-scoped identifier
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub url: String,

    /// Chapter number as given by the provider ("12", "12.5", "Extra")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_num: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vol_num: Option<String>,

    /// Tagged language code, if the provider tags chapters individually
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Scanlation group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Chapter {
    /// Chapter number parsed as a float; anything unparsable counts as `0.0`.
    ///
    /// ```rust
    /// use hondana::Chapter;
    ///
    /// let chapter = Chapter { chapter_num: Some("12.5".into()), ..Default::default() };
    /// assert_eq!(chapter.number(), 12.5);
    ///
    /// let extra = Chapter { chapter_num: Some("Extra".into()), ..Default::default() };
    /// assert_eq!(extra.number(), 0.0);
    /// ```
    pub fn number(&self) -> f64 {
        self.chapter_num
            .as_deref()
            .and_then(|n| n.trim().parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .unwrap_or(0.0)
    }
}

/// A series with its chapter list and related works.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaDetails {
    #[serde(flatten)]
    pub manga: Manga,

    #[serde(default)]
    pub chapters: Vec<Chapter>,

    #[serde(default)]
    pub related_series: Vec<Manga>,
}

/// Rolling health signal for a single source.
///
/// Owned and mutated exclusively by the
/// [`FallbackManager`](crate::health::FallbackManager); callers only ever see
/// snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceHealth {
    pub source: String,
    pub healthy: bool,
    /// Percentage in `0.0..=100.0`
    pub success_rate: f64,
    pub request_count: u64,
    pub error_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success_time: Option<DateTime<Utc>>,
}

impl SourceHealth {
    /// Initial state: healthy, 100% success, no requests.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            healthy: true,
            success_rate: 100.0,
            request_count: 0,
            error_count: 0,
            last_success_time: None,
        }
    }

    /// Whether the source may still receive traffic.
    ///
    /// A source stays usable while healthy, or while its success rate is above
    /// 50% with fewer than 10 outstanding errors.
    pub fn is_available(&self) -> bool {
        self.healthy || (self.success_rate > 50.0 && self.error_count < 10)
    }
}

/// Publication status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MangaStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
}

/// Defines how search results should be sorted.
///
/// Sources map each variant onto their own sort keys and fall back to their
/// default ordering for variants they do not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Relevance,
    LatestUpdate,
    Popular,
    Rating,
    Title,
    NewlyAdded,
}

/// Optional search filters.
///
/// ```rust
/// use hondana::types::{SearchFiltersBuilder, MangaStatus, SortOrder};
///
/// let filters = SearchFiltersBuilder::default()
///     .genres(vec!["Action".to_string()])
///     .status(Some(MangaStatus::Ongoing))
///     .sort(Some(SortOrder::Popular))
///     .build()
///     .unwrap();
/// assert_eq!(filters.genres.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into), default)]
pub struct SearchFilters {
    /// Genre display names, mapped per source through its genre table
    #[serde(default)]
    pub genres: Vec<String>,
    pub status: Option<MangaStatus>,
    pub sort: Option<SortOrder>,
    /// Free-text word overriding the query when set
    pub word: Option<String>,
    /// 1-based page
    pub page: Option<u32>,
}

impl SearchFilters {
    /// Returns `true` when no filter narrows the search.
    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
            && self.status.is_none()
            && self.sort.is_none()
            && self.word.is_none()
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}

/// A reference to a manga or chapter, optionally qualified by its source.
///
/// ```rust
/// use hondana::types::MangaRef;
///
/// let r = MangaRef::parse("mangapark:343921");
/// assert_eq!(r.source.as_deref(), Some("mangapark"));
/// assert_eq!(r.id, "343921");
///
/// let url = MangaRef::parse("https://mangapark.net/title/343921-en-solo-leveling");
/// assert_eq!(url.source, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MangaRef {
    pub source: Option<String>,
    pub id: String,
}

impl MangaRef {
    /// Parses `source:id`; URLs and bare ids carry no source.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if !input.contains("://") {
            if let Some((source, id)) = input.split_once(':') {
                if !source.is_empty() && !id.is_empty() {
                    return Self {
                        source: Some(source.to_string()),
                        id: id.to_string(),
                    };
                }
            }
        }
        Self {
            source: None,
            id: input.to_string(),
        }
    }
}

impl std::fmt::Display for MangaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}:{}", source, self.id),
            None => f.write_str(&self.id),
        }
    }
}
