//! Source capability trait and the registry of configured sources.
//!
//! Every provider adapter implements [`Source`]. The trait is infallible:
//! adapters log failures, report them to the
//! [`FallbackManager`](crate::health::FallbackManager) and hand back an empty
//! list or `None`.
//!
//! # Examples
//!
//! ```rust
//! use hondana::prelude::*;
//!
//! let sources = Sources::new();
//! assert!(sources.is_empty());
//! assert!(sources.get("mangadex").is_none());
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Manga, MangaDetails, SearchFilters};

/// Common interface of all provider adapters.
///
/// # Required Methods
///
/// * [`id()`](Source::id) - Registry key, e.g. `"mangapark"`
/// * [`name()`](Source::name) - Human-readable name
/// * [`search()`](Source::search) - Free-text search with optional filters
/// * [`get_manga_details()`](Source::get_manga_details) - Series metadata and chapters
/// * [`get_chapter_images()`](Source::get_chapter_images) - Ordered page image URLs
/// * [`get_latest_releases()`](Source::get_latest_releases) - Recently updated series
///
/// # Implementation Guidelines
///
/// - Use an [`HttpClient`](crate::net::HttpClient) for every request
/// - Wrap each provider call in [`FallbackManager::track`](crate::health::FallbackManager::track)
/// - Accept bare ids, full URLs and `source:id` references
/// - Set `source` on every returned record
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use hondana::prelude::*;
///
/// struct EmptySource;
///
/// #[async_trait]
/// impl Source for EmptySource {
///     fn id(&self) -> &str { "empty" }
///     fn name(&self) -> &str { "Empty" }
///     async fn search(&self, _query: &str, _filters: &SearchFilters) -> Vec<Manga> { Vec::new() }
///     async fn get_manga_details(&self, _id: &str) -> Option<MangaDetails> { None }
///     async fn get_chapter_images(&self, _id: &str) -> Vec<String> { Vec::new() }
///     async fn get_latest_releases(&self) -> Vec<Manga> { Vec::new() }
/// }
/// ```
#[async_trait]
pub trait Source: Send + Sync {
    /// Unique lowercase identifier, also used as the health and config key.
    fn id(&self) -> &str;

    /// Display name of the provider.
    fn name(&self) -> &str;

    /// Searches the provider catalog.
    ///
    /// `filters.word`, when set, replaces `query`. Genres are translated
    /// through the source's genre table; unknown genres are ignored.
    async fn search(&self, query: &str, filters: &SearchFilters) -> Vec<Manga>;

    /// Fetches series metadata together with its chapter list.
    ///
    /// Returns `None` when the id cannot be resolved or the provider has no
    /// such series.
    async fn get_manga_details(&self, id: &str) -> Option<MangaDetails>;

    /// Ordered image URLs of one chapter, after source-specific repair.
    async fn get_chapter_images(&self, id: &str) -> Vec<String>;

    /// Recently updated series from the provider's dedicated feed.
    async fn get_latest_releases(&self) -> Vec<Manga>;
}

/// Registry of sources keyed by [`Source::id`], in insertion order.
///
/// Registering a second source with an existing id replaces the first one
/// in place.
///
/// ```rust
/// use hondana::prelude::*;
/// # use async_trait::async_trait;
/// # struct Dummy(&'static str);
/// # #[async_trait]
/// # impl Source for Dummy {
/// #     fn id(&self) -> &str { self.0 }
/// #     fn name(&self) -> &str { self.0 }
/// #     async fn search(&self, _: &str, _: &SearchFilters) -> Vec<Manga> { Vec::new() }
/// #     async fn get_manga_details(&self, _: &str) -> Option<MangaDetails> { None }
/// #     async fn get_chapter_images(&self, _: &str) -> Vec<String> { Vec::new() }
/// #     async fn get_latest_releases(&self) -> Vec<Manga> { Vec::new() }
/// # }
///
/// let mut sources = Sources::new();
/// sources.add(Dummy("mangapark")).add(Dummy("mangadex"));
/// assert_eq!(sources.list_ids(), vec!["mangapark", "mangadex"]);
/// assert!(sources.contains("mangadex"));
/// ```
#[derive(Clone, Default)]
pub struct Sources {
    sources: Vec<Arc<dyn Source>>,
    by_id: HashMap<String, usize>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source.
    pub fn add(&mut self, source: impl Source + 'static) -> &mut Self {
        self.add_shared(Arc::new(source))
    }

    /// Registers an already shared source.
    pub fn add_shared(&mut self, source: Arc<dyn Source>) -> &mut Self {
        let id = source.id().to_string();
        match self.by_id.get(&id) {
            Some(&index) => self.sources[index] = source,
            None => {
                self.by_id.insert(id, self.sources.len());
                self.sources.push(source);
            }
        }
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Source>> {
        self.by_id
            .get(id)
            .and_then(|&index| self.sources.get(index))
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.id().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for Sources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sources")
            .field("ids", &self.list_ids())
            .finish()
    }
}
