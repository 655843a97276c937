//! Fluent search builder and result post-processing.
//!
//! [`SearchBuilder`] collects [`SearchFilters`] through chained calls and runs
//! the search through an [`Aggregator`] with one of several strategies.
//!
//! # Examples
//!
//! ```rust
//! use hondana::prelude::*;
//!
//! # async fn example() {
//! let aggregator = Aggregator::from_sources(Sources::new());
//!
//! let results = aggregator
//!     .query("solo leveling")
//!     .genre("Action")
//!     .sort(SortOrder::LatestUpdate)
//!     .flatten()
//!     .await;
//!
//! let grouped = aggregator.query("naruto").group().await;
//! # }
//! ```

use std::collections::HashSet;

use crate::{
    aggregator::Aggregator,
    error::{Error, Result},
    types::{Manga, MangaStatus, SearchFilters, SortOrder},
};

/// A fluent search builder bound to an [`Aggregator`].
///
/// # Execution Strategies
///
/// - [`flatten()`](SearchBuilder::flatten) - All sources, deduplicated by title
/// - [`group()`](SearchBuilder::group) - All sources, results kept per source
/// - [`from_source()`](SearchBuilder::from_source) - One named source only
/// - [`build()`](SearchBuilder::build) - Just the filters
///
/// # Examples
///
/// ```rust
/// use hondana::prelude::*;
///
/// # async fn example(aggregator: &Aggregator) -> hondana::Result<()> {
/// let ongoing = aggregator
///     .query("tower")
///     .genres(vec!["Fantasy".to_string(), "Adventure".to_string()])
///     .status(MangaStatus::Ongoing)
///     .page(2)
///     .from_source("mangapark")
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct SearchBuilder<'a> {
    aggregator: &'a Aggregator,
    query: String,
    filters: SearchFilters,
}

impl<'a> SearchBuilder<'a> {
    /// Called by [`Aggregator::query`].
    pub(crate) fn new(aggregator: &'a Aggregator, query: impl Into<String>) -> Self {
        Self {
            aggregator,
            query: query.into(),
            filters: SearchFilters::default(),
        }
    }

    /// Adds one genre by display name.
    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.filters.genres.push(genre.into());
        self
    }

    /// Replaces the genre list.
    pub fn genres(mut self, genres: Vec<String>) -> Self {
        self.filters.genres = genres;
        self
    }

    pub fn status(mut self, status: MangaStatus) -> Self {
        self.filters.status = Some(status);
        self
    }

    /// Sets the sort order for the search results.
    ///
    /// Sources without a matching sort key keep their default order.
    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.filters.sort = Some(sort);
        self
    }

    /// Overrides the query text sent to sources.
    pub fn word(mut self, word: impl Into<String>) -> Self {
        self.filters.word = Some(word.into());
        self
    }

    /// Selects a 1-based result page.
    pub fn page(mut self, page: u32) -> Self {
        self.filters.page = Some(page);
        self
    }

    /// Searches every available source and merges the results.
    ///
    /// Sources that fail contribute nothing; the merged list is deduplicated
    /// by lowercase title.
    pub async fn flatten(self) -> Vec<Manga> {
        self.aggregator
            .search(&self.query, None, &self.filters)
            .await
    }

    /// Searches every available source and keeps results per source.
    ///
    /// Useful for debugging which provider returned what. Nothing is
    /// deduplicated.
    ///
    /// ```rust
    /// # use hondana::prelude::*;
    /// # async fn example(aggregator: &Aggregator) {
    /// for (source, manga) in aggregator.query("naruto").group().await {
    ///     println!("{}: {} results", source, manga.len());
    /// }
    /// # }
    /// ```
    pub async fn group(self) -> Vec<(String, Vec<Manga>)> {
        self.aggregator
            .search_grouped(&self.query, &self.filters)
            .await
    }

    /// Searches a single source.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no source with `source_id` is registered.
    pub async fn from_source(self, source_id: &str) -> Result<Vec<Manga>> {
        if !self.aggregator.sources().contains(source_id) {
            return Err(Error::not_found(format!("Source: {}", source_id)));
        }
        Ok(self
            .aggregator
            .search(&self.query, Some(source_id), &self.filters)
            .await)
    }

    /// Returns the collected filters without searching.
    pub fn build(self) -> SearchFilters {
        self.filters
    }
}

/// Post-processing for merged search results.
///
/// ```rust
/// use hondana::prelude::*;
///
/// let results = vec![
///     Manga { id: "1".into(), title: "Solo Leveling".into(), source: "mangapark".into(), ..Default::default() },
///     Manga { id: "a".into(), title: "solo leveling".into(), source: "mangadex".into(), ..Default::default() },
/// ];
/// let unique = results.dedupe_by_title();
/// assert_eq!(unique.len(), 1);
/// assert_eq!(unique[0].source, "mangapark");
/// ```
pub trait SearchResultExt {
    /// Keeps the first entry for each lowercase title.
    ///
    /// Titles are only a heuristic for identity: different works sharing a
    /// title collapse into one entry.
    fn dedupe_by_title(self) -> Self;

    /// Keeps the first entry for each `(source, id)` pair.
    fn dedupe_by_source_id(self) -> Self;
}

impl SearchResultExt for Vec<Manga> {
    fn dedupe_by_title(mut self) -> Self {
        let mut seen = HashSet::new();
        self.retain(|manga| seen.insert(manga.title.to_lowercase()));
        self
    }

    fn dedupe_by_source_id(mut self) -> Self {
        let mut seen = HashSet::new();
        self.retain(|manga| seen.insert((manga.source.clone(), manga.id.clone())));
        self
    }
}
