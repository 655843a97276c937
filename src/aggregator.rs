//! Aggregation facade over every registered source.
//!
//! The [`Aggregator`] is the composition root's main handle: it owns the
//! source registry and a shared [`FallbackManager`], fans requests out in
//! health order and merges the answers.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hondana::prelude::*;
//! use hondana::net::ReqwestTransport;
//! use std::sync::Arc;
//!
//! # async fn example() -> hondana::Result<()> {
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let aggregator = Aggregator::from_config(&Config::builtin(), transport);
//!
//! let results = aggregator.search("solo leveling", None, &SearchFilters::default()).await;
//! if let Some(first) = results.first() {
//!     let details = aggregator.manga_details(&format!("{}:{}", first.source, first.id)).await;
//! }
//! # Ok(())
//! # }
//! ```

use futures::FutureExt;
use futures::future::join_all;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::{
    batch::{DEFAULT_CHUNK_DELAY, DEFAULT_CHUNK_SIZE, batch_info},
    config::Config,
    health::FallbackManager,
    net::{Transport, is_absolute},
    search::{SearchBuilder, SearchResultExt},
    source::{Source, Sources},
    types::{Manga, MangaDetails, MangaRef, SearchFilters, SourceHealth},
};

/// Maximum number of entries returned by [`Aggregator::latest_releases`].
pub const LATEST_RELEASES_CAP: usize = 30;

/// Fans requests out over registered sources in health order.
#[derive(Debug, Clone)]
pub struct Aggregator {
    sources: Sources,
    health: Arc<FallbackManager>,
}

impl Aggregator {
    /// Wraps an existing registry and health manager. Adapters in `sources`
    /// should report to the same `health` instance.
    pub fn new(sources: Sources, health: Arc<FallbackManager>) -> Self {
        Self { sources, health }
    }

    /// Builds a health manager from registration order (first registered is
    /// most preferred).
    pub fn from_sources(sources: Sources) -> Self {
        let health = FallbackManager::new(
            sources
                .list_ids()
                .into_iter()
                .enumerate()
                .map(|(i, id)| (id, i as u32 + 1)),
        );
        Self::new(sources, Arc::new(health))
    }

    /// Builds every bundled adapter that is enabled in `config` and compiled in.
    pub fn from_config(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let health = Arc::new(FallbackManager::from_configs(&config.sources));
        let mut sources = Sources::new();

        for source in config.enabled_sources() {
            match source.name.as_str() {
                #[cfg(feature = "source-mangapark")]
                "mangapark" => {
                    sources.add(crate::sources::MangaParkSource::with_config(
                        source.clone(),
                        config.genres_for(&source.name),
                        transport.clone(),
                        health.clone(),
                    ));
                }
                #[cfg(feature = "source-mangadex")]
                "mangadex" => {
                    sources.add(crate::sources::MangaDexSource::with_config(
                        source.clone(),
                        config.genres_for(&source.name),
                        transport.clone(),
                        health.clone(),
                    ));
                }
                #[cfg(feature = "source-madara")]
                _ if source.api_type == crate::config::ApiType::Hybrid => {
                    let madara = if source.name == "kissmanga" {
                        crate::sources::MadaraConfig {
                            source: source.clone(),
                            ..crate::sources::MadaraConfig::kissmanga()
                        }
                    } else {
                        crate::sources::MadaraConfig::new(source.clone())
                    };
                    sources.add(crate::sources::MadaraSource::new(
                        madara,
                        config.genres_for(&source.name),
                        transport.clone(),
                        health.clone(),
                    ));
                }
                other => warn!(source = other, "No adapter for configured source"),
            }
        }

        Self::new(sources, health)
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn health(&self) -> &Arc<FallbackManager> {
        &self.health
    }

    /// Starts a fluent search.
    pub fn query(&self, query: impl Into<String>) -> SearchBuilder<'_> {
        SearchBuilder::new(self, query)
    }

    /// Registered sources in fan-out order: available sources by health,
    /// then registered sources the health manager has never seen.
    fn fan_out_targets(&self) -> Vec<Arc<dyn Source>> {
        let mut targets: Vec<Arc<dyn Source>> = self
            .health
            .available_sources()
            .iter()
            .filter_map(|id| self.sources.get(id))
            .collect();

        targets.extend(
            self.sources
                .iter()
                .filter(|s| self.health.health(s.id()).is_none())
                .cloned(),
        );
        targets
    }

    /// Runs `op` on every target concurrently, keeping target order.
    ///
    /// A panicking adapter contributes `T::default()`.
    async fn fan_out<T, F, Fut>(&self, op: F) -> Vec<(String, T)>
    where
        T: Default,
        F: Fn(Arc<dyn Source>) -> Fut,
        Fut: Future<Output = T>,
    {
        let calls = self.fan_out_targets().into_iter().map(|source| {
            let id = source.id().to_string();
            let call = op(source);
            async move {
                match AssertUnwindSafe(call).catch_unwind().await {
                    Ok(value) => (id, value),
                    Err(_) => {
                        error!(source = %id, "Adapter panicked");
                        (id, T::default())
                    }
                }
            }
        });
        join_all(calls).await
    }

    /// The registered source named `preferred`, logging unknown names.
    fn preferred(&self, preferred: Option<&str>) -> Option<Arc<dyn Source>> {
        let name = preferred?;
        let source = self.sources.get(name);
        if source.is_none() {
            debug!(source = name, "Preferred source not registered, fanning out");
        }
        source
    }

    /// Searches one preferred source, or every available one.
    ///
    /// A registered `preferred` source is queried alone and its answer is
    /// returned as is, even when empty. Otherwise results are concatenated in
    /// fan-out order and deduplicated by lowercase title.
    #[tracing::instrument(skip(self, filters))]
    pub async fn search(
        &self,
        query: &str,
        preferred: Option<&str>,
        filters: &SearchFilters,
    ) -> Vec<Manga> {
        if let Some(source) = self.preferred(preferred) {
            return source.search(query, filters).await;
        }

        self.search_grouped(query, filters)
            .await
            .into_iter()
            .flat_map(|(_, results)| results)
            .collect::<Vec<_>>()
            .dedupe_by_title()
    }

    /// Searches every available source, keeping results per source.
    pub async fn search_grouped(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Vec<(String, Vec<Manga>)> {
        self.fan_out(|source| async move { source.search(query, filters).await })
            .await
    }

    /// Recently updated series, deduplicated by `(source, id)` and capped at
    /// [`LATEST_RELEASES_CAP`].
    #[tracing::instrument(skip(self))]
    pub async fn latest_releases(&self, preferred: Option<&str>) -> Vec<Manga> {
        let merged = match self.preferred(preferred) {
            Some(source) => source.get_latest_releases().await,
            None => self
                .fan_out(|source| async move { source.get_latest_releases().await })
                .await
                .into_iter()
                .flat_map(|(_, results)| results)
                .collect(),
        };

        let mut latest = merged.dedupe_by_source_id();
        latest.truncate(LATEST_RELEASES_CAP);
        latest
    }

    /// Picks the adapter for a reference.
    ///
    /// `source:id` names the adapter explicitly. A URL is matched against
    /// source ids appearing in its host. Anything else goes to the active
    /// source, then the first registered one.
    fn route(&self, reference: &MangaRef) -> Option<Arc<dyn Source>> {
        if let Some(name) = reference.source.as_deref() {
            let source = self.sources.get(name);
            if source.is_none() {
                warn!(source = name, "Reference names an unregistered source");
            }
            return source;
        }

        if is_absolute(&reference.id) {
            let host = url::Url::parse(&reference.id)
                .ok()
                .and_then(|u| u.host_str().map(str::to_lowercase))
                .unwrap_or_default();
            if let Some(source) = self.sources.iter().find(|s| host.contains(s.id())) {
                return Some(source.clone());
            }
        }

        self.sources
            .get(&self.health.current_source())
            .or_else(|| self.sources.iter().next().cloned())
    }

    /// Series details for a `source:id` reference, URL or bare id.
    #[tracing::instrument(skip(self))]
    pub async fn manga_details(&self, reference: &str) -> Option<MangaDetails> {
        let reference = MangaRef::parse(reference);
        let source = self.route(&reference)?;
        source.get_manga_details(&reference.id).await
    }

    /// Chapter image URLs for a `source:id` reference, URL or bare id.
    #[tracing::instrument(skip(self))]
    pub async fn chapter_images(&self, reference: &str) -> Vec<String> {
        let reference = MangaRef::parse(reference);
        match self.route(&reference) {
            Some(source) => source.get_chapter_images(&reference.id).await,
            None => Vec::new(),
        }
    }

    /// Details for many references, [`DEFAULT_CHUNK_SIZE`] at a time.
    pub async fn batch_details(&self, references: Vec<String>) -> Vec<Option<MangaDetails>> {
        self.batch_details_with(references, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_DELAY)
            .await
    }

    pub async fn batch_details_with(
        &self,
        references: Vec<String>,
        chunk_size: usize,
        delay: Duration,
    ) -> Vec<Option<MangaDetails>> {
        batch_info(references, chunk_size, delay, |reference| async move {
            self.manga_details(&reference).await
        })
        .await
    }

    pub fn health_report(&self) -> Vec<SourceHealth> {
        self.health.health_report()
    }
}
