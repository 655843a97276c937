//! # Hondana - multi-source manga aggregation
//!
//! Hondana puts several manga providers behind one asynchronous interface.
//! Each provider is an adapter implementing [`Source`]; an [`Aggregator`]
//! fans requests out across them, ordering and rerouting traffic through a
//! shared health manager so a failing provider is rotated out automatically.
//!
//! ## Features
//!
//! - **Unified Source API**: search, details, chapter images and latest
//!   releases with the same shape for every provider
//! - **Mirror Resolution**: per-source HTTP clients probe mirrors and keep
//!   cookies across calls
//! - **Health-based Fallback**: decaying error counts and automatic rotation
//! - **Normalization**: provider payloads mapped onto [`Manga`] and [`Chapter`]
//!   without ever failing
//! - **Image Pipeline**: prefix joining, dead CDN node repair and slicing of
//!   oversized pages
//! - **Fluent Search**: [`SearchBuilder`] with flattened, grouped and
//!   single-source strategies
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hondana::prelude::*;
//! use hondana::net::ReqwestTransport;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> hondana::Result<()> {
//!     let transport = Arc::new(ReqwestTransport::new()?);
//!     let aggregator = Aggregator::from_config(&Config::builtin(), transport);
//!
//!     let results = aggregator
//!         .query("solo leveling")
//!         .genre("Action")
//!         .flatten()
//!         .await;
//!
//!     for manga in &results {
//!         println!("[{}] {}", manga.source, manga.title);
//!     }
//!
//!     if let Some(first) = results.first() {
//!         let reference = format!("{}:{}", first.source, first.id);
//!         if let Some(details) = aggregator.manga_details(&reference).await {
//!             println!("{} chapters", details.chapters.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`net`]: transport seam, per-source HTTP client, HTML/JSON helpers
//! - [`source`]: the [`Source`] trait and the [`Sources`] registry
//! - [`sources`]: bundled adapters (MangaPark, MangaDex, Madara sites)
//! - [`normalize`]: provider payload to canonical records
//! - [`health`]: [`FallbackManager`](health::FallbackManager)
//! - [`images`]: chapter image URL pipeline
//! - [`aggregator`]: fan-out facade
//! - [`search`]: fluent search builder and result processing
//! - [`batch`]: chunked batch execution
//! - [`config`]: source table and genre maps
//! - [`error`]: error types

pub mod aggregator;
pub mod batch;
pub mod config;
pub mod error;
pub mod health;
pub mod images;
pub mod net;
pub mod normalize;
pub mod search;
pub mod source;
pub mod sources;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```rust
/// use hondana::prelude::*;
///
/// let filters = SearchFilters::default();
/// assert!(filters.is_empty());
/// ```
pub mod prelude {
    pub use crate::{
        aggregator::Aggregator,
        config::Config,
        health::FallbackManager,
        search::{SearchBuilder, SearchResultExt},
        source::{Source, Sources},
        types::{
            Chapter, Manga, MangaDetails, MangaRef, MangaStatus, SearchFilters,
            SearchFiltersBuilder, SortOrder, SourceHealth,
        },
    };
}

pub use aggregator::Aggregator;
pub use error::{Error, Result};
pub use search::{SearchBuilder, SearchResultExt};
pub use source::{Source, Sources};
pub use types::{Chapter, Manga, MangaDetails, MangaRef, SearchFilters, SortOrder};
