//! MangaPark adapter over the `/apo/` GraphQL endpoint.
//!
//! MangaPark runs the same site on several mirrors; the first mirror that
//! answers the probe becomes the base for every later call. Chapter images go
//! through the dead-node repair and slicing pipeline.

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    config::{Config, GenreMap, SourceConfig},
    error::{Error, Result},
    health::FallbackManager,
    images::ImagePipeline,
    net::{HttpClient, RequestOptions, Transport, json as pjson},
    normalize::{normalize_chapter, normalize_manga},
    source::Source,
    types::{Chapter, Manga, MangaDetails, MangaStatus, SearchFilters, SortOrder},
};

use super::{language_matches, leading_digits, resolve_id, segment_after, sort_by_numeric_id_desc};

const SEARCH_QUERY: &str = r#"
query get_searchComic($select: SearchComic_Select) {
  get_searchComic(select: $select) {
    paging { page pages total }
    items {
      id
      data {
        id name altNames authors artists genres originalStatus uploadStatus
        urlPath urlCoverOri score_avg follows
        max_chapterNode { id data { id dname urlPath } }
      }
    }
  }
}"#;

const COMIC_QUERY: &str = r#"
query get_comicNode($id: ID!) {
  get_comicNode(id: $id) {
    id
    data {
      id name altNames authors artists genres originalStatus uploadStatus
      summary urlPath urlCoverOri score_avg follows origLang tranLang
      max_chapterNode { id data { id dname urlPath } }
    }
  }
}"#;

const CHAPTER_LIST_QUERY: &str = r#"
query get_comicChapterList($comicId: ID!) {
  get_comicChapterList(comicId: $comicId) {
    id
    data { id dname title serial volume lang urlPath srcTitle dateCreate }
  }
}"#;

const CHAPTER_QUERY: &str = r#"
query get_chapterNode($id: ID!) {
  get_chapterNode(id: $id) {
    id
    data { id dname imageFile { urlList } }
  }
}"#;

const LATEST_QUERY: &str = r#"
query get_latestReleases($select: LatestReleases_Select) {
  get_latestReleases(select: $select) {
    paging { page pages }
    items {
      id
      data {
        id name genres urlPath urlCoverOri score_avg follows
        max_chapterNode { id data { id dname urlPath } }
      }
    }
  }
}"#;

const PAGE_SIZE: u32 = 24;

/// MangaPark source.
///
/// ```rust,no_run
/// use hondana::prelude::*;
/// use hondana::health::FallbackManager;
/// use hondana::net::ReqwestTransport;
/// use hondana::sources::MangaParkSource;
/// use std::sync::Arc;
///
/// # async fn example() -> hondana::Result<()> {
/// let health = Arc::new(FallbackManager::new([("mangapark", 1)]));
/// let source = MangaParkSource::new(Arc::new(ReqwestTransport::new()?), health);
/// let results = source.search("solo leveling", &SearchFilters::default()).await;
/// # Ok(())
/// # }
/// ```
pub struct MangaParkSource {
    config: SourceConfig,
    genres: GenreMap,
    client: HttpClient,
    health: Arc<FallbackManager>,
    images: ImagePipeline,
}

impl MangaParkSource {
    /// Creates the source from the builtin configuration.
    pub fn new(transport: Arc<dyn Transport>, health: Arc<FallbackManager>) -> Self {
        let config = Config::builtin();
        let source = config
            .source("mangapark")
            .cloned()
            .unwrap_or_else(fallback_config);
        Self::with_config(source, config.genres_for("mangapark"), transport, health)
    }

    pub fn with_config(
        config: SourceConfig,
        genres: GenreMap,
        transport: Arc<dyn Transport>,
        health: Arc<FallbackManager>,
    ) -> Self {
        let client = HttpClient::new(config.name.clone(), transport)
            .with_mirrors(config.mirrors.clone())
            .with_timeout(config.timeout())
            .with_header("Accept", "application/json");
        Self {
            config,
            genres,
            client,
            health,
            images: ImagePipeline::mangapark(),
        }
    }

    /// Replaces the image pipeline.
    pub fn with_images(mut self, images: ImagePipeline) -> Self {
        self.images = images;
        self
    }

    /// The underlying client, e.g. to inspect the resolved mirror.
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let base = self.client.initialize().await.to_string();
        let body = json!({ "query": query, "variables": variables });
        let options = RequestOptions::post_json(&body).header("Origin", &base);

        let response = self.client.fetch(&self.config.endpoint, options).await?;
        if response.body.is_empty() {
            return Err(Error::Http {
                src: self.config.name.clone(),
                status: response.status.as_u16(),
            });
        }
        let payload: Value = serde_json::from_slice(&response.body)?;

        if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() && payload.get("data").is_none_or(Value::is_null) {
                let message = pjson::first_str(&payload, &["errors.0.message"])
                    .unwrap_or_else(|| "GraphQL error".to_string());
                return Err(Error::source(&self.config.name, message));
            }
        }
        Ok(payload)
    }

    fn search_variables(&self, query: &str, filters: &SearchFilters) -> Value {
        let word = filters.word.as_deref().unwrap_or(query);
        let mut select = json!({
            "word": word,
            "page": filters.page(),
            "size": PAGE_SIZE,
            "incGenres": self.genres.map_all(&filters.genres),
            "excGenres": [],
            "incTLangs": [self.config.language],
        });
        if let Some(status) = filters.status {
            select["origStatus"] = json!(status_key(status));
        }
        if let Some(sort) = filters.sort.and_then(sort_key) {
            select["sortby"] = json!(sort);
        }
        json!({ "select": select })
    }

    /// Maps one `ComicNode.data` object onto the canonical record shape.
    fn comic_record(&self, data: &Value, base: &str) -> Manga {
        let url = pjson::extract_str(data, "urlPath")
            .map(|p| super::absolute_url(base, &p))
            .unwrap_or_default();
        let latest_url = pjson::extract_str(data, "max_chapterNode.data.urlPath")
            .map(|p| super::absolute_url(base, &p));
        let mut authors = pjson::extract_strings(data, "authors");
        authors.extend(pjson::extract_strings(data, "artists"));
        let mut seen = HashSet::new();
        authors.retain(|name| seen.insert(name.clone()));

        let record = json!({
            "id": pjson::extract_str(data, "id"),
            "title": pjson::first_str(data, &["name", "dname"]),
            "url": url,
            "cover": pjson::extract_str(data, "urlCoverOri").map(|p| super::absolute_url(base, &p)),
            "genres": pjson::extract_strings(data, "genres"),
            "authors": authors,
            "description": pjson::extract_str(data, "summary"),
            "status": pjson::first_str(data, &["originalStatus", "uploadStatus"]),
            "rating": pjson::extract_f64(data, "score_avg"),
            "views": pjson::extract_u64(data, "follows"),
            "latestChapter": pjson::extract_str(data, "max_chapterNode.data.dname"),
            "latestChapterUrl": latest_url,
            "latestChapterId": pjson::first_str(data, &["max_chapterNode.data.id", "max_chapterNode.id"]),
        });
        normalize_manga(&record, &self.config.name)
    }

    fn chapter_record(&self, data: &Value, base: &str) -> Chapter {
        let upload_date = pjson::extract_ref(data, "dateCreate")
            .and_then(Value::as_i64)
            .and_then(DateTime::from_timestamp_millis)
            .map(|d| d.to_rfc3339());
        let record = json!({
            "id": pjson::extract_str(data, "id"),
            "title": pjson::first_str(data, &["dname", "title"]),
            "url": pjson::extract_str(data, "urlPath").map(|p| super::absolute_url(base, &p)),
            "chapterNum": pjson::extract_str(data, "serial"),
            "volume": pjson::extract_str(data, "volume"),
            "language": pjson::extract_str(data, "lang"),
            "group": pjson::extract_str(data, "srcTitle"),
            "uploadDate": upload_date,
        });
        normalize_chapter(&record, &self.config.name)
    }

    fn comic_items(&self, payload: &Value, path: &str, base: &str) -> Vec<Manga> {
        pjson::extract_array(payload, path)
            .iter()
            .filter_map(|item| item.get("data"))
            .map(|data| self.comic_record(data, base))
            .filter(|m| !(m.id.is_empty() && m.title.is_empty()))
            .collect()
    }

    async fn search_inner(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Manga>> {
        let payload = self
            .graphql(SEARCH_QUERY, self.search_variables(query, filters))
            .await?;
        let base = self.client.initialize().await;
        Ok(self.comic_items(&payload, "data.get_searchComic.items", base))
    }

    async fn details_inner(&self, id: &str) -> Result<Option<MangaDetails>> {
        let Some(comic_id) = resolve_comic_id(id, &self.config.name) else {
            warn!(source = %self.config.name, id, "Unresolvable comic id");
            return Ok(None);
        };

        let (comic, chapters) = futures::try_join!(
            self.graphql(COMIC_QUERY, json!({ "id": comic_id })),
            self.graphql(CHAPTER_LIST_QUERY, json!({ "comicId": comic_id })),
        )?;

        let Some(data) =
            pjson::extract_ref(&comic, "data.get_comicNode.data").filter(|d| d.is_object())
        else {
            debug!(source = %self.config.name, comic_id, "Comic node missing");
            return Ok(None);
        };

        let base = self.client.initialize().await;
        let manga = self.comic_record(data, base);
        let parent_language = pjson::first_str(data, &["tranLang", "origLang"]);

        let nodes = pjson::extract_array(&chapters, "data.get_comicChapterList");
        let mut chapter_list: Vec<Chapter> = nodes
            .iter()
            .filter_map(|node| node.get("data"))
            .map(|data| self.chapter_record(data, base))
            .filter(|c| !c.id.is_empty())
            .filter(|c| {
                language_matches(
                    c.language.as_deref(),
                    &self.config.language,
                    parent_language.as_deref(),
                )
            })
            .collect();
        sort_by_numeric_id_desc(&mut chapter_list);

        Ok(Some(MangaDetails {
            manga,
            chapters: chapter_list,
            related_series: Vec::new(),
        }))
    }

    async fn images_inner(&self, id: &str) -> Result<Vec<String>> {
        let Some(chapter_id) = resolve_chapter_id(id, &self.config.name) else {
            warn!(source = %self.config.name, id, "Unresolvable chapter id");
            return Ok(Vec::new());
        };

        let payload = self
            .graphql(CHAPTER_QUERY, json!({ "id": chapter_id }))
            .await?;
        let urls: Vec<String> =
            pjson::extract_array(&payload, "data.get_chapterNode.data.imageFile.urlList")
                .iter()
                .filter_map(pjson::scalar_to_string)
                .collect();

        Ok(self.images.process(urls))
    }

    async fn latest_inner(&self) -> Result<Vec<Manga>> {
        let variables = json!({
            "select": { "page": 1, "size": PAGE_SIZE, "where": "release", "init": PAGE_SIZE }
        });
        let payload = self.graphql(LATEST_QUERY, variables).await?;
        let base = self.client.initialize().await;
        Ok(self.comic_items(&payload, "data.get_latestReleases.items", base))
    }
}

#[async_trait]
impl Source for MangaParkSource {
    fn id(&self) -> &str {
        &self.config.name
    }

    fn name(&self) -> &str {
        &self.config.display_name
    }

    async fn search(&self, query: &str, filters: &SearchFilters) -> Vec<Manga> {
        match self
            .health
            .track(self.id(), self.search_inner(query, filters))
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(source = %self.id(), error = %e, "Search failed");
                Vec::new()
            }
        }
    }

    async fn get_manga_details(&self, id: &str) -> Option<MangaDetails> {
        match self.health.track(self.id(), self.details_inner(id)).await {
            Ok(details) => details,
            Err(e) => {
                warn!(source = %self.id(), id, error = %e, "Details failed");
                None
            }
        }
    }

    async fn get_chapter_images(&self, id: &str) -> Vec<String> {
        match self.health.track(self.id(), self.images_inner(id)).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(source = %self.id(), id, error = %e, "Chapter images failed");
                Vec::new()
            }
        }
    }

    async fn get_latest_releases(&self) -> Vec<Manga> {
        match self.health.track(self.id(), self.latest_inner()).await {
            Ok(results) => results,
            Err(e) => {
                warn!(source = %self.id(), error = %e, "Latest releases failed");
                Vec::new()
            }
        }
    }
}

fn fallback_config() -> SourceConfig {
    SourceConfig {
        name: "mangapark".to_string(),
        display_name: "MangaPark".to_string(),
        priority: 1,
        enabled: true,
        mirrors: vec!["https://mangapark.net".to_string()],
        api_type: crate::config::ApiType::Graphql,
        endpoint: "/apo/".to_string(),
        timeout_secs: 15,
        language: "en".to_string(),
    }
}

fn status_key(status: MangaStatus) -> &'static str {
    match status {
        MangaStatus::Ongoing => "ongoing",
        MangaStatus::Completed => "completed",
        MangaStatus::Hiatus => "hiatus",
        MangaStatus::Cancelled => "cancelled",
    }
}

fn sort_key(sort: SortOrder) -> Option<&'static str> {
    match sort {
        SortOrder::Relevance => None,
        SortOrder::LatestUpdate => Some("field_update"),
        SortOrder::Popular => Some("field_follow"),
        SortOrder::Rating => Some("field_score"),
        SortOrder::Title => Some("field_name"),
        SortOrder::NewlyAdded => Some("field_create"),
    }
}

/// Comic id from `343921`, `343921-en-solo-leveling` or `/title/343921-...` URLs.
fn resolve_comic_id(input: &str, source: &str) -> Option<String> {
    resolve_id(input, source, leading_digits, |segments| {
        segment_after(segments, &["title", "comic"]).and_then(leading_digits)
    })
}

/// Chapter id from a bare id or `/title/{comic}/{chapter}-...` URLs.
fn resolve_chapter_id(input: &str, source: &str) -> Option<String> {
    resolve_id(input, source, leading_digits, |segments| {
        match segments.iter().position(|s| s == "title") {
            Some(i) => segments.get(i + 2).and_then(|s| leading_digits(s)),
            None => segment_after(segments, &["chapter"]).and_then(leading_digits),
        }
    })
}
