use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    config::{ApiType, Config, GenreMap, SourceConfig},
    error::{Error, Result},
    health::FallbackManager,
    images::ImagePipeline,
    net::{HttpClient, Transport},
    normalize::{normalize_chapter, normalize_manga, sort_by_number_desc},
    source::Source,
    types::{Chapter, Manga, MangaDetails, MangaStatus, SearchFilters, SortOrder},
};

use super::{language_matches, resolve_id, segment_after};

const CONTENT_RATINGS: &[&str] = &["safe", "suggestive", "erotica"];
const SEARCH_LIMIT: u32 = 20;
const FEED_LIMIT: u32 = 500;
/// Upper bound on feed pages fetched for one series
const MAX_FEED_PAGES: u32 = 20;
const LATEST_LIMIT: u32 = 32;

static UUID: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").ok()
});

/// MangaDex API list response
#[derive(Debug, Deserialize)]
struct MangaDexListResponse<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    total: u32,
    #[serde(default)]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

/// MangaDex API single entity response
#[derive(Debug, Deserialize)]
struct MangaDexEntityResponse<T> {
    data: T,
}

/// MangaDex manga data structure
#[derive(Debug, Deserialize)]
struct MangaDexMangaData {
    id: String,
    attributes: MangaDexMangaAttributes,
    #[serde(default)]
    relationships: Vec<MangaDexRelationship>,
}

/// MangaDex manga attributes
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MangaDexMangaAttributes {
    title: HashMap<String, String>,
    alt_titles: Vec<HashMap<String, String>>,
    description: HashMap<String, String>,
    status: Option<String>,
    original_language: Option<String>,
    last_chapter: Option<String>,
    tags: Vec<MangaDexTag>,
}

/// MangaDex tag structure
#[derive(Debug, Deserialize)]
struct MangaDexTag {
    attributes: MangaDexTagAttributes,
}

/// MangaDex tag attributes
#[derive(Debug, Deserialize)]
struct MangaDexTagAttributes {
    #[serde(default)]
    name: HashMap<String, String>,
}

/// MangaDex relationship structure
#[derive(Debug, Deserialize)]
struct MangaDexRelationship {
    id: String,
    #[serde(rename = "type")]
    rel_type: String,
    attributes: Option<MangaDexRelationshipAttributes>,
}

/// MangaDex relationship attributes
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaDexRelationshipAttributes {
    name: Option<String>,
    file_name: Option<String>,
}

/// MangaDex chapter data structure
#[derive(Debug, Deserialize)]
struct MangaDexChapterData {
    id: String,
    attributes: MangaDexChapterAttributes,
    #[serde(default)]
    relationships: Vec<MangaDexRelationship>,
}

/// MangaDex chapter attributes
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MangaDexChapterAttributes {
    title: Option<String>,
    chapter: Option<String>,
    volume: Option<String>,
    publish_at: Option<String>,
    readable_at: Option<String>,
    translated_language: Option<String>,
}

/// MangaDex pages response (at-home server)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaDexPagesResponse {
    base_url: String,
    chapter: MangaDexChapterPages,
}

/// MangaDex chapter pages structure
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaDexChapterPages {
    hash: String,
    #[serde(default)]
    data: Vec<String>,
    #[serde(default)]
    data_saver: Vec<String>,
}

/// MangaDex source implementation over the public REST API.
///
/// # Features
///
/// - Title search with tag, status and order filters
/// - Multi-language title support (prioritizes English, then Japanese)
/// - Paginated chapter feeds fetched alongside the series record
/// - At-home image server lookups returned as full page URLs
/// - A latest-releases feed ordered by chapter readability time
///
/// # Examples
///
/// ```rust,no_run
/// use hondana::health::FallbackManager;
/// use hondana::net::ReqwestTransport;
/// use hondana::prelude::*;
/// use hondana::sources::MangaDexSource;
/// use std::sync::Arc;
///
/// # async fn example() -> hondana::Result<()> {
/// let health = Arc::new(FallbackManager::new([("mangadex", 2)]));
/// let source = MangaDexSource::new(Arc::new(ReqwestTransport::new()?), health);
///
/// let results = source.search("one piece", &SearchFilters::default()).await;
/// if let Some(manga) = results.first() {
///     let details = source.get_manga_details(&manga.id).await;
/// }
/// # Ok(())
/// # }
/// ```
pub struct MangaDexSource {
    config: SourceConfig,
    genres: GenreMap,
    client: HttpClient,
    health: Arc<FallbackManager>,
    images: ImagePipeline,
}

impl MangaDexSource {
    /// Create a new MangaDex source from the builtin configuration
    pub fn new(transport: Arc<dyn Transport>, health: Arc<FallbackManager>) -> Self {
        let config = Config::builtin();
        let source = config
            .source("mangadex")
            .cloned()
            .unwrap_or_else(fallback_config);
        Self::with_config(source, config.genres_for("mangadex"), transport, health)
    }

    pub fn with_config(
        config: SourceConfig,
        genres: GenreMap,
        transport: Arc<dyn Transport>,
        health: Arc<FallbackManager>,
    ) -> Self {
        let api_base = if config.endpoint.is_empty() {
            config.mirrors.first().cloned().unwrap_or_default()
        } else {
            config.endpoint.clone()
        };
        let client = HttpClient::new(config.name.clone(), transport)
            .with_base_url(api_base)
            .with_timeout(config.timeout())
            .with_header("Accept", "application/json");
        Self {
            config,
            genres,
            client,
            health,
            images: ImagePipeline::new(),
        }
    }

    /// Extract the best title from a multi-language title map
    fn extract_best_title(title_map: &HashMap<String, String>) -> Option<String> {
        // Priority order for title languages
        let priority_langs = ["en", "en-us", "ja-ro", "ja"];

        priority_langs
            .iter()
            .filter_map(|lang| title_map.get(*lang))
            .chain(title_map.values())
            .map(|title| title.trim())
            .find(|title| !title.is_empty())
            .map(String::from)
    }

    fn content_rating_params() -> String {
        CONTENT_RATINGS
            .iter()
            .map(|rating| format!("contentRating[]={}", rating))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Format search query parameters
    fn format_search_query(&self, query: &str, filters: &SearchFilters) -> String {
        let word = filters.word.as_deref().unwrap_or(query);
        let offset = (filters.page() - 1) * SEARCH_LIMIT;
        let mut query_parts = vec![
            format!("title={}", urlencoding::encode(word)),
            format!("limit={}", SEARCH_LIMIT),
            format!("offset={}", offset),
            "includes[]=cover_art".to_string(),
            "includes[]=author".to_string(),
            "includes[]=artist".to_string(),
            format!(
                "availableTranslatedLanguage[]={}",
                urlencoding::encode(&self.config.language)
            ),
            Self::content_rating_params(),
        ];

        for tag in self.genres.map_all(&filters.genres) {
            query_parts.push(format!("includedTags[]={}", tag));
        }

        if let Some(status) = filters.status {
            query_parts.push(format!("status[]={}", status_key(status)));
        }

        // Add order parameters
        let order = match filters.sort {
            Some(SortOrder::LatestUpdate) => "order[latestUploadedChapter]=desc",
            Some(SortOrder::Popular) => "order[followedCount]=desc",
            Some(SortOrder::Rating) => "order[rating]=desc",
            Some(SortOrder::Title) => "order[title]=asc",
            Some(SortOrder::NewlyAdded) => "order[createdAt]=desc",
            Some(SortOrder::Relevance) | None => "order[relevance]=desc",
        };
        query_parts.push(order.to_string());

        query_parts.join("&")
    }

    /// Format chapter feed query parameters
    fn format_feed_query(offset: u32) -> String {
        format!(
            "limit={}&offset={}&order[chapter]=desc&includes[]=scanlation_group&{}",
            FEED_LIMIT,
            offset,
            Self::content_rating_params()
        )
    }

    /// Fetch all chapters for a manga (handles pagination)
    async fn fetch_all_chapters(&self, manga_id: &str) -> Result<Vec<MangaDexChapterData>> {
        let mut all_chapters = Vec::new();
        let mut offset = 0;

        for _ in 0..MAX_FEED_PAGES {
            let url = format!("/manga/{}/feed?{}", manga_id, Self::format_feed_query(offset));
            let response: MangaDexListResponse<MangaDexChapterData> =
                self.client.get_json(&url).await?;

            let page_len = response.data.len() as u32;
            all_chapters.extend(response.data);

            let limit = if response.limit == 0 { FEED_LIMIT } else { response.limit };
            // Stop once the reported total is covered
            if page_len == 0 || response.total <= response.offset + limit {
                break;
            }
            offset = response.offset + limit;
        }

        Ok(all_chapters)
    }

    /// Map MangaDex chapter data to the canonical chapter shape
    fn map_chapter(&self, data: &MangaDexChapterData) -> Chapter {
        let group = data
            .relationships
            .iter()
            .find(|rel| rel.rel_type == "scanlation_group")
            .and_then(|rel| rel.attributes.as_ref())
            .and_then(|attr| attr.name.clone());

        let record = json!({
            "id": data.id,
            "title": data.attributes.title.as_deref().filter(|t| !t.trim().is_empty()),
            "url": format!("https://mangadex.org/chapter/{}", data.id),
            "chapterNum": data.attributes.chapter,
            "volume": data.attributes.volume,
            "language": data.attributes.translated_language,
            "group": group,
            "uploadDate": data.attributes.publish_at.as_ref().or(data.attributes.readable_at.as_ref()),
        });
        normalize_chapter(&record, &self.config.name)
    }

    /// Extract cover filename from relationship data
    fn extract_cover_filename(data: &MangaDexMangaData) -> Option<&str> {
        data.relationships
            .iter()
            .find(|rel| rel.rel_type == "cover_art")
            .and_then(|rel| rel.attributes.as_ref())
            .and_then(|attr| attr.file_name.as_deref())
    }

    /// Map MangaDex manga data to the canonical manga shape
    fn map_manga(&self, data: &MangaDexMangaData) -> Manga {
        let attributes = &data.attributes;
        let title = Self::extract_best_title(&attributes.title).or_else(|| {
            attributes
                .alt_titles
                .iter()
                .find_map(Self::extract_best_title)
        });

        // Extract authors from relationships
        let mut authors: Vec<String> = Vec::new();
        for name in data
            .relationships
            .iter()
            .filter(|rel| rel.rel_type == "author" || rel.rel_type == "artist")
            .filter_map(|rel| rel.attributes.as_ref().and_then(|a| a.name.clone()))
        {
            if !authors.contains(&name) {
                authors.push(name);
            }
        }

        let genres: Vec<String> = attributes
            .tags
            .iter()
            .filter_map(|tag| Self::extract_best_title(&tag.attributes.name))
            .collect();

        let cover = Self::extract_cover_filename(data)
            .map(|file| format!("https://uploads.mangadex.org/covers/{}/{}", data.id, file));

        let record = json!({
            "id": data.id,
            "title": title,
            "url": format!("https://mangadex.org/title/{}", data.id),
            "cover": cover,
            "genres": genres,
            "authors": authors,
            "description": Self::extract_best_title(&attributes.description),
            "status": attributes.status,
            "latestChapter": attributes.last_chapter.as_deref().filter(|c| !c.is_empty()),
        });
        normalize_manga(&record, &self.config.name)
    }

    async fn search_inner(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Manga>> {
        let url = format!("/manga?{}", self.format_search_query(query, filters));
        let response: MangaDexListResponse<MangaDexMangaData> = self.client.get_json(&url).await?;
        Ok(response.data.iter().map(|m| self.map_manga(m)).collect())
    }

    async fn details_inner(&self, id: &str) -> Result<Option<MangaDetails>> {
        let Some(manga_id) = resolve_uuid(id, &self.config.name, &["title", "manga"]) else {
            warn!(source = %self.config.name, id, "Unresolvable manga id");
            return Ok(None);
        };

        let manga_url = format!(
            "/manga/{}?includes[]=cover_art&includes[]=author&includes[]=artist",
            manga_id
        );
        let (manga, feed) = futures::join!(
            self.client.get_json::<Value>(&manga_url),
            self.fetch_all_chapters(&manga_id),
        );

        let manga = manga?;
        if is_error_body(&manga) {
            debug!(source = %self.config.name, manga_id, "Manga record not found");
            return Ok(None);
        }
        let Ok(response) =
            serde_json::from_value::<MangaDexEntityResponse<MangaDexMangaData>>(manga)
        else {
            debug!(source = %self.config.name, manga_id, "Manga record has no data");
            return Ok(None);
        };
        let data = response.data;
        let feed = feed?;

        let parent_language = data.attributes.original_language.as_deref();
        let mut chapters: Vec<Chapter> = feed
            .iter()
            .map(|c| self.map_chapter(c))
            .filter(|c| {
                language_matches(c.language.as_deref(), &self.config.language, parent_language)
            })
            .collect();
        sort_by_number_desc(&mut chapters);

        Ok(Some(MangaDetails {
            manga: self.map_manga(&data),
            chapters,
            related_series: Vec::new(),
        }))
    }

    async fn images_inner(&self, id: &str) -> Result<Vec<String>> {
        let Some(chapter_id) = resolve_uuid(id, &self.config.name, &["chapter"]) else {
            warn!(source = %self.config.name, id, "Unresolvable chapter id");
            return Ok(Vec::new());
        };

        let url = format!("/at-home/server/{}", chapter_id);
        let pages: MangaDexPagesResponse = self.client.get_json(&url).await?;

        // Validate that we have the necessary data
        if pages.chapter.hash.is_empty() || pages.base_url.is_empty() {
            return Err(Error::source(&self.config.name, "at-home server returned no hash"));
        }

        let base = pages.base_url.trim_end_matches('/');
        let (prefix, files) = if !pages.chapter.data.is_empty() {
            (format!("{}/data/{}", base, pages.chapter.hash), pages.chapter.data)
        } else {
            (
                format!("{}/data-saver/{}", base, pages.chapter.hash),
                pages.chapter.data_saver,
            )
        };

        if files.is_empty() {
            return Ok(Vec::new());
        }

        let mut urls = Vec::with_capacity(files.len() + 1);
        urls.push(prefix);
        urls.extend(files);
        Ok(self.images.process(urls))
    }

    async fn latest_inner(&self) -> Result<Vec<Manga>> {
        let feed_url = format!(
            "/chapter?limit={}&order[readableAt]=desc&translatedLanguage[]={}&{}",
            LATEST_LIMIT,
            urlencoding::encode(&self.config.language),
            Self::content_rating_params()
        );
        let feed: MangaDexListResponse<MangaDexChapterData> =
            self.client.get_json(&feed_url).await?;

        // Newest chapter per series, in feed order
        let mut order: Vec<String> = Vec::new();
        let mut newest: HashMap<String, Chapter> = HashMap::new();
        for chapter in &feed.data {
            let Some(manga_id) = chapter
                .relationships
                .iter()
                .find(|rel| rel.rel_type == "manga")
                .map(|rel| rel.id.clone())
            else {
                continue;
            };
            if let Entry::Vacant(slot) = newest.entry(manga_id.clone()) {
                slot.insert(self.map_chapter(chapter));
                order.push(manga_id);
            }
        }

        if order.is_empty() {
            return Ok(Vec::new());
        }

        let ids = order
            .iter()
            .map(|id| format!("ids[]={}", id))
            .collect::<Vec<_>>()
            .join("&");
        let manga_url = format!(
            "/manga?limit={}&{}&includes[]=cover_art&{}",
            order.len(),
            ids,
            Self::content_rating_params()
        );
        let lookup: MangaDexListResponse<MangaDexMangaData> =
            self.client.get_json(&manga_url).await?;

        let mut by_id: HashMap<String, Manga> = lookup
            .data
            .iter()
            .map(|m| (m.id.clone(), self.map_manga(m)))
            .collect();

        let results = order
            .into_iter()
            .filter_map(|id| {
                let mut manga = by_id.remove(&id)?;
                if let Some(chapter) = newest.get(&id) {
                    manga.latest_chapter = Some(chapter.title.clone());
                    manga.latest_chapter_id = Some(chapter.id.clone());
                    manga.latest_chapter_url = Some(chapter.url.clone());
                }
                Some(manga)
            })
            .collect();

        Ok(results)
    }
}

#[async_trait]
impl Source for MangaDexSource {
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
        name: "mangadex".to_string(),
        display_name: "MangaDex".to_string(),
        priority: 2,
        enabled: true,
        mirrors: Vec::new(),
        api_type: ApiType::Rest,
        endpoint: "https://api.mangadex.org".to_string(),
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

/// `{"result": "error", ...}` bodies, which MangaDex sends with 4xx statuses.
fn is_error_body(body: &Value) -> bool {
    body.get("result").and_then(Value::as_str) == Some("error")
}

fn is_uuid(value: &str) -> bool {
    UUID.as_ref().is_some_and(|re| re.is_match(value))
}

/// A UUID from a bare id, `mangadex:{uuid}` or a URL with `/{marker}/{uuid}`.
fn resolve_uuid(input: &str, source: &str, markers: &[&str]) -> Option<String> {
    resolve_id(
        input,
        source,
        |id| is_uuid(id).then(|| id.to_lowercase()),
        |segments| {
            segment_after(segments, markers)
                .filter(|s| is_uuid(s))
                .map(str::to_lowercase)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "32d76d19-8a05-4db0-9fc2-e0b0648fe9d0";

    #[test]
    fn test_resolve_uuid_forms() {
        assert_eq!(resolve_uuid(ID, "mangadex", &["title"]).as_deref(), Some(ID));
        assert_eq!(
            resolve_uuid(&format!("mangadex:{}", ID), "mangadex", &["title"]).as_deref(),
            Some(ID)
        );
        assert_eq!(
            resolve_uuid(
                &format!("https://mangadex.org/title/{}/solo-leveling", ID),
                "mangadex",
                &["title"]
            )
            .as_deref(),
            Some(ID)
        );
        assert_eq!(resolve_uuid("solo-leveling", "mangadex", &["title"]), None);
    }

    #[test]
    fn test_best_title_prefers_english() {
        let mut titles = HashMap::new();
        titles.insert("ja".to_string(), "俺だけレベルアップな件".to_string());
        titles.insert("en".to_string(), "Solo Leveling".to_string());
        assert_eq!(
            MangaDexSource::extract_best_title(&titles).as_deref(),
            Some("Solo Leveling")
        );
        assert_eq!(MangaDexSource::extract_best_title(&HashMap::new()), None);
    }
}
