//! Adapter for sites built on the Madara WordPress theme.
//!
//! Madara sites expose a small JSON search endpoint through `admin-ajax.php`
//! and render everything else as HTML. Search uses the JSON endpoint first and
//! falls back to scraping the search page; chapter lists come from the
//! `ajax/chapters/` endpoint with the in-page list as fallback.
//!
//! Sites differ in path layout and markup, so both are configurable through
//! [`MadaraConfig`] and [`MadaraSelectors`]. [`MadaraConfig::kissmanga`] is
//! the bundled preset.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    config::{ApiType, Config, GenreMap, SourceConfig},
    error::Result,
    health::FallbackManager,
    images::ImagePipeline,
    net::{self, HttpClient, RequestOptions, Transport, html},
    normalize::{
        UNKNOWN_TITLE, normalize_chapter, normalize_manga, normalize_manga_list, sort_by_number_desc,
    },
    source::Source,
    types::{Chapter, Manga, MangaDetails, MangaStatus, SearchFilters, SortOrder},
};

use super::{IdInput, absolute_url, classify_id, segment_after};

static CHAPTER_IN_TITLE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(?:chapter|ch\.?)\s*(\d+(?:\.\d+)?)").ok());
static CHAPTER_IN_SLUG: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(?:chapter|ch)-?(\d+(?:[.-]\d+)?)").ok());
static ANY_NUMBER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").ok());

/// CSS selectors for the parts of a Madara page the adapter reads.
#[derive(Debug, Clone)]
pub struct MadaraSelectors {
    /// One result on the search page
    pub search_item: String,
    /// One entry on listing pages (latest updates)
    pub listing_item: String,
    /// Title link inside a search or listing item
    pub item_title: String,
    pub item_cover: String,
    /// Latest chapter link inside a search or listing item
    pub item_latest: String,
    pub item_genres: String,
    pub item_authors: String,
    pub item_status: String,
    pub series_title: String,
    pub series_cover: String,
    pub series_description: String,
    pub series_genres: String,
    pub series_authors: String,
    pub series_rating: String,
    /// Label/value rows of the series summary block (status lives here)
    pub series_meta_item: String,
    pub chapter_item: String,
    pub chapter_date: String,
    /// Page images, tried in order until one matches
    pub page_images: Vec<String>,
}

impl Default for MadaraSelectors {
    fn default() -> Self {
        Self {
            search_item: ".c-tabs-item__content".to_string(),
            listing_item: ".page-item-detail".to_string(),
            item_title: ".post-title a".to_string(),
            item_cover: "img".to_string(),
            item_latest: ".chapter a, .latest-chap a".to_string(),
            item_genres: ".mg_genres a, .genres a".to_string(),
            item_authors: ".mg_author a, .author a".to_string(),
            item_status: ".mg_status .summary-content".to_string(),
            series_title: ".post-title h1, .post-title h3".to_string(),
            series_cover: ".summary_image img".to_string(),
            series_description: ".description-summary .summary__content, .manga-excerpt"
                .to_string(),
            series_genres: ".genres-content a".to_string(),
            series_authors: ".author-content a, .artist-content a".to_string(),
            series_rating: "#averagerate, .score".to_string(),
            series_meta_item: ".post-content_item".to_string(),
            chapter_item: "li.wp-manga-chapter".to_string(),
            chapter_date: ".chapter-release-date".to_string(),
            page_images: vec![
                ".page-break img".to_string(),
                ".reading-content img".to_string(),
                ".wp-manga-chapter-img".to_string(),
            ],
        }
    }
}

/// Site layout of one Madara source.
#[derive(Debug, Clone)]
pub struct MadaraConfig {
    pub source: SourceConfig,
    /// First path segment of series pages, e.g. `manga` for `/manga/{slug}/`
    pub series_path: String,
    pub headers: Vec<(String, String)>,
    pub selectors: MadaraSelectors,
}

impl MadaraConfig {
    /// Defaults for a stock Madara installation.
    pub fn new(source: SourceConfig) -> Self {
        Self {
            source,
            series_path: "manga".to_string(),
            headers: vec![
                (
                    "Accept".to_string(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
                ),
                ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
            ],
            selectors: MadaraSelectors::default(),
        }
    }

    /// KissManga (`kissmanga.in`), using the builtin source entry.
    pub fn kissmanga() -> Self {
        let source = Config::builtin()
            .source("kissmanga")
            .cloned()
            .unwrap_or_else(|| SourceConfig {
                name: "kissmanga".to_string(),
                display_name: "KissManga".to_string(),
                priority: 3,
                enabled: true,
                mirrors: vec!["https://kissmanga.in".to_string()],
                api_type: ApiType::Hybrid,
                endpoint: "/wp-admin/admin-ajax.php".to_string(),
                timeout_secs: 20,
                language: "en".to_string(),
            });
        let mut config = Self::new(source);
        config.series_path = "kissmanga".to_string();
        config
            .headers
            .push(("Cache-Control".to_string(), "no-cache".to_string()));
        config
    }

    pub fn with_series_path(mut self, path: impl Into<String>) -> Self {
        self.series_path = path.into().trim_matches('/').to_string();
        self
    }

    pub fn with_selectors(mut self, selectors: MadaraSelectors) -> Self {
        self.selectors = selectors;
        self
    }
}

/// Scraped series page, before the chapter list is attached.
struct SeriesPage {
    manga: Manga,
    chapters: Vec<Chapter>,
}

pub struct MadaraSource {
    config: MadaraConfig,
    genres: GenreMap,
    client: HttpClient,
    health: Arc<FallbackManager>,
    images: ImagePipeline,
}

impl MadaraSource {
    pub fn new(
        config: MadaraConfig,
        genres: GenreMap,
        transport: Arc<dyn Transport>,
        health: Arc<FallbackManager>,
    ) -> Self {
        let mut client = HttpClient::new(config.source.name.clone(), transport)
            .with_mirrors(config.source.mirrors.clone())
            .with_timeout(config.source.timeout());

        for (key, value) in &config.headers {
            client = client.with_header(key, value);
        }

        Self {
            config,
            genres,
            client,
            health,
            images: ImagePipeline::new(),
        }
    }

    /// The KissManga preset with its builtin genre table.
    pub fn kissmanga(transport: Arc<dyn Transport>, health: Arc<FallbackManager>) -> Self {
        let genres = Config::builtin().genres_for("kissmanga");
        Self::new(MadaraConfig::kissmanga(), genres, transport, health)
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    fn source_name(&self) -> &str {
        &self.config.source.name
    }

    fn item_id(&self, href: &str) -> Option<String> {
        series_slug(href, &self.config.series_path)
    }

    async fn search_api(&self, word: &str) -> Result<Vec<Manga>> {
        let body = self
            .client
            .post_form(
                &self.config.source.endpoint,
                &[("action", "wp-manga-search-manga"), ("title", word)],
            )
            .await?;
        let payload: Value = serde_json::from_str(&body)?;

        if payload.get("success").and_then(Value::as_bool) == Some(false) {
            return Ok(Vec::new());
        }

        let records: Vec<Value> = net::json::extract_array(&payload, "data")
            .iter()
            .filter_map(|item| {
                let url = net::json::extract_str(item, "url")?;
                Some(json!({
                    "id": self.item_id(&url),
                    "title": net::json::first_str(item, &["title", "name"]),
                    "url": url,
                }))
            })
            .collect();

        Ok(normalize_manga_list(&records, self.source_name()))
    }

    fn search_page_path(&self, word: &str, filters: &SearchFilters) -> String {
        let page = filters.page();
        let mut path = if page > 1 {
            format!("/page/{}/", page)
        } else {
            "/".to_string()
        };
        path.push_str(&format!("?s={}&post_type=wp-manga", urlencoding::encode(word)));

        for genre in self.genres.map_all(&filters.genres) {
            path.push_str(&format!("&genre%5B%5D={}", urlencoding::encode(&genre)));
        }
        if let Some(status) = filters.status {
            path.push_str(&format!("&status%5B%5D={}", status_key(status)));
        }
        if let Some(order) = filters.sort.and_then(order_key) {
            path.push_str(&format!("&m_orderby={}", order));
        }
        path
    }

    async fn search_html(&self, word: &str, filters: &SearchFilters) -> Result<Vec<Manga>> {
        let page = self
            .client
            .get_text(&self.search_page_path(word, filters))
            .await?;
        let base = self.client.initialize().await;
        Ok(self.parse_items(&page, &self.config.selectors.search_item, base))
    }

    /// Parses search or listing items in parallel.
    fn parse_items(&self, page: &str, item_selector: &str, base: &str) -> Vec<Manga> {
        let document = html::parse(page);
        let selectors = &self.config.selectors;

        let records = html::parse_items(&document, item_selector, |item| {
            let link = select_first(item, &selectors.item_title)?;
            let url = absolute_url(base, link.value().attr("href")?);
            let latest = select_first(item, &selectors.item_latest);

            Some(json!({
                "id": self.item_id(&url),
                "title": html::element_text(link),
                "url": url,
                "cover": select_first(item, &selectors.item_cover)
                    .and_then(html::image_source)
                    .map(|src| absolute_url(base, &src)),
                "genres": select_texts(item, &selectors.item_genres),
                "authors": select_texts(item, &selectors.item_authors),
                "status": select_first(item, &selectors.item_status).map(html::element_text),
                "latestChapter": latest.map(html::element_text),
                "latestChapterUrl": latest
                    .and_then(|a| a.value().attr("href"))
                    .map(|h| absolute_url(base, h)),
            }))
        });

        normalize_manga_list(&records, self.source_name())
    }

    async fn search_inner(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Manga>> {
        let word = filters.word.as_deref().unwrap_or(query);
        let narrowed = !filters.genres.is_empty()
            || filters.status.is_some()
            || filters.sort.is_some()
            || filters.page() > 1;

        if !narrowed && !self.config.source.endpoint.is_empty() {
            match self.search_api(word).await {
                Ok(results) if !results.is_empty() => return Ok(results),
                Ok(_) => {
                    debug!(source = %self.source_name(), "Search API returned nothing, scraping")
                }
                Err(e) => {
                    debug!(source = %self.source_name(), error = %e, "Search API failed, scraping")
                }
            }
        }

        self.search_html(word, filters).await
    }

    fn parse_series_page(&self, page: &str, slug: &str, url: &str, base: &str) -> SeriesPage {
        let document = html::parse(page);
        let selectors = &self.config.selectors;

        let status = Selector::parse(&selectors.series_meta_item)
            .ok()
            .and_then(|sel| {
                document.select(&sel).find_map(|row| {
                    let heading = select_first(row, ".summary-heading").map(html::element_text)?;
                    if !heading.to_lowercase().contains("status") {
                        return None;
                    }
                    select_first(row, ".summary-content").map(html::element_text)
                })
            });

        let cover = Selector::parse(&selectors.series_cover)
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .and_then(html::image_source)
            .map(|src| absolute_url(base, &src));

        let record = json!({
            "id": slug,
            "title": html::select_text(&document, &selectors.series_title),
            "url": url,
            "cover": cover,
            "description": html::select_text(&document, &selectors.series_description),
            "genres": html::select_all_text(&document, &selectors.series_genres),
            "authors": html::select_all_text(&document, &selectors.series_authors),
            "status": status,
            "rating": html::select_text(&document, &selectors.series_rating),
        });

        SeriesPage {
            manga: normalize_manga(&record, self.source_name()),
            chapters: self.parse_chapters(page, base),
        }
    }

    fn parse_chapters(&self, page: &str, base: &str) -> Vec<Chapter> {
        let document = html::parse(page);
        let selectors = &self.config.selectors;
        let Ok(item_selector) = Selector::parse(&selectors.chapter_item) else {
            return Vec::new();
        };

        document
            .select(&item_selector)
            .filter_map(|item| {
                let link = select_first(item, "a")?;
                let href = link.value().attr("href")?.trim();
                if href.is_empty() {
                    return None;
                }
                let url = absolute_url(base, href);
                let title = html::element_text(link);
                let record = json!({
                    "id": chapter_path(&url, base),
                    "title": title,
                    "url": url,
                    "chapterNum": chapter_number(&title, href),
                    "uploadDate": select_first(item, &selectors.chapter_date).map(html::element_text),
                });
                Some(normalize_chapter(&record, self.source_name()))
            })
            .filter(|c| !c.id.is_empty())
            .collect()
    }

    async fn details_inner(&self, id: &str) -> Result<Option<MangaDetails>> {
        let Some(slug) = self.resolve_series(id) else {
            warn!(source = %self.source_name(), id, "Unresolvable series id");
            return Ok(None);
        };

        let base = self.client.initialize().await.to_string();
        let series_url = net::join_url(&base, &format!("{}/{}/", self.config.series_path, slug));
        let ajax_url = net::join_url(&series_url, "ajax/chapters/");
        let (series, ajax) = futures::join!(
            self.client.fetch(&series_url, RequestOptions::get()),
            self.client.fetch(&ajax_url, RequestOptions::post_form(&[])),
        );

        let response = series?;
        if response.status.as_u16() == 404 {
            debug!(source = %self.source_name(), slug, "Series page not found");
            return Ok(None);
        }
        let page = response.text();
        if page.trim().is_empty() {
            return Ok(None);
        }

        let SeriesPage {
            manga,
            chapters: in_page,
        } = self.parse_series_page(&page, &slug, &series_url, &base);
        if manga.title.is_empty() || manga.title == UNKNOWN_TITLE {
            debug!(source = %self.source_name(), slug, "Series page has no title");
            return Ok(None);
        }

        let ajax_chapters = match ajax {
            Ok(response) if response.status.is_success() => {
                self.parse_chapters(&response.text(), &base)
            }
            Ok(response) => {
                let status = response.status.as_u16();
                debug!(source = %self.source_name(), status, "Chapter endpoint refused");
                Vec::new()
            }
            Err(e) => {
                debug!(source = %self.source_name(), error = %e, "Chapter endpoint failed");
                Vec::new()
            }
        };

        let mut chapters = if ajax_chapters.is_empty() {
            in_page
        } else {
            ajax_chapters
        };
        sort_by_number_desc(&mut chapters);

        Ok(Some(MangaDetails {
            manga,
            chapters,
            related_series: Vec::new(),
        }))
    }

    fn parse_page_images(&self, page: &str, base: &str) -> Vec<String> {
        let document = html::parse(page);
        for selector in &self.config.selectors.page_images {
            let Ok(sel) = Selector::parse(selector) else {
                continue;
            };
            let pages: Vec<String> = document
                .select(&sel)
                .filter_map(html::image_source)
                .filter(|src| !src.contains("placeholder") && !src.contains("loading"))
                .map(|src| absolute_url(base, &src))
                .collect();
            if !pages.is_empty() {
                return pages;
            }
        }
        Vec::new()
    }

    async fn images_inner(&self, id: &str) -> Result<Vec<String>> {
        let Some(url) = self.resolve_chapter(id).await else {
            warn!(source = %self.source_name(), id, "Unresolvable chapter id");
            return Ok(Vec::new());
        };

        let page = self.client.get_text(&url).await?;
        let base = self.client.initialize().await;
        let pages = self.parse_page_images(&page, base);
        debug!(source = %self.source_name(), count = pages.len(), "Chapter pages found");
        Ok(self.images.process(pages))
    }

    async fn latest_inner(&self) -> Result<Vec<Manga>> {
        let path = format!("/{}/?m_orderby=latest", self.config.series_path);
        let page = self.client.get_text(&path).await?;
        let base = self.client.initialize().await;
        Ok(self.parse_items(&page, &self.config.selectors.listing_item, base))
    }

    fn resolve_series(&self, input: &str) -> Option<String> {
        match classify_id(input, self.source_name())? {
            IdInput::Bare(id) => {
                let id = id
                    .strip_prefix(&format!("{}/", self.config.series_path))
                    .unwrap_or(&id)
                    .to_string();
                id.split('/').next().filter(|s| !s.is_empty()).map(String::from)
            }
            IdInput::Url(segments) => {
                segment_after(&segments, &[self.config.series_path.as_str()]).map(String::from)
            }
        }
    }

    /// Absolute chapter URL from a URL, `slug/chapter` id or series-path id.
    async fn resolve_chapter(&self, input: &str) -> Option<String> {
        match classify_id(input, self.source_name())? {
            IdInput::Url(_) => Some(input.trim().to_string()),
            IdInput::Bare(id) => {
                let prefix = format!("{}/", self.config.series_path);
                let path = if id.starts_with(&prefix) {
                    id
                } else if id.contains('/') {
                    format!("{}{}", prefix, id)
                } else {
                    return None;
                };
                let base = self.client.initialize().await;
                Some(net::join_url(base, &format!("{}/", path)))
            }
        }
    }
}

#[async_trait]
impl Source for MadaraSource {
    fn id(&self) -> &str {
        &self.config.source.name
    }

    fn name(&self) -> &str {
        &self.config.source.display_name
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

fn select_first<'a>(element: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    element.select(&sel).next()
}

fn select_texts(element: ElementRef<'_>, selector: &str) -> Vec<String> {
    Selector::parse(selector)
        .map(|sel| {
            element
                .select(&sel)
                .map(html::element_text)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn status_key(status: MangaStatus) -> &'static str {
    match status {
        MangaStatus::Ongoing => "on-going",
        MangaStatus::Completed => "end",
        MangaStatus::Hiatus => "on-hold",
        MangaStatus::Cancelled => "canceled",
    }
}

fn order_key(sort: SortOrder) -> Option<&'static str> {
    match sort {
        SortOrder::Relevance => None,
        SortOrder::LatestUpdate => Some("latest"),
        SortOrder::Popular => Some("views"),
        SortOrder::Rating => Some("rating"),
        SortOrder::Title => Some("alphabet"),
        SortOrder::NewlyAdded => Some("new-manga"),
    }
}

/// Series slug from a series or chapter URL: the segment after `series_path`.
fn series_slug(href: &str, series_path: &str) -> Option<String> {
    let url = url::Url::parse(href).ok()?;
    let segments: Vec<String> = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    segment_after(&segments, &[series_path])
        .or_else(|| segments.last().map(String::as_str))
        .map(String::from)
}

/// Chapter id: the URL path below the site base, without surrounding slashes.
fn chapter_path(url: &str, base: &str) -> String {
    url.strip_prefix(base.trim_end_matches('/'))
        .unwrap_or(url)
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .trim_matches('/')
        .to_string()
}

/// Chapter number from the link text, then from the URL slug.
fn chapter_number(title: &str, href: &str) -> Option<String> {
    let capture = |re: &Lazy<Option<Regex>>, text: &str| -> Option<String> {
        re.as_ref()?
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().replace('-', "."))
    };

    capture(&CHAPTER_IN_TITLE, title)
        .or_else(|| {
            let slug = href.trim_end_matches('/').rsplit('/').next().unwrap_or("");
            capture(&CHAPTER_IN_SLUG, slug)
        })
        .or_else(|| capture(&ANY_NUMBER, title))
}
