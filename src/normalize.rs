//! Conversion of provider payloads into the canonical [`Manga`] and [`Chapter`] shapes.
//!
//! Providers disagree on casing and naming (`title` vs `name`, `latestChapter`
//! vs `latest_chapter`), so every field is read through a fallback chain. The
//! functions here never panic and never fail: input that is not an object
//! degrades to a minimal record titled [`UNKNOWN_TITLE`].
//!
//! ```rust
//! use hondana::normalize::normalize_manga;
//! use serde_json::json;
//!
//! let manga = normalize_manga(&json!({"id": 7, "name": "Vagabond"}), "mangapark");
//! assert_eq!(manga.id, "7");
//! assert_eq!(manga.title, "Vagabond");
//!
//! let broken = normalize_manga(&json!(null), "mangapark");
//! assert_eq!(broken.title, "Unknown");
//! ```

use serde_json::{Map, Value};
use std::cmp::Ordering;
use tracing::error;

use crate::net::json;
use crate::types::{Chapter, Manga};

/// Title given to records that could not be read.
pub const UNKNOWN_TITLE: &str = "Unknown";

const ID_KEYS: &[&str] = &["id", "hid", "_id", "slug", "mangaId", "manga_id"];
const TITLE_KEYS: &[&str] = &["title", "name", "dname", "displayName", "display_name"];
const URL_KEYS: &[&str] = &["url", "urlPath", "href", "link"];
const COVER_KEYS: &[&str] = &[
    "cover", "coverUrl", "cover_url", "urlCoverOri", "thumbnail", "image", "img",
];
const GENRE_KEYS: &[&str] = &["genres", "genre", "tags"];
const AUTHOR_KEYS: &[&str] = &["authors", "author", "artists"];
const DESCRIPTION_KEYS: &[&str] = &["description", "summary", "desc", "synopsis"];
const STATUS_KEYS: &[&str] = &["status", "originalStatus", "uploadStatus"];
const RATING_KEYS: &[&str] = &["rating", "score", "score_avg", "scoreAvg"];
const VIEWS_KEYS: &[&str] = &["views", "viewCount", "view_count", "follows"];
const LATEST_KEYS: &[&str] = &["latestChapter", "latest_chapter", "lastChapter", "last_chapter"];
const LATEST_URL_KEYS: &[&str] = &["latestChapterUrl", "latest_chapter_url", "lastChapterUrl"];
const LATEST_ID_KEYS: &[&str] = &["latestChapterId", "latest_chapter_id", "lastChapterId"];

const CHAPTER_NUM_KEYS: &[&str] = &["chapterNum", "chapter_num", "chapter", "chap", "number", "serial"];
const VOLUME_KEYS: &[&str] = &["volNum", "vol_num", "volume", "vol"];
const LANGUAGE_KEYS: &[&str] = &["language", "lang", "translatedLanguage", "translated_language"];
const GROUP_KEYS: &[&str] = &["group", "groupName", "group_name", "scanlator", "srcTitle"];
const DATE_KEYS: &[&str] = &[
    "uploadDate", "upload_date", "publishAt", "readableAt", "dateCreate", "created_at", "date",
];

/// A provider record as received, before any field is interpreted.
#[derive(Debug, Clone, Copy)]
pub enum RawRecord<'a> {
    /// A JSON object; fields are read through fallback chains.
    Object(&'a Map<String, Value>),
    /// Anything else (null, arrays, scalars).
    Malformed(&'a Value),
}

impl<'a> From<&'a Value> for RawRecord<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => RawRecord::Object(map),
            other => RawRecord::Malformed(other),
        }
    }
}

fn first_in(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(json::scalar_to_string))
}

fn fallback_id(value: &Value) -> String {
    match value {
        Value::String(_) | Value::Number(_) => json::scalar_to_string(value).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Converts any raw provider record into a [`Manga`].
pub fn normalize_manga(raw: &Value, source: &str) -> Manga {
    let object = match RawRecord::from(raw) {
        RawRecord::Object(map) => map,
        RawRecord::Malformed(value) => {
            error!(source, raw = %value, "Malformed manga record, using fallback");
            return Manga {
                id: fallback_id(value),
                title: UNKNOWN_TITLE.to_string(),
                source: source.to_string(),
                ..Default::default()
            };
        }
    };

    let id = first_in(object, ID_KEYS).unwrap_or_default();
    let title = first_in(object, TITLE_KEYS).unwrap_or_else(|| {
        if id.is_empty() {
            String::new()
        } else {
            UNKNOWN_TITLE.to_string()
        }
    });

    Manga {
        id,
        title,
        url: first_in(object, URL_KEYS).unwrap_or_default(),
        cover: first_in(object, COVER_KEYS).unwrap_or_default(),
        genres: json::first_strings(raw, GENRE_KEYS),
        latest_chapter: first_in(object, LATEST_KEYS),
        latest_chapter_url: first_in(object, LATEST_URL_KEYS),
        latest_chapter_id: first_in(object, LATEST_ID_KEYS),
        description: first_in(object, DESCRIPTION_KEYS),
        authors: json::first_strings(raw, AUTHOR_KEYS),
        status: first_in(object, STATUS_KEYS),
        rating: json::first_f64(raw, RATING_KEYS),
        views: json::first_u64(raw, VIEWS_KEYS),
        source: first_in(object, &["source"]).unwrap_or_else(|| source.to_string()),
    }
}

/// Converts any raw provider record into a [`Chapter`].
pub fn normalize_chapter(raw: &Value, source: &str) -> Chapter {
    let object = match RawRecord::from(raw) {
        RawRecord::Object(map) => map,
        RawRecord::Malformed(value) => {
            error!(source, raw = %value, "Malformed chapter record, using fallback");
            return Chapter {
                id: fallback_id(value),
                title: UNKNOWN_TITLE.to_string(),
                source: Some(source.to_string()),
                ..Default::default()
            };
        }
    };

    let id = first_in(object, ID_KEYS).unwrap_or_default();
    let chapter_num = first_in(object, CHAPTER_NUM_KEYS);
    let title = first_in(object, TITLE_KEYS)
        .or_else(|| chapter_num.as_ref().map(|n| format!("Chapter {}", n)))
        .unwrap_or_else(|| {
            if id.is_empty() {
                String::new()
            } else {
                UNKNOWN_TITLE.to_string()
            }
        });

    Chapter {
        id,
        title,
        url: first_in(object, URL_KEYS).unwrap_or_default(),
        chapter_num,
        vol_num: first_in(object, VOLUME_KEYS),
        language: first_in(object, LANGUAGE_KEYS),
        group: first_in(object, GROUP_KEYS),
        upload_date: first_in(object, DATE_KEYS),
        source: Some(first_in(object, &["source"]).unwrap_or_else(|| source.to_string())),
    }
}

/// Normalizes a list and drops records that have neither an id nor a title.
pub fn normalize_manga_list(raw: &[Value], source: &str) -> Vec<Manga> {
    raw.iter()
        .map(|item| normalize_manga(item, source))
        .filter(|m| !(m.id.is_empty() && m.title.is_empty()))
        .collect()
}

/// Normalizes a chapter list, drops empty records and sorts by descending
/// chapter number. Non-numeric numbers count as 0 and end up last.
pub fn normalize_chapter_list(raw: &[Value], source: &str) -> Vec<Chapter> {
    let mut chapters: Vec<Chapter> = raw
        .iter()
        .map(|item| normalize_chapter(item, source))
        .filter(|c| !(c.id.is_empty() && c.title.is_empty()))
        .collect();
    sort_by_number_desc(&mut chapters);
    chapters
}

/// Stable sort by descending parsed chapter number.
pub fn sort_by_number_desc(chapters: &mut [Chapter]) {
    chapters.sort_by(|a, b| {
        b.number()
            .partial_cmp(&a.number())
            .unwrap_or(Ordering::Equal)
    });
}
