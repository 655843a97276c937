//! Static per-source configuration and genre mapping tables.
//!
//! Both tables are plain data: they can be replaced (for example loaded from a
//! JSON file) without touching adapter logic.
//!
//! ```rust
//! use hondana::config::Config;
//!
//! let config = Config::builtin();
//! let names: Vec<_> = config.enabled_sources().iter().map(|s| s.name.as_str()).collect();
//! assert_eq!(names.first(), Some(&"mangapark"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// How a source is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    /// `{query, variables}` POSTs to a fixed endpoint
    Graphql,
    /// Query-string JSON API
    Rest,
    /// JSON API with HTML scraping fallback
    Hybrid,
}

/// Static metadata for one source. Immutable at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    pub name: String,
    pub display_name: String,
    /// Lower is preferred; breaks ties when health is equal
    pub priority: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Candidate base URLs in probe order
    #[serde(default)]
    pub mirrors: Vec<String>,
    pub api_type: ApiType,
    /// Endpoint path (GraphQL) or API base URL (REST/hybrid)
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Target language code for chapter filtering
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_language() -> String {
    "en".to_string()
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Genre display name to provider identifier, matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenreMap(HashMap<String, String>);

impl GenreMap {
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(
            entries
                .into_iter()
                .map(|(name, id)| (name.to_lowercase(), id))
                .collect(),
        )
    }

    /// Looks up the provider identifier for a genre name.
    pub fn get(&self, genre: &str) -> Option<&str> {
        let key = genre.trim().to_lowercase();
        self.0
            .get(&key)
            .or_else(|| {
                self.0
                    .iter()
                    .find(|(name, _)| name.to_lowercase() == key)
                    .map(|(_, id)| id)
            })
            .map(String::as_str)
    }

    /// Maps genre names to identifiers, dropping unknown names.
    pub fn map_all(&self, genres: &[String]) -> Vec<String> {
        genres
            .iter()
            .filter_map(|g| match self.get(g) {
                Some(id) => Some(id.to_string()),
                None => {
                    tracing::debug!(genre = %g, "Genre has no provider mapping, skipping");
                    None
                }
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The complete source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub genres: HashMap<String, GenreMap>,
}

impl Config {
    /// Default table for the bundled sources.
    pub fn builtin() -> Self {
        let sources = vec![
            SourceConfig {
                name: "mangapark".to_string(),
                display_name: "MangaPark".to_string(),
                priority: 1,
                enabled: true,
                mirrors: [
                    "https://mangapark.net",
                    "https://mangapark.com",
                    "https://mangapark.org",
                    "https://mangapark.me",
                    "https://mangapark.io",
                ]
                .iter()
                .map(|m| m.to_string())
                .collect(),
                api_type: ApiType::Graphql,
                endpoint: "/apo/".to_string(),
                timeout_secs: 15,
                language: default_language(),
            },
            SourceConfig {
                name: "mangadex".to_string(),
                display_name: "MangaDex".to_string(),
                priority: 2,
                enabled: true,
                mirrors: vec!["https://api.mangadex.org".to_string()],
                api_type: ApiType::Rest,
                endpoint: "https://api.mangadex.org".to_string(),
                timeout_secs: 15,
                language: default_language(),
            },
            SourceConfig {
                name: "kissmanga".to_string(),
                display_name: "KissManga".to_string(),
                priority: 3,
                enabled: true,
                mirrors: vec!["https://kissmanga.in".to_string()],
                api_type: ApiType::Hybrid,
                endpoint: "/wp-admin/admin-ajax.php".to_string(),
                timeout_secs: 20,
                language: default_language(),
            },
        ];

        let mut genres = HashMap::new();
        genres.insert("mangapark".to_string(), mangapark_genres());
        genres.insert("mangadex".to_string(), mangadex_genres());
        genres.insert("kissmanga".to_string(), madara_genres());

        Self { sources, genres }
    }

    /// Parses and validates a JSON source table.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON source table from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::config("source table is empty"));
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(Error::config(format!(
                    "duplicate source name: {}",
                    source.name
                )));
            }
        }
        Ok(())
    }

    /// Enabled sources sorted by ascending priority.
    pub fn enabled_sources(&self) -> Vec<&SourceConfig> {
        let mut enabled: Vec<_> = self.sources.iter().filter(|s| s.enabled).collect();
        enabled.sort_by_key(|s| s.priority);
        enabled
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Genre table for a source; empty when none is configured.
    pub fn genres_for(&self, name: &str) -> GenreMap {
        self.genres.get(name).cloned().unwrap_or_default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builtin()
    }
}

fn pairs(entries: &[(&str, &str)]) -> GenreMap {
    GenreMap::new(
        entries
            .iter()
            .map(|(name, id)| (name.to_string(), id.to_string())),
    )
}

fn mangapark_genres() -> GenreMap {
    pairs(&[
        ("Action", "action"),
        ("Adventure", "adventure"),
        ("Comedy", "comedy"),
        ("Drama", "drama"),
        ("Fantasy", "fantasy"),
        ("Historical", "historical"),
        ("Horror", "horror"),
        ("Isekai", "isekai"),
        ("Martial Arts", "martial_arts"),
        ("Mystery", "mystery"),
        ("Psychological", "psychological"),
        ("Romance", "romance"),
        ("School Life", "school_life"),
        ("Sci-Fi", "sci_fi"),
        ("Slice of Life", "slice_of_life"),
        ("Sports", "sports"),
        ("Supernatural", "supernatural"),
        ("Thriller", "thriller"),
    ])
}

fn mangadex_genres() -> GenreMap {
    pairs(&[
        ("Action", "391b0423-d847-456f-aff0-8b0cfc03066b"),
        ("Adventure", "87cc87cd-a395-47af-b27a-93258283bbc6"),
        ("Comedy", "4d32cc48-9f00-4cca-9b5a-a839f0764984"),
        ("Drama", "b9af3a63-f058-46de-a9a0-e0c13906197a"),
        ("Fantasy", "cdc58593-87dd-415e-bbc0-2ec27bf404cc"),
        ("Horror", "cdad7e68-1419-41dd-bdce-27753074a640"),
        ("Isekai", "ace04997-f6bd-436e-b261-779182193d3d"),
        ("Mystery", "ee968100-4191-4968-93d3-f82d72be7e46"),
        ("Psychological", "3b60b75c-a2d7-4860-ab56-05f391bb889c"),
        ("Romance", "423e2eae-a7a2-4a8b-ac03-a8351462d71d"),
        ("Sci-Fi", "256c8bd9-4904-4360-bf4f-508a76d67183"),
        ("Slice of Life", "e5301a23-ebd9-49dd-a0cb-2add944c7fe9"),
        ("Sports", "69964a64-2f90-4d33-beeb-f3ed2875eb4c"),
        ("Thriller", "07251805-a27e-4d59-b488-f0bfbec15168"),
    ])
}

fn madara_genres() -> GenreMap {
    pairs(&[
        ("Action", "action"),
        ("Adventure", "adventure"),
        ("Comedy", "comedy"),
        ("Drama", "drama"),
        ("Fantasy", "fantasy"),
        ("Romance", "romance"),
        ("Manhwa", "manhwa"),
        ("Manhua", "manhua"),
        ("Isekai", "isekai"),
        ("Martial Arts", "martial-arts"),
        ("Shounen", "shounen"),
    ])
}
