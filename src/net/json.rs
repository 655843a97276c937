//! JSON extraction utilities for provider API responses.
//!
//! Paths use dot notation; numeric segments index into arrays. The lenient
//! extractors accept numbers where strings are expected (and vice versa),
//! because providers are inconsistent about scalar types.
//!
//! # Examples
//!
//! ```rust
//! use hondana::net::json;
//! use serde_json::json;
//!
//! let data = json!({
//!     "data": {
//!         "comic": { "id": 343921, "name": "Solo Leveling", "genres": ["action"] }
//!     }
//! });
//!
//! assert_eq!(json::extract_str(&data, "data.comic.id").as_deref(), Some("343921"));
//! assert_eq!(json::extract_array(&data, "data.comic.genres").len(), 1);
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Borrows a value from nested JSON using dot notation.
///
/// ```rust
/// use hondana::net::json;
/// use serde_json::json;
///
/// let data = json!({"items": [{"title": "One"}, {"title": "Two"}]});
/// let second = json::extract_ref(&data, "items.1.title");
/// assert_eq!(second.and_then(|v| v.as_str()), Some("Two"));
/// assert!(json::extract_ref(&data, "items.5").is_none());
/// ```
pub fn extract_ref<'a>(json: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = json;

    for key in path.split('.') {
        current = match current {
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => current.get(key)?,
        };
    }

    Some(current)
}

/// Extracts a cloned value from nested JSON using dot notation.
pub fn extract_path(json: &Value, path: &str) -> Option<Value> {
    extract_ref(json, path).cloned()
}

/// Extracts and deserializes a value from a nested JSON path.
///
/// # Errors
///
/// * [`Error::Parse`](crate::Error::Parse) - If the path doesn't exist
/// * [`Error::Json`](crate::Error::Json) - If deserialization fails
pub fn extract_as<T>(json: &Value, path: &str) -> crate::Result<T>
where
    T: DeserializeOwned,
{
    extract_path(json, path)
        .ok_or_else(|| crate::Error::parse(format!("Path not found: {}", path)))
        .and_then(|v| serde_json::from_value(v).map_err(Into::into))
}

/// Extracts an array from a nested JSON path; missing or non-array values
/// give an empty vector.
pub fn extract_array(json: &Value, path: &str) -> Vec<Value> {
    extract_ref(json, path)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
}

/// Renders a scalar as a string. Empty strings, null, arrays and objects give `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// String at a path, accepting numbers and booleans.
pub fn extract_str(json: &Value, path: &str) -> Option<String> {
    extract_ref(json, path).and_then(scalar_to_string)
}

/// First non-empty string found along a fallback chain of paths.
///
/// ```rust
/// use hondana::net::json;
/// use serde_json::json;
///
/// let raw = json!({"name": "Tower of God"});
/// assert_eq!(
///     json::first_str(&raw, &["title", "name"]).as_deref(),
///     Some("Tower of God")
/// );
/// ```
pub fn first_str(json: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| extract_str(json, path))
}

/// Float at a path, accepting numeric strings.
pub fn extract_f64(json: &Value, path: &str) -> Option<f64> {
    let value = match extract_ref(json, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|f| f.is_finite())
}

/// First float found along a fallback chain of paths.
pub fn first_f64(json: &Value, paths: &[&str]) -> Option<f64> {
    paths.iter().find_map(|path| extract_f64(json, path))
}

/// Unsigned integer at a path, accepting numeric strings and whole floats.
pub fn extract_u64(json: &Value, path: &str) -> Option<u64> {
    match extract_ref(json, path)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// First unsigned integer found along a fallback chain of paths.
pub fn first_u64(json: &Value, paths: &[&str]) -> Option<u64> {
    paths.iter().find_map(|path| extract_u64(json, path))
}

/// A list of strings from an array of scalars, an array of objects carrying
/// `name`/`title`, or a comma-separated string.
///
/// ```rust
/// use hondana::net::json;
/// use serde_json::json;
///
/// let raw = json!({
///     "genres": [{"name": "Action"}, "Drama"],
///     "authors": "Chugong, DUBU"
/// });
/// assert_eq!(json::extract_strings(&raw, "genres"), vec!["Action", "Drama"]);
/// assert_eq!(json::extract_strings(&raw, "authors"), vec!["Chugong", "DUBU"]);
/// ```
pub fn extract_strings(json: &Value, path: &str) -> Vec<String> {
    match extract_ref(json, path) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(_) => first_str(item, &["name", "title", "label"]),
                other => scalar_to_string(other),
            })
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// First non-empty string list found along a fallback chain of paths.
pub fn first_strings(json: &Value, paths: &[&str]) -> Vec<String> {
    paths
        .iter()
        .map(|path| extract_strings(json, path))
        .find(|list| !list.is_empty())
        .unwrap_or_default()
}
