//! HTML parsing utilities for scraped sources.
//!
//! Uses the `scraper` crate for CSS selector-based parsing and `rayon` for
//! parallel processing of long item lists.
//!
//! # Examples
//!
//! ```rust
//! use hondana::net::html;
//!
//! let document = html::parse(r#"
//!     <div class="post-title"><h3><a href="/manga/solo-leveling/">Solo Leveling</a></h3></div>
//! "#);
//! assert_eq!(html::select_text(&document, ".post-title a").as_deref(), Some("Solo Leveling"));
//! assert_eq!(
//!     html::select_attr(&document, ".post-title a", "href").as_deref(),
//!     Some("/manga/solo-leveling/")
//! );
//! ```

use rayon::prelude::*;
use scraper::{ElementRef, Html, Selector};

/// Attributes lazy-loading themes use for the real image source, in lookup order.
const IMAGE_SOURCE_ATTRS: &[&str] = &["data-src", "data-lazy-src", "data-original", "src"];

/// Parses an HTML document from a string.
pub fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

/// Text content of the first element matching a CSS selector, trimmed.
///
/// Returns `None` when nothing matches, the selector is invalid or the text is empty.
pub fn select_text(html: &Html, selector: &str) -> Option<String> {
    Selector::parse(selector).ok().and_then(|sel| {
        html.select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|text| !text.is_empty())
    })
}

/// Attribute value of the first element matching a CSS selector.
pub fn select_attr(html: &Html, selector: &str, attr: &str) -> Option<String> {
    Selector::parse(selector).ok().and_then(|sel| {
        html.select(&sel)
            .next()
            .and_then(|el| el.value().attr(attr).map(|v| v.trim().to_string()))
    })
}

/// Text content of all elements matching a CSS selector.
///
/// ```rust
/// use hondana::net::html;
///
/// let document = html::parse(r#"
///     <div class="genres-content"><a>Action</a>, <a>Fantasy</a></div>
/// "#);
/// assert_eq!(html::select_all_text(&document, ".genres-content a"), vec!["Action", "Fantasy"]);
/// ```
pub fn select_all_text(html: &Html, selector: &str) -> Vec<String> {
    Selector::parse(selector)
        .ok()
        .map(|sel| {
            html.select(&sel)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Attribute values of all elements matching a CSS selector.
pub fn select_all_attr(html: &Html, selector: &str, attr: &str) -> Vec<String> {
    Selector::parse(selector)
        .ok()
        .map(|sel| {
            html.select(&sel)
                .filter_map(|el| el.value().attr(attr).map(|v| v.trim().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// The real source of an `<img>`, looking through lazy-load attributes first.
///
/// Whitespace and line breaks some themes leave inside the attribute are removed.
pub fn image_source(element: ElementRef<'_>) -> Option<String> {
    IMAGE_SOURCE_ATTRS
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(|src| src.split_whitespace().collect::<String>())
        .find(|src| !src.is_empty() && !src.starts_with("data:"))
}

/// Text of an element, trimmed.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parses list items from HTML in parallel using rayon.
///
/// Every element matching `selector` is re-parsed as its own fragment so the
/// items can be processed concurrently; elements for which `parser` returns
/// `None` are dropped. Input order is preserved.
///
/// ```rust
/// use hondana::net::html;
///
/// let document = html::parse(r#"
///     <div class="c-tabs-item__content"><h3><a href="/manga/a/">A</a></h3></div>
///     <div class="c-tabs-item__content"><h3><a href="/manga/b/">B</a></h3></div>
/// "#);
///
/// let titles = html::parse_items(&document, ".c-tabs-item__content", |element| {
///     let sel = scraper::Selector::parse("h3 a").ok()?;
///     element.select(&sel).next().map(html::element_text)
/// });
/// assert_eq!(titles, vec!["A", "B"]);
/// ```
pub fn parse_items<T, F>(html: &Html, selector: &str, parser: F) -> Vec<T>
where
    T: Send,
    F: Fn(ElementRef) -> Option<T> + Sync,
{
    Selector::parse(selector)
        .ok()
        .map(|sel| {
            // Convert ElementRef to HTML strings which can be processed in parallel
            let elements: Vec<String> = html.select(&sel).map(|el| el.html()).collect();

            elements
                .into_par_iter()
                .filter_map(|html_str| {
                    let doc = Html::parse_fragment(&html_str);
                    let element = doc.root_element();
                    parser(element)
                })
                .collect()
        })
        .unwrap_or_default()
}
