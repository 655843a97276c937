//! Client-side cookie accumulation.
//!
//! Cookies are captured from every response and replayed as a single `Cookie`
//! header. Nothing expires client-side: a cookie is only ever replaced by a
//! newer value under the same name.

/// Splits a combined `set-cookie` header value into individual cookies.
///
/// A comma only starts a new cookie when the text after it, up to the next `;`
/// or `,`, contains `=`. Commas inside attributes such as
/// `Expires=Wed, 21 Oct 2015 ...` are kept, including an `Expires` that is the
/// last attribute before the next cookie.
///
/// ```rust
/// use hondana::net::cookies::split_set_cookie;
///
/// let header = "a=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT; Path=/, b=2; Path=/";
/// let cookies = split_set_cookie(header);
/// assert_eq!(cookies.len(), 2);
/// assert!(cookies[0].contains("21 Oct 2015"));
/// assert!(cookies[1].starts_with("b=2"));
/// ```
pub fn split_set_cookie(header: &str) -> Vec<String> {
    let mut cookies = Vec::new();
    let mut start = 0;

    for (pos, ch) in header.char_indices() {
        if ch != ',' {
            continue;
        }
        let rest = &header[pos + 1..];
        let segment = rest.split(|c| c == ';' || c == ',').next().unwrap_or("");
        if segment.contains('=') {
            let cookie = header[start..pos].trim();
            if !cookie.is_empty() {
                cookies.push(cookie.to_string());
            }
            start = pos + 1;
        }
    }

    let tail = header[start..].trim();
    if !tail.is_empty() {
        cookies.push(tail.to_string());
    }

    cookies
}

/// Ordered cookie store keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    entries: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the `name=value` pair of a single cookie string; attributes
    /// after the first `;` are ignored.
    pub fn store(&mut self, cookie: &str) {
        let pair = cookie.split(';').next().unwrap_or("").trim();
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let value = value.trim().to_string();

        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Merges every cookie found in a (possibly combined) `set-cookie` value.
    pub fn absorb(&mut self, set_cookie: &str) {
        for cookie in split_set_cookie(set_cookie) {
            self.store(&cookie);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serializes the jar as a `Cookie` header value, or `None` when empty.
    pub fn header_value(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        Some(
            self.entries
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
