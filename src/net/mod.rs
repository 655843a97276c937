//! Network plumbing: transports, the per-source HTTP client and parsing helpers.
//!
//! - **Transport**: the [`Transport`] seam every request goes through;
//!   [`ReqwestTransport`] is the production implementation
//! - **HTTP Client**: [`HttpClient`] resolves a working mirror, rotates the
//!   user agent once per process and carries a cookie jar across calls
//! - **Content Parsing**: [`html`] and [`json`] helpers
//!
//! # Examples
//!
//! ```rust,no_run
//! use hondana::net::{HttpClient, ReqwestTransport};
//! use std::sync::Arc;
//!
//! # async fn example() -> hondana::Result<()> {
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let client = HttpClient::new("mangapark", transport)
//!     .with_mirrors(vec!["https://mangapark.net".into(), "https://mangapark.com".into()]);
//!
//! let html = client.get_text("/search?word=solo").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub mod cookies;
pub mod html;
pub mod json;

use cookies::CookieJar;

/// Browser user agents rotated between process runs.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0",
];

/// Picked once and kept for the lifetime of the process.
static USER_AGENT: Lazy<&'static str> = Lazy::new(|| {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
});

/// The user agent sent with every request from this process.
pub fn user_agent() -> &'static str {
    &USER_AGENT
}

/// A fully-formed outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Adds a `set-cookie` header (builder style, mainly for transports and tests).
    pub fn with_set_cookie(mut self, cookie: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            self.headers.append(header::SET_COOKIE, value);
        }
        self
    }

    /// All `set-cookie` values, each possibly combining several cookies.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The seam between HTTP clients and the network.
///
/// Implementations only move bytes: they report transport failures (DNS,
/// refused connections, timeouts) as errors and return every HTTP status,
/// including error statuses, as a normal response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Production transport backed by a pooled `reqwest` client.
///
/// The client is configured with:
/// - Connection pooling (10 idle connections per host)
/// - Compression support (gzip, brotli)
/// - Manual cookie handling (cookies live in each [`HttpClient`])
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        let mut builder = self.client.request(method, &url).headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Err(Error::Timeout { url }),
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Per-call request options. Headers given here override the client defaults.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    /// A JSON POST with `content-type: application/json`.
    pub fn post_json(body: &serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(Bytes::from(body.to_string())),
            ..Default::default()
        }
        .header("content-type", "application/json")
    }

    /// A url-encoded form POST.
    pub fn post_form(fields: &[(&str, &str)]) -> Self {
        let encoded = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        Self {
            method: Method::POST,
            body: Some(Bytes::from(encoded)),
            ..Default::default()
        }
        .header("content-type", "application/x-www-form-urlencoded")
    }

    /// Adds a header; invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
            self.headers.insert(name, value);
        }
        self
    }
}

/// Per-source HTTP client with mirror resolution and session state.
///
/// `HttpClient` owns the session of one source: the active mirror (resolved once
/// by probing candidates in order), the cookie jar accumulated from every
/// response, and default headers. It never fails because of an HTTP status;
/// only transport errors are returned as `Err`.
///
/// # Examples
///
/// ```rust,no_run
/// use hondana::net::{HttpClient, ReqwestTransport, RequestOptions};
/// use std::sync::Arc;
///
/// # async fn example() -> hondana::Result<()> {
/// let client = HttpClient::new("mangapark", Arc::new(ReqwestTransport::new()?))
///     .with_mirrors(vec!["https://mangapark.net".into()])
///     .with_header("Origin", "https://mangapark.net");
///
/// let body = serde_json::json!({"query": "{ __typename }"});
/// let response = client.fetch("/apo/", RequestOptions::post_json(&body)).await?;
/// println!("HTTP {}", response.status);
/// # Ok(())
/// # }
/// ```
pub struct HttpClient {
    source_id: String,
    transport: Arc<dyn Transport>,
    mirrors: Vec<String>,
    probe_mirrors: bool,
    probe_path: String,
    probe_timeout: Duration,
    timeout: Duration,
    headers: HeaderMap,
    base_url: OnceCell<String>,
    cookies: Mutex<CookieJar>,
}

impl HttpClient {
    /// Creates a client with a 3 second probe timeout and 15 second request timeout.
    pub fn new(source_id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            source_id: source_id.into(),
            transport,
            mirrors: Vec::new(),
            probe_mirrors: true,
            probe_path: "/".to_string(),
            probe_timeout: Duration::from_secs(3),
            timeout: Duration::from_secs(15),
            headers: HeaderMap::new(),
            base_url: OnceCell::new(),
            cookies: Mutex::new(CookieJar::new()),
        }
    }

    /// Candidate mirrors in probe order.
    pub fn with_mirrors(mut self, mirrors: Vec<String>) -> Self {
        self.mirrors = mirrors
            .into_iter()
            .map(|m| m.trim_end_matches('/').to_string())
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    /// Uses a single fixed base URL without probing.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self = self.with_mirrors(vec![base_url.into()]);
        self.probe_mirrors = false;
        self
    }

    pub fn with_probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = path.into();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a default header sent with every request.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// The resolved mirror, if [`initialize`](HttpClient::initialize) has run.
    pub fn active_mirror(&self) -> Option<&str> {
        self.base_url.get().map(String::as_str)
    }

    /// The current cookie jar serialized as a `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        self.cookies.lock().header_value()
    }

    /// Resolves the working mirror. Runs the probes at most once; later calls
    /// return the stored mirror.
    pub async fn initialize(&self) -> &str {
        self.base_url.get_or_init(|| self.resolve_mirror()).await
    }

    async fn resolve_mirror(&self) -> String {
        let Some(first) = self.mirrors.first() else {
            warn!(source = %self.source_id, "No mirrors configured");
            return String::new();
        };

        if !self.probe_mirrors {
            return first.clone();
        }

        for mirror in &self.mirrors {
            let url = join_url(mirror, &self.probe_path);
            let mut request = HttpRequest::get(&url);
            request.timeout = Some(self.probe_timeout);
            if let Ok(value) = HeaderValue::from_str(user_agent()) {
                request.headers.insert(header::USER_AGENT, value);
            }

            match tokio::time::timeout(self.probe_timeout, self.transport.send(request)).await {
                // Client errors still prove the site is up.
                Ok(Ok(response)) if response.status.as_u16() < 500 => {
                    self.absorb_cookies(&response);
                    info!(
                        source = %self.source_id,
                        mirror = %mirror,
                        status = response.status.as_u16(),
                        "Mirror accepted"
                    );
                    return mirror.clone();
                }
                Ok(Ok(response)) => {
                    debug!(
                        source = %self.source_id,
                        mirror = %mirror,
                        status = response.status.as_u16(),
                        "Mirror rejected"
                    );
                }
                Ok(Err(e)) => {
                    debug!(
                        source = %self.source_id,
                        mirror = %mirror,
                        error = %e,
                        "Mirror probe failed"
                    );
                }
                Err(_) => {
                    debug!(source = %self.source_id, mirror = %mirror, "Mirror probe timed out");
                }
            }
        }

        warn!(
            source = %self.source_id,
            mirror = %first,
            "All mirror probes failed, falling back to the first mirror"
        );
        first.clone()
    }

    fn absorb_cookies(&self, response: &HttpResponse) {
        let values = response.set_cookies();
        if values.is_empty() {
            return;
        }
        let mut jar = self.cookies.lock();
        for value in values {
            jar.absorb(value);
        }
    }

    /// Sends a request relative to the active mirror (absolute URLs are sent as is).
    ///
    /// Default headers are `User-Agent`, `Referer` (the active mirror) and
    /// `Cookie`; headers from `options` win on conflicts. Cookies from the
    /// response are merged into the jar.
    ///
    /// # Errors
    ///
    /// Only transport failures ([`Error::Network`], [`Error::Timeout`]) and a
    /// relative path without any mirror. HTTP error statuses are returned as
    /// ordinary responses.
    pub async fn fetch(&self, path: &str, options: RequestOptions) -> Result<HttpResponse> {
        let base = self.initialize().await;

        let url = if is_absolute(path) {
            path.to_string()
        } else if base.is_empty() {
            return Err(Error::config(format!(
                "{}: no mirror available for relative path {}",
                self.source_id, path
            )));
        } else {
            join_url(base, path)
        };

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(user_agent()) {
            headers.insert(header::USER_AGENT, value);
        }
        if !base.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&format!("{}/", base)) {
                headers.insert(header::REFERER, value);
            }
        }
        if let Some(cookie) = self.cookie_header() {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                headers.insert(header::COOKIE, value);
            }
        }
        for (name, value) in self.headers.iter().chain(options.headers.iter()) {
            headers.insert(name.clone(), value.clone());
        }

        let request = HttpRequest {
            method: options.method,
            url,
            headers,
            body: options.body,
            timeout: Some(self.timeout),
        };

        let response = self.transport.send(request).await?;
        self.absorb_cookies(&response);

        match response.status.as_u16() {
            403 | 503 => warn!(
                source = %self.source_id,
                status = response.status.as_u16(),
                "Possible bot challenge"
            ),
            429 => warn!(source = %self.source_id, "Rate limited"),
            _ => {}
        }

        Ok(response)
    }

    /// GET and return the body as text.
    ///
    /// # Errors
    ///
    /// [`Error::Http`] only when the status is an error and the body is empty.
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let response = self.fetch(path, RequestOptions::get()).await?;
        self.ensure_body(&response)?;
        Ok(response.text())
    }

    /// GET and deserialize the body as JSON.
    pub async fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.fetch(path, RequestOptions::get()).await?;
        self.parse_json(&response)
    }

    /// POST a JSON body and deserialize the JSON answer.
    pub async fn post_json<T>(&self, path: &str, body: &serde_json::Value) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.fetch(path, RequestOptions::post_json(body)).await?;
        self.parse_json(&response)
    }

    /// POST a url-encoded form and return the body as text.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<String> {
        let response = self.fetch(path, RequestOptions::post_form(fields)).await?;
        self.ensure_body(&response)?;
        Ok(response.text())
    }

    fn ensure_body(&self, response: &HttpResponse) -> Result<()> {
        if response.body.is_empty() && !response.status.is_success() {
            return Err(Error::Http {
                src: self.source_id.clone(),
                status: response.status.as_u16(),
            });
        }
        Ok(())
    }

    fn parse_json<T>(&self, response: &HttpResponse) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.ensure_body(response)?;
        serde_json::from_slice(&response.body).map_err(Into::into)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("source_id", &self.source_id)
            .field("mirrors", &self.mirrors)
            .field("active_mirror", &self.active_mirror())
            .finish()
    }
}

/// Whether a path is already a full `http(s)` URL.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Joins a base URL and a path with exactly one slash between them.
///
/// ```rust
/// use hondana::net::join_url;
///
/// assert_eq!(join_url("https://a.org/", "/apo/"), "https://a.org/apo/");
/// assert_eq!(join_url("https://a.org", "x"), "https://a.org/x");
/// ```
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
