//! Common test utilities
//!
//! A scripted in-memory [`Transport`] so adapters, mirror resolution and the
//! aggregator run without network access.

use async_trait::async_trait;
use hondana::error::{Error, Result};
use hondana::health::FallbackManager;
use hondana::net::{HttpRequest, HttpResponse, Transport};
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[allow(dead_code)]
pub const MANGADEX_API: &str = "https://api.mangadex.org";

#[allow(dead_code)]
pub const KISSMANGA: &str = "https://kissmanga.in";

/// What a route answers with.
#[derive(Clone)]
#[allow(dead_code)]
pub enum Reply {
    Respond(HttpResponse),
    /// Transport-level failure (refused connection, DNS)
    Fail,
    /// Never answers within any sane timeout
    Hang,
}

#[derive(Clone)]
struct Route {
    prefix: String,
    method: Option<Method>,
    body_contains: Option<String>,
    reply: Reply,
}

impl Route {
    fn matches(&self, request: &HttpRequest) -> bool {
        if !request.url.starts_with(&self.prefix) {
            return false;
        }
        if let Some(method) = &self.method {
            if &request.method != method {
                return false;
            }
        }
        match &self.body_contains {
            Some(needle) => request
                .body
                .as_ref()
                .is_some_and(|b| String::from_utf8_lossy(b).contains(needle.as_str())),
            None => true,
        }
    }
}

/// Routes requests by the longest matching URL prefix. Unmatched requests get
/// an empty 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Vec<Route>,
    requests: Mutex<Vec<HttpRequest>>,
}

#[allow(dead_code)]
impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(
        mut self,
        prefix: &str,
        method: Option<Method>,
        body_contains: Option<&str>,
        reply: Reply,
    ) -> Self {
        self.routes.push(Route {
            prefix: prefix.to_string(),
            method,
            body_contains: body_contains.map(String::from),
            reply,
        });
        self
    }

    /// Any method to URLs starting with `prefix`.
    pub fn on(self, prefix: &str, response: HttpResponse) -> Self {
        self.route(prefix, None, None, Reply::Respond(response))
    }

    pub fn on_get(self, prefix: &str, response: HttpResponse) -> Self {
        self.route(prefix, Some(Method::GET), None, Reply::Respond(response))
    }

    /// POSTs to `prefix` whose body contains `needle`.
    pub fn on_post(self, prefix: &str, needle: &str, response: HttpResponse) -> Self {
        self.route(
            prefix,
            Some(Method::POST),
            Some(needle),
            Reply::Respond(response),
        )
    }

    pub fn on_post_any(self, prefix: &str, response: HttpResponse) -> Self {
        self.route(prefix, Some(Method::POST), None, Reply::Respond(response))
    }

    pub fn fail(self, prefix: &str) -> Self {
        self.route(prefix, None, None, Reply::Fail)
    }

    pub fn hang(self, prefix: &str) -> Self {
        self.route(prefix, None, None, Reply::Hang)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, prefix: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().push(request.clone());

        let reply = self
            .routes
            .iter()
            .filter(|route| route.matches(&request))
            .max_by_key(|route| {
                (
                    route.prefix.len(),
                    route.body_contains.is_some(),
                    route.method.is_some(),
                )
            })
            .map(|route| route.reply.clone());

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail) => Err(Error::Other(format!("connection refused: {}", request.url))),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Timeout { url: request.url })
            }
            None => Ok(HttpResponse::new(StatusCode::NOT_FOUND, "")),
        }
    }
}

#[allow(dead_code)]
pub fn json(status: u16, body: Value) -> HttpResponse {
    HttpResponse::new(
        StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
        body.to_string(),
    )
}

#[allow(dead_code)]
pub fn html(status: u16, body: &str) -> HttpResponse {
    HttpResponse::new(
        StatusCode::from_u16(status).unwrap_or(StatusCode::OK),
        body.to_string(),
    )
}

#[allow(dead_code)]
pub fn ok() -> HttpResponse {
    html(200, "<html></html>")
}

/// Health manager for the three bundled sources.
#[allow(dead_code)]
pub fn health() -> Arc<FallbackManager> {
    Arc::new(FallbackManager::new([
        ("mangapark", 1),
        ("mangadex", 2),
        ("kissmanga", 3),
    ]))
}
