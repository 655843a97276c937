//! HTTP client tests: mirror resolution, session cookies and status handling.

use hondana::Error;
use hondana::net::{HttpClient, RequestOptions, user_agent};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{FakeTransport, html};

fn client(transport: Arc<FakeTransport>, mirrors: &[&str]) -> HttpClient {
    HttpClient::new("test", transport)
        .with_mirrors(mirrors.iter().map(|m| m.to_string()).collect())
        .with_probe_timeout(Duration::from_millis(50))
}

#[cfg(test)]
mod mirror_tests {
    use super::*;

    #[tokio::test]
    async fn test_hung_mirror_skipped_and_client_error_accepted() {
        let transport = FakeTransport::new()
            .hang("https://dead.example")
            .on(
                "https://alive.example/",
                html(404, "").with_set_cookie("session=abc; Path=/; HttpOnly"),
            )
            .on("https://alive.example/api/", common::json(200, json!({"ok": true})))
            .shared();
        let client = client(transport.clone(), &["https://dead.example", "https://alive.example"]);

        assert_eq!(client.initialize().await, "https://alive.example");
        assert_eq!(client.active_mirror(), Some("https://alive.example"));
        assert_eq!(client.cookie_header().as_deref(), Some("session=abc"));

        let body: Value = client.get_json("/api/status").await.unwrap();
        assert_eq!(body["ok"], true);

        let sent = transport.requests_to("https://alive.example/api/");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("cookie"), Some("session=abc"));
        assert_eq!(sent[0].header("referer"), Some("https://alive.example/"));
        assert_eq!(sent[0].header("user-agent"), Some(user_agent()));
    }

    #[tokio::test]
    async fn test_probes_run_once() {
        let transport = FakeTransport::new()
            .on("https://a.example/", html(200, "<html></html>"))
            .shared();
        let client = client(transport.clone(), &["https://a.example"]);

        client.initialize().await;
        client.initialize().await;
        let _ = client.get_text("/x").await;

        let probes: Vec<_> = transport
            .requests()
            .into_iter()
            .filter(|r| r.url == "https://a.example/")
            .collect();
        assert_eq!(probes.len(), 1);
    }

    #[tokio::test]
    async fn test_server_errors_rejected_then_first_mirror_fallback() {
        let transport = FakeTransport::new()
            .on("https://one.example/", html(502, "bad gateway"))
            .fail("https://two.example")
            .shared();
        let client = client(transport.clone(), &["https://one.example", "https://two.example"]);

        assert_eq!(client.initialize().await, "https://one.example");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_second_mirror_after_server_error() {
        let transport = FakeTransport::new()
            .on("https://one.example/", html(503, ""))
            .on("https://two.example/", html(200, "ok"))
            .shared();
        let client = client(transport, &["https://one.example", "https://two.example"]);
        assert_eq!(client.initialize().await, "https://two.example");
    }
}

#[cfg(test)]
mod request_tests {
    use super::*;

    #[tokio::test]
    async fn test_cookies_accumulate_and_replace() {
        let transport = FakeTransport::new()
            .on("https://site.example/", html(200, "").with_set_cookie("a=1"))
            .on(
                "https://site.example/login",
                html(200, "").with_set_cookie("b=2, a=3; Path=/"),
            )
            .shared();
        let client = client(transport.clone(), &["https://site.example"]);

        client.get_text("/login").await.unwrap();
        assert_eq!(client.cookie_header().as_deref(), Some("a=3; b=2"));
    }

    #[tokio::test]
    async fn test_caller_headers_win_and_absolute_urls_bypass_base() {
        let transport = FakeTransport::new()
            .on("https://site.example/", html(200, ""))
            .on("https://cdn.example/", html(200, "image"))
            .shared();
        let client = client(transport.clone(), &["https://site.example"]).with_header("Accept", "text/html");

        let options = RequestOptions::get()
            .header("Referer", "https://elsewhere.example/")
            .header("Accept", "image/webp");
        let response = client
            .fetch("https://cdn.example/page.webp", options)
            .await
            .unwrap();
        assert_eq!(response.text(), "image");

        let sent = transport.requests_to("https://cdn.example/");
        assert_eq!(sent[0].header("referer"), Some("https://elsewhere.example/"));
        assert_eq!(sent[0].header("accept"), Some("image/webp"));
    }

    #[tokio::test]
    async fn test_error_status_bodies_still_parse() {
        let transport = FakeTransport::new()
            .on("https://api.example/", html(200, ""))
            .on(
                "https://api.example/manga/missing",
                common::json(404, json!({"result": "error", "errors": [{"status": 404}]})),
            )
            .on("https://api.example/blocked", html(503, ""))
            .shared();
        let client = client(transport, &["https://api.example"]);

        let body: Value = client.get_json("/manga/missing").await.unwrap();
        assert_eq!(body["result"], "error");

        let blocked = client.get_json::<Value>("/blocked").await;
        assert!(matches!(blocked, Err(Error::Http { status: 503, .. })));
    }

    #[tokio::test]
    async fn test_transport_failure_is_error() {
        let transport = FakeTransport::new()
            .on("https://site.example/", html(200, ""))
            .fail("https://site.example/down")
            .shared();
        let client = client(transport, &["https://site.example"]);
        assert!(client.get_text("/down").await.is_err());
    }

    #[tokio::test]
    async fn test_no_mirrors_fails_relative_requests() {
        let transport = FakeTransport::new().shared();
        let client = HttpClient::new("empty", transport);

        assert_eq!(client.initialize().await, "");
        let result = client.get_text("/anything").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_form_posts_are_encoded() {
        let transport = FakeTransport::new()
            .on("https://site.example/", html(200, ""))
            .on_post_any("https://site.example/ajax", html(200, "{}"))
            .shared();
        let client = client(transport.clone(), &["https://site.example"]);

        client
            .post_form("/ajax", &[("action", "wp-manga-search-manga"), ("title", "solo leveling")])
            .await
            .unwrap();

        let sent = transport.requests_to("https://site.example/ajax");
        let body = String::from_utf8_lossy(sent[0].body.as_ref().unwrap()).to_string();
        assert_eq!(body, "action=wp-manga-search-manga&title=solo%20leveling");
        assert_eq!(
            sent[0].header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }
}
