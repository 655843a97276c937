//! Source-specific functionality tests
//!
//! Runs each bundled adapter against scripted provider responses.

use hondana::prelude::*;
use hondana::sources::{MadaraSource, MangaDexSource, MangaParkSource};
use serde_json::{Value, json};
use tokio::time::timeout;

mod common;
use common::{FakeTransport, KISSMANGA, MANGADEX_API, TEST_TIMEOUT, health, html, ok};

const MANGAPARK: &str = "https://mangapark.net";
const APO: &str = "https://mangapark.net/apo/";

fn request_body(request: &hondana::net::HttpRequest) -> Value {
    request
        .body
        .as_ref()
        .and_then(|b| serde_json::from_slice(b).ok())
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod mangapark_tests {
    use super::*;

    fn comic(id: &str, name: &str) -> Value {
        json!({
            "id": id,
            "data": {
                "id": id,
                "name": name,
                "urlPath": format!("/title/{}-en-{}", id, name.to_lowercase().replace(' ', "-")),
                "urlCoverOri": format!("/thumb/{}.jpg", id),
                "genres": ["action", "fantasy"],
                "authors": ["Chugong"],
                "artists": ["DUBU", "Chugong"],
                "originalStatus": "completed",
                "score_avg": 8.9,
                "follows": "12,345",
                "max_chapterNode": {
                    "id": "9013543",
                    "data": {
                        "id": "9013543",
                        "dname": "Chapter 200",
                        "urlPath": format!("/title/{}-en-x/9013543-chapter-200", id)
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn test_search_maps_comics_and_filters() {
        let transport = FakeTransport::new()
            .on_get("https://mangapark.net/", ok())
            .on_post(
                APO,
                "get_searchComic",
                common::json(200, json!({
                    "data": {"get_searchComic": {
                        "paging": {"page": 1, "pages": 1, "total": 1},
                        "items": [comic("343921", "Solo Leveling")]
                    }}
                })),
            )
            .shared();
        let source = MangaParkSource::new(transport.clone(), health());

        let filters = SearchFilters {
            genres: vec!["Action".into(), "Not A Genre".into()],
            status: Some(MangaStatus::Completed),
            sort: Some(SortOrder::Popular),
            ..Default::default()
        };
        let results = timeout(TEST_TIMEOUT, source.search("solo leveling", &filters))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        let manga = &results[0];
        assert_eq!(manga.id, "343921");
        assert_eq!(manga.title, "Solo Leveling");
        assert_eq!(manga.source, "mangapark");
        assert_eq!(manga.url, "https://mangapark.net/title/343921-en-solo-leveling");
        assert_eq!(manga.cover, "https://mangapark.net/thumb/343921.jpg");
        assert_eq!(manga.authors, vec!["Chugong", "DUBU"]);
        assert_eq!(manga.latest_chapter.as_deref(), Some("Chapter 200"));
        assert_eq!(manga.latest_chapter_id.as_deref(), Some("9013543"));
        assert_eq!(manga.views, Some(12345));
        assert_eq!(manga.rating, Some(8.9));

        let sent = transport.requests_to(APO);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("origin"), Some(MANGAPARK));
        let select = &request_body(&sent[0])["variables"]["select"];
        assert_eq!(select["word"], "solo leveling");
        assert_eq!(select["incGenres"], json!(["action"]));
        assert_eq!(select["origStatus"], "completed");
        assert_eq!(select["sortby"], "field_follow");
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_fails_over_to_reachable_mirror() {
        let mirrors = [
            "https://m1.mangapark.test",
            "https://m2.mangapark.test",
            "https://m3.mangapark.test",
        ];
        let transport = FakeTransport::new()
            .hang(mirrors[0])
            .on_get(
                "https://m2.mangapark.test/",
                html(404, "").with_set_cookie("mp_sess=xyz; Path=/"),
            )
            .on_post(
                "https://m2.mangapark.test/apo/",
                "get_searchComic",
                common::json(200, json!({
                    "data": {"get_searchComic": {"items": [comic("343921", "Solo Leveling")]}}
                })),
            )
            .on(mirrors[2], ok())
            .shared();
        let config = Config::builtin();
        let mut source_config = config.source("mangapark").cloned().unwrap();
        source_config.mirrors = mirrors.iter().map(|m| m.to_string()).collect();
        let source = MangaParkSource::with_config(
            source_config,
            config.genres_for("mangapark"),
            transport.clone(),
            health(),
        );

        let results = source.search("solo", &SearchFilters::default()).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://m2.mangapark.test/title/343921-en-solo-leveling");
        assert_eq!(source.client().active_mirror(), Some(mirrors[1]));

        let sent = transport.requests_to("https://m2.mangapark.test/apo/");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header("cookie"), Some("mp_sess=xyz"));
        assert!(transport.requests_to(mirrors[2]).is_empty());
    }

    #[tokio::test]
    async fn test_details_filters_language_and_orders_by_id() {
        let chapters = json!({"data": {"get_comicChapterList": [
            {"id": "100", "data": {"id": "100", "dname": "Ch.1", "serial": 1, "lang": "en",
                "urlPath": "/title/343921-en-x/100-ch-1", "dateCreate": 1_700_000_000_000_i64}},
            {"id": "3000", "data": {"id": "3000", "dname": "Cap.4", "serial": 4, "lang": "es"}},
            {"id": "2500", "data": {"id": "2500", "dname": "Ch.3", "serial": 3, "lang": "en"}},
            {"id": "999", "data": {"id": "999", "dname": "Ch.2", "serial": 2}}
        ]}});
        let mut node = comic("343921", "Solo Leveling");
        node["data"]["origLang"] = json!("ko");
        node["data"]["summary"] = json!("E-rank hunter");

        let transport = FakeTransport::new()
            .on_get("https://mangapark.net/", ok())
            .on_post(APO, "get_comicNode", common::json(200, json!({"data": {"get_comicNode": node}})))
            .on_post(APO, "get_comicChapterList", common::json(200, chapters))
            .shared();
        let health = health();
        let source = MangaParkSource::new(transport.clone(), health.clone());

        let details = source
            .get_manga_details("https://mangapark.io/title/343921-en-solo-leveling")
            .await
            .unwrap();

        assert_eq!(details.manga.title, "Solo Leveling");
        assert_eq!(details.manga.description.as_deref(), Some("E-rank hunter"));
        let ids: Vec<_> = details.chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["2500", "999", "100"]);
        assert_eq!(
            details.chapters[2].url,
            "https://mangapark.net/title/343921-en-x/100-ch-1"
        );
        assert!(details.chapters[2].upload_date.as_deref().unwrap().starts_with("2023-11-14"));

        // Both queries carry the resolved numeric id
        for request in transport.requests_to(APO) {
            let variables = &request_body(&request)["variables"];
            let id = variables.get("id").or_else(|| variables.get("comicId")).unwrap();
            assert_eq!(id, "343921");
        }
        assert_eq!(health.health("mangapark").unwrap().error_count, 0);
    }

    #[tokio::test]
    async fn test_missing_comic_node_is_none() {
        let transport = FakeTransport::new()
            .on_get("https://mangapark.net/", ok())
            .on_post(APO, "get_comicNode", common::json(200, json!({"data": {"get_comicNode": null}})))
            .on_post(APO, "get_comicChapterList", common::json(200, json!({"data": {"get_comicChapterList": []}})))
            .shared();
        let health = health();
        let source = MangaParkSource::new(transport, health.clone());

        assert!(source.get_manga_details("mangapark:1").await.is_none());
        assert!(source.get_manga_details("not-a-number").await.is_none());
        let report = health.health("mangapark").unwrap();
        assert!(report.healthy);
        assert_eq!(report.request_count, 2);
    }

    #[tokio::test]
    async fn test_chapter_images_repaired_then_sliced() {
        let transport = FakeTransport::new()
            .on_get("https://mangapark.net/", ok())
            .on_post(
                APO,
                "get_chapterNode",
                common::json(200, json!({"data": {"get_chapterNode": {"id": "9013543", "data": {
                    "id": "9013543",
                    "imageFile": {"urlList": [
                        "https://k03.mbwbm.org/media/7/a/1.webp",
                        "https://k05.mbxyz.org/media/7/a/long_800_12000_512.jpg"
                    ]}
                }}}})),
            )
            .shared();
        let source = MangaParkSource::new(transport, health());

        let images = source
            .get_chapter_images("https://mangapark.net/title/343921-en-x/9013543-chapter-200")
            .await;

        assert_eq!(images.len(), 5);
        assert_eq!(images[0], "https://n03.mbwbm.org/media/7/a/1.webp");
        let original = urlencoding::encode("https://n05.mbxyz.org/media/7/a/long_800_12000_512.jpg");
        assert!(images[1].starts_with("https://wsrv.nl/?url="));
        assert!(images[1].contains(original.as_ref()));
        assert!(images[1].contains("&cy=0&"));
        assert!(images[4].contains("&cy=9000&cw=800&ch=3000"));
    }

    #[tokio::test]
    async fn test_latest_uses_dedicated_query() {
        let transport = FakeTransport::new()
            .on_get("https://mangapark.net/", ok())
            .on_post(
                APO,
                "get_latestReleases",
                common::json(200, json!({"data": {"get_latestReleases": {
                    "items": [comic("1", "One"), comic("2", "Two")]
                }}})),
            )
            .shared();
        let source = MangaParkSource::new(transport.clone(), health());

        let latest = source.get_latest_releases().await;
        assert_eq!(latest.len(), 2);
        assert!(transport
            .requests_to(APO)
            .iter()
            .all(|r| !String::from_utf8_lossy(r.body.as_ref().unwrap()).contains("get_searchComic")));
    }

    #[tokio::test]
    async fn test_failure_returns_empty_and_rotates() {
        let transport = FakeTransport::new()
            .on_get("https://mangapark.net/", ok())
            .fail(APO)
            .shared();
        let health = health();
        let source = MangaParkSource::new(transport, health.clone());

        assert!(source.search("anything", &SearchFilters::default()).await.is_empty());
        let report = health.health("mangapark").unwrap();
        assert_eq!(report.error_count, 1);
        assert!(!report.healthy);
        assert_eq!(health.current_source(), "mangadex");
    }

    #[tokio::test]
    async fn test_graphql_errors_without_data_fail() {
        let transport = FakeTransport::new()
            .on_get("https://mangapark.net/", ok())
            .on_post(
                APO,
                "get_latestReleases",
                common::json(200, json!({"errors": [{"message": "rate limited"}], "data": null})),
            )
            .shared();
        let health = health();
        let source = MangaParkSource::new(transport, health.clone());

        assert!(source.get_latest_releases().await.is_empty());
        assert_eq!(health.health("mangapark").unwrap().error_count, 1);
    }
}

#[cfg(test)]
mod mangadex_tests {
    use super::*;

    const SOLO: &str = "32d76d19-8a05-4db0-9fc2-e0b0648fe9d0";

    fn chapter_uuid(n: u32) -> String {
        format!("a1b2c3d4-0000-4000-8000-{:012}", n)
    }

    fn manga_data(id: &str, title: &str) -> Value {
        json!({
            "id": id,
            "type": "manga",
            "attributes": {
                "title": {"en": title},
                "altTitles": [{"ko": "나 혼자만 레벨업"}],
                "description": {"en": "Hunters and gates"},
                "status": "completed",
                "originalLanguage": "ko",
                "lastChapter": "200",
                "tags": [{"id": "391b0423-d847-456f-aff0-8b0cfc03066b", "attributes": {"name": {"en": "Action"}}}]
            },
            "relationships": [
                {"id": "au1", "type": "author", "attributes": {"name": "Chugong"}},
                {"id": "ar1", "type": "artist", "attributes": {"name": "DUBU"}},
                {"id": "cv1", "type": "cover_art", "attributes": {"fileName": "cover.jpg"}}
            ]
        })
    }

    fn chapter(n: u32, number: &str, language: &str, manga: &str) -> Value {
        json!({
            "id": chapter_uuid(n),
            "type": "chapter",
            "attributes": {
                "chapter": number,
                "title": "",
                "translatedLanguage": language,
                "publishAt": "2024-01-01T00:00:00+00:00"
            },
            "relationships": [
                {"id": "g1", "type": "scanlation_group", "attributes": {"name": "Asura"}},
                {"id": manga, "type": "manga"}
            ]
        })
    }

    #[tokio::test]
    async fn test_search_builds_rest_query() {
        let transport = FakeTransport::new()
            .on_get(
                "https://api.mangadex.org/manga?",
                common::json(200, json!({"result": "ok", "data": [manga_data(SOLO, "Solo Leveling")], "total": 1})),
            )
            .shared();
        let source = MangaDexSource::new(transport.clone(), health());

        let filters = SearchFilters {
            genres: vec!["action".into()],
            status: Some(MangaStatus::Ongoing),
            sort: Some(SortOrder::LatestUpdate),
            ..Default::default()
        };
        let results = source.search("solo leveling", &filters).await;

        assert_eq!(results.len(), 1);
        let manga = &results[0];
        assert_eq!(manga.id, SOLO);
        assert_eq!(manga.title, "Solo Leveling");
        assert_eq!(manga.genres, vec!["Action"]);
        assert_eq!(manga.authors, vec!["Chugong", "DUBU"]);
        assert_eq!(
            manga.cover,
            format!("https://uploads.mangadex.org/covers/{}/cover.jpg", SOLO)
        );

        let url = &transport.requests_to(MANGADEX_API)[0].url;
        assert!(url.contains("title=solo%20leveling"));
        assert!(url.contains("includedTags[]=391b0423-d847-456f-aff0-8b0cfc03066b"));
        assert!(url.contains("status[]=ongoing"));
        assert!(url.contains("order[latestUploadedChapter]=desc"));
        assert!(url.contains("includes[]=cover_art"));
    }

    #[tokio::test]
    async fn test_details_paginates_feed_and_filters_language() {
        let base = format!("{}/manga/{}", MANGADEX_API, SOLO);
        let transport = FakeTransport::new()
            .on_get(
                &base,
                common::json(200, json!({"result": "ok", "data": manga_data(SOLO, "Solo Leveling")})),
            )
            .on_get(
                &format!("{}/feed?limit=500&offset=0", base),
                common::json(200, json!({
                    "result": "ok",
                    "data": [chapter(1, "1", "en", SOLO), chapter(2, "2", "ja", SOLO)],
                    "limit": 2, "offset": 0, "total": 4
                })),
            )
            .on_get(
                &format!("{}/feed?limit=500&offset=2", base),
                common::json(200, json!({
                    "result": "ok",
                    "data": [chapter(3, "10", "en", SOLO), chapter(4, "2.5", "en", SOLO)],
                    "limit": 2, "offset": 2, "total": 4
                })),
            )
            .shared();
        let source = MangaDexSource::new(transport.clone(), health());

        let details = source
            .get_manga_details(&format!("https://mangadex.org/title/{}/solo-leveling", SOLO))
            .await
            .unwrap();

        let numbers: Vec<_> = details
            .chapters
            .iter()
            .map(|c| c.chapter_num.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(numbers, vec!["10", "2.5", "1"]);
        assert_eq!(details.chapters[0].title, "Chapter 10");
        assert_eq!(details.chapters[0].group.as_deref(), Some("Asura"));
        assert_eq!(details.manga.description.as_deref(), Some("Hunters and gates"));

        let feed_requests = transport.requests_to(&format!("{}/feed", base));
        assert_eq!(feed_requests.len(), 2);
    }

    #[tokio::test]
    async fn test_details_not_found_is_none() {
        let missing = "00000000-0000-4000-8000-000000000000";
        let transport = FakeTransport::new()
            .on_get(
                &format!("{}/manga/{}", MANGADEX_API, missing),
                common::json(404, json!({"result": "error", "errors": [{"status": 404, "title": "Not found"}]})),
            )
            .shared();
        let source = MangaDexSource::new(transport, health());

        assert!(source.get_manga_details(missing).await.is_none());
        assert!(source.get_manga_details("mangadex:not-a-uuid").await.is_none());
    }

    #[tokio::test]
    async fn test_chapter_images_join_at_home_prefix() {
        let id = chapter_uuid(7);
        let transport = FakeTransport::new()
            .on_get(
                &format!("{}/at-home/server/{}", MANGADEX_API, id),
                common::json(200, json!({
                    "result": "ok",
                    "baseUrl": "https://cmdxd98sb0x3yprd.mangadex.network",
                    "chapter": {"hash": "3303dd03", "data": ["1-a.png", "2-b.png"], "dataSaver": ["1-a.jpg"]}
                })),
            )
            .shared();
        let source = MangaDexSource::new(transport, health());

        let images = source.get_chapter_images(&format!("mangadex:{}", id)).await;
        assert_eq!(
            images,
            vec![
                "https://cmdxd98sb0x3yprd.mangadex.network/data/3303dd03/1-a.png",
                "https://cmdxd98sb0x3yprd.mangadex.network/data/3303dd03/2-b.png",
            ]
        );
    }

    #[tokio::test]
    async fn test_latest_follows_feed_order() {
        let other = "11111111-2222-4333-8444-555555555555";
        let transport = FakeTransport::new()
            .on_get(
                "https://api.mangadex.org/chapter?",
                common::json(200, json!({"result": "ok", "data": [
                    chapter(21, "12", "en", SOLO),
                    chapter(22, "5", "en", other),
                    chapter(23, "11", "en", SOLO)
                ]})),
            )
            .on_get(
                "https://api.mangadex.org/manga?limit=2",
                common::json(200, json!({"result": "ok", "data": [
                    manga_data(other, "Other Work"),
                    manga_data(SOLO, "Solo Leveling")
                ]})),
            )
            .shared();
        let source = MangaDexSource::new(transport.clone(), health());

        let latest = source.get_latest_releases().await;
        let titles: Vec<_> = latest.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Solo Leveling", "Other Work"]);
        assert_eq!(latest[0].latest_chapter.as_deref(), Some("Chapter 12"));
        assert_eq!(latest[0].latest_chapter_id, Some(chapter_uuid(21)));

        let feed = &transport.requests_to("https://api.mangadex.org/chapter?")[0].url;
        assert!(feed.contains("order[readableAt]=desc"));
        let lookup = &transport.requests_to("https://api.mangadex.org/manga?")[0].url;
        assert!(lookup.contains(&format!("ids[]={}", SOLO)));
        assert!(lookup.contains(&format!("ids[]={}", other)));
    }
}

#[cfg(test)]
mod madara_tests {
    use super::*;

    const AJAX: &str = "https://kissmanga.in/wp-admin/admin-ajax.php";
    const SERIES: &str = "https://kissmanga.in/kissmanga/solo-leveling/";

    const SEARCH_PAGE: &str = r##"
        <div class="c-tabs-item">
          <div class="c-tabs-item__content">
            <div class="tab-thumb"><a href="https://kissmanga.in/kissmanga/solo-leveling/">
              <img src="data:image/gif;base64,R0lGOD" data-src="https://kissmanga.in/wp-content/uploads/solo.jpg"></a></div>
            <div class="tab-summary">
              <div class="post-title"><h3><a href="https://kissmanga.in/kissmanga/solo-leveling/">Solo Leveling</a></h3></div>
              <div class="mg_genres"><div class="summary-content"><a href="#">Action</a>, <a href="#">Fantasy</a></div></div>
              <div class="mg_status"><div class="summary-content">Completed</div></div>
            </div>
            <div class="tab-meta"><div class="latest-chap"><span class="chapter">
              <a href="https://kissmanga.in/kissmanga/solo-leveling/chapter-200/">Chapter 200</a></span></div></div>
          </div>
        </div>"##;

    const SERIES_PAGE: &str = r##"
        <div class="post-title"><h1>Solo Leveling</h1></div>
        <div class="summary_image"><a href="$"><img data-src="https://kissmanga.in/wp-content/uploads/solo-193x278.jpg"></a></div>
        <div class="post-content_item"><div class="summary-heading"><h5>Rating</h5></div>
          <div class="summary-content"><span id="averagerate">4.8</span></div></div>
        <div class="post-content_item"><div class="summary-heading"><h5>Author(s)</h5></div>
          <div class="summary-content"><div class="author-content"><a href="#">Chugong</a></div></div></div>
        <div class="post-content_item"><div class="summary-heading"><h5>Status</h5></div>
          <div class="summary-content">OnGoing</div></div>
        <div class="genres-content"><a href="#">Action</a><a href="#">Fantasy</a></div>
        <div class="description-summary"><div class="summary__content"><p>Ten years ago, the gates opened.</p></div></div>
        <ul class="main version-chap">
          <li class="wp-manga-chapter"><a href="https://kissmanga.in/kissmanga/solo-leveling/chapter-1/">Chapter 1</a>
            <span class="chapter-release-date"><i>January 1, 2020</i></span></li>
        </ul>"##;

    const AJAX_CHAPTERS: &str = r#"
        <ul class="main version-chap">
          <li class="wp-manga-chapter"><a href="https://kissmanga.in/kissmanga/solo-leveling/chapter-1/">Chapter 1</a></li>
          <li class="wp-manga-chapter"><a href="https://kissmanga.in/kissmanga/solo-leveling/chapter-110-5/">Side Story</a></li>
          <li class="wp-manga-chapter"><a href="https://kissmanga.in/kissmanga/solo-leveling/chapter-2/">Chapter 2</a></li>
        </ul>"#;

    fn source(transport: std::sync::Arc<FakeTransport>) -> MadaraSource {
        MadaraSource::kissmanga(transport, health())
    }

    #[tokio::test]
    async fn test_search_uses_json_api() {
        let transport = FakeTransport::new()
            .on_get("https://kissmanga.in/", ok())
            .on_post(
                AJAX,
                "wp-manga-search-manga",
                common::json(200, json!({"success": true, "data": [
                    {"title": "Solo Leveling", "url": SERIES, "type": "manga"}
                ]})),
            )
            .shared();
        let results = source(transport.clone())
            .search("solo", &SearchFilters::default())
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "solo-leveling");
        assert_eq!(results[0].url, SERIES);
        assert_eq!(results[0].source, "kissmanga");
        assert!(transport.requests_to("https://kissmanga.in/?s=").is_empty());
    }

    #[tokio::test]
    async fn test_empty_api_falls_back_to_search_page() {
        let transport = FakeTransport::new()
            .on_get("https://kissmanga.in/", ok())
            .on_post(AJAX, "wp-manga-search-manga", common::json(200, json!({"success": false, "data": []})))
            .on_get("https://kissmanga.in/?s=", html(200, SEARCH_PAGE))
            .shared();
        let results = source(transport)
            .search("solo", &SearchFilters::default())
            .await;

        assert_eq!(results.len(), 1);
        let manga = &results[0];
        assert_eq!(manga.id, "solo-leveling");
        assert_eq!(manga.cover, "https://kissmanga.in/wp-content/uploads/solo.jpg");
        assert_eq!(manga.genres, vec!["Action", "Fantasy"]);
        assert_eq!(manga.status.as_deref(), Some("Completed"));
        assert_eq!(manga.latest_chapter.as_deref(), Some("Chapter 200"));
    }

    #[tokio::test]
    async fn test_filters_skip_api() {
        let transport = FakeTransport::new()
            .on_get("https://kissmanga.in/", ok())
            .on_get("https://kissmanga.in/?s=", html(200, SEARCH_PAGE))
            .shared();
        let filters = SearchFilters {
            genres: vec!["Martial Arts".into()],
            status: Some(MangaStatus::Completed),
            ..Default::default()
        };
        let results = source(transport.clone()).search("solo", &filters).await;

        assert_eq!(results.len(), 1);
        assert!(transport.requests_to(AJAX).is_empty());
        let url = &transport.requests_to("https://kissmanga.in/?s=")[0].url;
        assert!(url.contains("post_type=wp-manga"));
        assert!(url.contains("genre%5B%5D=martial-arts"));
        assert!(url.contains("status%5B%5D=end"));
    }

    #[tokio::test]
    async fn test_details_prefers_ajax_chapter_list() {
        let transport = FakeTransport::new()
            .on_get("https://kissmanga.in/", ok())
            .on_get(SERIES, html(200, SERIES_PAGE))
            .on_post_any(&format!("{}ajax/chapters/", SERIES), html(200, AJAX_CHAPTERS))
            .shared();
        let details = source(transport)
            .get_manga_details("kissmanga:solo-leveling")
            .await
            .unwrap();

        assert_eq!(details.manga.title, "Solo Leveling");
        assert_eq!(details.manga.status.as_deref(), Some("OnGoing"));
        assert_eq!(details.manga.authors, vec!["Chugong"]);
        assert_eq!(details.manga.rating, Some(4.8));
        assert_eq!(
            details.manga.cover,
            "https://kissmanga.in/wp-content/uploads/solo-193x278.jpg"
        );

        let numbers: Vec<_> = details.chapters.iter().map(|c| c.number()).collect();
        assert_eq!(numbers, vec![110.5, 2.0, 1.0]);
        assert_eq!(details.chapters[2].id, "kissmanga/solo-leveling/chapter-1");
    }

    #[tokio::test]
    async fn test_details_falls_back_to_page_chapters() {
        let transport = FakeTransport::new()
            .on_get("https://kissmanga.in/", ok())
            .on_get(SERIES, html(200, SERIES_PAGE))
            .on_post_any(&format!("{}ajax/chapters/", SERIES), html(400, "0"))
            .shared();
        let details = source(transport)
            .get_manga_details(SERIES)
            .await
            .unwrap();

        assert_eq!(details.chapters.len(), 1);
        assert_eq!(details.chapters[0].upload_date.as_deref(), Some("January 1, 2020"));
    }

    #[tokio::test]
    async fn test_missing_series_is_none() {
        let transport = FakeTransport::new()
            .on_get("https://kissmanga.in/", ok())
            .shared();
        assert!(source(transport).get_manga_details("no-such-series").await.is_none());
    }

    #[tokio::test]
    async fn test_chapter_images_read_lazy_sources() {
        let page = r#"
            <div class="reading-content">
              <div class="page-break"><img data-src="
                https://kissmanga.in/wp-content/uploads/WP-manga/data/m1/1.jpg "></div>
              <div class="page-break"><img src="/wp-content/uploads/WP-manga/data/m1/2.jpg"></div>
            </div>"#;
        let transport = FakeTransport::new()
            .on_get("https://kissmanga.in/", ok())
            .on_get(
                "https://kissmanga.in/kissmanga/solo-leveling/chapter-1/",
                html(200, page),
            )
            .shared();
        let images = source(transport)
            .get_chapter_images("solo-leveling/chapter-1")
            .await;

        assert_eq!(
            images,
            vec![
                "https://kissmanga.in/wp-content/uploads/WP-manga/data/m1/1.jpg",
                "https://kissmanga.in/wp-content/uploads/WP-manga/data/m1/2.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn test_latest_reads_listing_page() {
        let listing = r#"
            <div class="page-item-detail manga">
              <div class="item-thumb"><a href="https://kissmanga.in/kissmanga/solo-leveling/"><img src="/c/solo.jpg"></a></div>
              <div class="item-summary">
                <div class="post-title"><h3><a href="https://kissmanga.in/kissmanga/solo-leveling/">Solo Leveling</a></h3></div>
                <div class="list-chapter"><div class="chapter-item"><span class="chapter">
                  <a href="https://kissmanga.in/kissmanga/solo-leveling/chapter-200/">Chapter 200</a></span></div></div>
              </div>
            </div>"#;
        let transport = FakeTransport::new()
            .on_get("https://kissmanga.in/", ok())
            .on_get("https://kissmanga.in/kissmanga/?m_orderby=latest", html(200, listing))
            .shared();
        let latest = source(transport).get_latest_releases().await;

        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].cover, "https://kissmanga.in/c/solo.jpg");
        assert_eq!(
            latest[0].latest_chapter_url.as_deref(),
            Some("https://kissmanga.in/kissmanga/solo-leveling/chapter-200/")
        );
    }

    #[tokio::test]
    async fn test_relative_links_keep_series_ids() {
        let search_page = r#"
            <div class="c-tabs-item__content">
              <div class="post-title"><h3><a href="/kissmanga/solo-leveling/">Solo Leveling</a></h3></div>
            </div>"#;
        let listing = r#"
            <div class="page-item-detail manga">
              <div class="post-title"><h3><a href=" /kissmanga/omniscient-reader/ ">Omniscient Reader</a></h3></div>
            </div>"#;
        let transport = FakeTransport::new()
            .on_get("https://kissmanga.in/", ok())
            .on_get("https://kissmanga.in/?s=", html(200, search_page))
            .on_get("https://kissmanga.in/kissmanga/?m_orderby=latest", html(200, listing))
            .shared();
        let source = source(transport);
        let filters = SearchFilters {
            genres: vec!["Action".into()],
            ..Default::default()
        };

        let results = source.search("solo", &filters).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "solo-leveling");
        assert_eq!(results[0].url, SERIES);

        let latest = source.get_latest_releases().await;
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].id, "omniscient-reader");
        assert_eq!(latest[0].url, "https://kissmanga.in/kissmanga/omniscient-reader/");
    }

    #[tokio::test]
    async fn test_unreachable_site_reports_failure() {
        let transport = FakeTransport::new().fail(KISSMANGA).shared();
        let health = health();
        let source = MadaraSource::kissmanga(transport, health.clone());

        assert!(source.get_latest_releases().await.is_empty());
        assert_eq!(health.health("kissmanga").unwrap().error_count, 1);
    }
}
