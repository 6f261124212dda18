//! End-to-end guided crawls against mock blogs

use crate::common::{
    create_test_client, create_test_context, create_test_settings, mount_feed, mount_html,
    page_with_feed, rss_feed, CountingClient,
};
use blog_archive::crawler::{HistoricalError, HistoricalOutcome};
use blog_archive::fetch::{
    request_page, CachingHttpClient, CrawlContext, FetchCache, HttpClient,
};
use blog_archive::title::LinkTitleSource;
use blog_archive::{discover_feeds_at_url, guided_crawl, to_canonical_link, DiscoverFeedsResult, GuidedCrawlResult};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn discover_and_crawl(input: &str, ctx: &mut CrawlContext) -> GuidedCrawlResult {
    match discover_feeds_at_url(input, 1, ctx).await {
        DiscoverFeedsResult::SingleFeed { feed, start_page } => {
            guided_crawl(start_page.as_ref(), &feed, ctx).await
        }
        other => panic!("Expected a single feed, got {:?}", other),
    }
}

/// A blog with a recent-posts list on its home page and a full archive page
async fn mount_archive_blog(server: &MockServer) {
    let base = server.uri();
    mount_html(
        server,
        "/",
        page_with_feed(
            r#"<nav><a href="/">Home</a><a href="/archive/">Archive</a></nav>
            <div class="recent"><a href="/posts/3">Third post</a><a href="/posts/2">Second post</a></div>"#,
        ),
    )
    .await;
    mount_html(
        server,
        "/archive/",
        page_with_feed(
            r#"<ul class="archive">
            <li><a href="/posts/3">Third post</a></li>
            <li><a href="/posts/2">Second post</a></li>
            <li><a href="/posts/1">First post</a></li>
            </ul>"#,
        ),
    )
    .await;
    mount_feed(
        server,
        "/feed.xml",
        rss_feed(
            &format!("{}/", base),
            &[
                ("Third post", format!("{}/posts/3", base)),
                ("Second post", format!("{}/posts/2", base)),
            ],
        ),
    )
    .await;
}

#[tokio::test]
async fn test_archive_page_gives_ordered_history() {
    let server = MockServer::start().await;
    mount_archive_blog(&server).await;
    let base = server.uri();

    let mut ctx = create_test_context();
    let result = discover_and_crawl(&base, &mut ctx).await;

    let historical = result.historical_result().expect("history found");
    assert_eq!(historical.pattern, "archives");
    assert_eq!(historical.links.len(), 3);
    assert_eq!(historical.links[0].link.as_str(), format!("{}/posts/3", base));
    assert_eq!(historical.links[2].link.as_str(), format!("{}/posts/1", base));
    assert_eq!(historical.oldest().map(|link| link.title.value.as_str()), Some("First post"));
    assert_eq!(historical.links[0].title.source, LinkTitleSource::Feed);
    assert_eq!(historical.links[2].title.source, LinkTitleSource::AnchorText);
    assert_eq!(historical.main_link.as_str(), format!("{}/archive/", base));
    assert_eq!(historical.blog_link.as_str(), format!("{}/", base));

    assert_eq!(result.feed_result.entry_count, 2);
    assert_eq!(result.feed_result.title_matches.exact, 2);
    assert_eq!(ctx.counters.requests_made, 3);

    let truth = historical.to_ground_truth();
    assert_eq!(truth.entries_count, 3);
    assert!(truth.oldest_entry_canonical_url.ends_with("/posts/1"));
}

#[tokio::test]
async fn test_archive_page_served_as_plain_text() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(
        &server,
        "/",
        page_with_feed(r#"<nav><a href="/archive/">Archive</a></nav>"#),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/archive/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_with_feed(
            r#"<ul class="archive">
            <li><a href="/posts/3">Third post</a></li>
            <li><a href="/posts/2">Second post</a></li>
            <li><a href="/posts/1">First post</a></li>
            </ul>"#,
        )))
        .mount(&server)
        .await;
    mount_feed(
        &server,
        "/feed.xml",
        rss_feed(
            &format!("{}/", base),
            &[("Third post", format!("{}/posts/3", base))],
        ),
    )
    .await;

    let mut ctx = create_test_context();
    let result = discover_and_crawl(&base, &mut ctx).await;

    let historical = result.historical_result().expect("history found");
    assert_eq!(historical.main_link.as_str(), format!("{}/archive/", base));
    assert_eq!(historical.links.len(), 3);
    assert_eq!(historical.links[2].link.as_str(), format!("{}/posts/1", base));
}

/// Mounts a three-page blog paginated by path
async fn mount_paged_blog(server: &MockServer) {
    let base = server.uri();
    let page = |posts: &[u32], next: Option<u32>| {
        let articles: String = posts
            .iter()
            .map(|n| {
                format!(
                    r#"<article class="post"><h2><a href="/posts/{n}">Post {n}</a></h2><p>Body</p></article>"#
                )
            })
            .collect();
        let nav = next
            .map(|n| format!(r#"<nav class="pagination"><a href="/page/{n}/">Older posts</a></nav>"#))
            .unwrap_or_default();
        page_with_feed(&format!("{}{}", articles, nav))
    };

    mount_html(server, "/", page(&[6, 5], Some(2))).await;
    mount_html(server, "/page/2/", page(&[4, 3], Some(3))).await;
    mount_html(server, "/page/3/", page(&[2, 1], None)).await;
    mount_feed(
        server,
        "/feed.xml",
        rss_feed(
            &format!("{}/", base),
            &[
                ("Post 6", format!("{}/posts/6", base)),
                ("Post 5", format!("{}/posts/5", base)),
            ],
        ),
    )
    .await;
}

#[tokio::test]
async fn test_paged_blog_is_walked_to_the_end() {
    let server = MockServer::start().await;
    mount_paged_blog(&server).await;
    let base = server.uri();

    let mut ctx = create_test_context();
    let result = discover_and_crawl(&base, &mut ctx).await;

    let historical = result.historical_result().expect("history found");
    assert_eq!(historical.pattern, "paged_path");
    let urls: Vec<String> = historical
        .links
        .iter()
        .map(|link| link.link.as_str().to_string())
        .collect();
    let expected: Vec<String> = (1..=6).rev().map(|n| format!("{}/posts/{}", base, n)).collect();
    assert_eq!(urls, expected);
    assert_eq!(historical.links[5].title.value, "Post 1");
}

#[tokio::test]
async fn test_redirect_back_to_visited_page_is_not_refetched() {
    let server = MockServer::start().await;
    // Served once for discovery; the redirect below must not hit it again
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                page_with_feed(
                    r#"<article class="post"><h2><a href="/posts/2">Post 2</a></h2></article>
                    <nav class="pagination"><a href="/page/2/">Older posts</a></nav>"#,
                ),
                "text/html",
            ),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_html(
        &server,
        "/page/2/",
        page_with_feed(
            r#"<article class="post"><h2><a href="/posts/1">Post 1</a></h2></article>
            <nav class="pagination"><a href="/page/3/">Older posts</a></nav>"#,
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/page/3/"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/"))
        .mount(&server)
        .await;
    let base = server.uri();
    mount_feed(
        &server,
        "/feed.xml",
        rss_feed(&format!("{}/", base), &[("Post 2", format!("{}/posts/2", base))]),
    )
    .await;

    let client = Arc::new(CountingClient::new(Arc::new(create_test_client())));
    let mut ctx = CrawlContext::new(client.clone(), create_test_settings());
    let result = discover_and_crawl(&base, &mut ctx).await;

    let historical = result.historical_result().expect("history found");
    assert_eq!(historical.links.len(), 2);
    assert_eq!(ctx.counters.duplicate_fetches, 1);
    assert_eq!(client.calls(&format!("{}/", base)), 1);
    assert_eq!(client.calls(&format!("{}/page/3/", base)), 1);
    assert_eq!(client.total_calls() as u32, ctx.counters.requests_made);
}

#[tokio::test]
async fn test_blog_without_archive_mechanism() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/", page_with_feed("<p>Nothing to see</p>")).await;
    mount_feed(
        &server,
        "/feed.xml",
        rss_feed(&format!("{}/", base), &[("Post", format!("{}/posts/1", base))]),
    )
    .await;

    let mut ctx = create_test_context();
    let result = discover_and_crawl(&base, &mut ctx).await;
    assert_eq!(
        result.outcome,
        HistoricalOutcome::NotFound(Some(HistoricalError::NoArchiveMechanism))
    );
}

#[tokio::test]
async fn test_empty_feed_is_reported() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_html(&server, "/", page_with_feed("")).await;
    mount_feed(&server, "/feed.xml", rss_feed(&format!("{}/", base), &[])).await;

    let mut ctx = create_test_context();
    let result = discover_and_crawl(&base, &mut ctx).await;
    assert_eq!(result.historical_error(), Some(&HistoricalError::FeedHasNoEntries));
}

#[tokio::test]
async fn test_hardcoded_host_aborts_before_crawling() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        "/feed.xml",
        rss_feed(
            "https://someone.medium.com/",
            &[("Post", "https://someone.medium.com/post-1".to_string())],
        ),
    )
    .await;

    let mut ctx = create_test_context();
    let result = discover_and_crawl(&format!("{}/feed.xml", server.uri()), &mut ctx).await;
    assert!(result.hardcoded_error().is_some());
    assert_eq!(ctx.counters.requests_made, 1);

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["historical"].is_null());
    assert!(json["hardcoded_error"]
        .as_str()
        .unwrap()
        .contains("someone.medium.com"));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_html(&server, "/flaky", "<html></html>".to_string()).await;

    let mut ctx = create_test_context();
    let link = to_canonical_link(&format!("{}/flaky", server.uri()), None).unwrap();
    let page = request_page(&mut ctx, &link, false, 3).await.unwrap();
    assert_eq!(page.code, 200);
    assert_eq!(ctx.counters.requests_made, 3);

    let client = create_test_client();
    let delays: Vec<_> = (0..6).map(|attempt| client.retry_delay(attempt)).collect();
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_recorded_crawl_replays_without_network() {
    let server = MockServer::start().await;
    mount_archive_blog(&server).await;
    let base = server.uri();

    let cache = Arc::new(FetchCache::new());
    let recording = CachingHttpClient::recording(Arc::new(create_test_client()), cache.clone(), "blog");
    let mut ctx = CrawlContext::new(Arc::new(recording), create_test_settings());
    let recorded = discover_and_crawl(&base, &mut ctx).await;

    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    cache.save(&cache_path).unwrap();
    drop(server);

    let loaded = Arc::new(FetchCache::load(&cache_path).unwrap());
    let replaying = CachingHttpClient::replaying(loaded, "blog");
    let mut ctx = CrawlContext::new(Arc::new(replaying), create_test_settings());
    let replayed = discover_and_crawl(&base, &mut ctx).await;

    assert_eq!(replayed, recorded);
}
