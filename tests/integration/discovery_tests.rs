//! Feed discovery against mock blogs

use crate::common::{create_test_context, mount_feed, mount_html, page_with_feed, rss_feed};
use blog_archive::{discover_feeds_at_url, DiscoverFeedsResult};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_blog(server: &MockServer) {
    let base = server.uri();
    mount_html(server, "/", page_with_feed("<p>Hello</p>")).await;
    mount_feed(
        server,
        "/feed.xml",
        rss_feed(
            &format!("{}/", base),
            &[
                ("Second post", format!("{}/posts/2", base)),
                ("First post", format!("{}/posts/1", base)),
            ],
        ),
    )
    .await;
}

#[tokio::test]
async fn test_discovers_single_feed_from_page() {
    let server = MockServer::start().await;
    mount_blog(&server).await;

    let mut ctx = create_test_context();
    let result = discover_feeds_at_url(&server.uri(), 1, &mut ctx).await;

    match result {
        DiscoverFeedsResult::SingleFeed { feed, start_page } => {
            assert_eq!(feed.final_url.as_str(), format!("{}/feed.xml", server.uri()));
            assert_eq!(feed.parsed.entry_links.len(), 2);
            assert_eq!(feed.title.as_deref(), Some("Test Blog"));
            let start_page = start_page.expect("discovered from an HTML page");
            assert_eq!(start_page.final_url.as_str(), format!("{}/", server.uri()));
        }
        other => panic!("Expected a single feed, got {:?}", other),
    }
    assert_eq!(ctx.counters.requests_made, 2);
}

#[tokio::test]
async fn test_feed_url_has_no_start_page() {
    let server = MockServer::start().await;
    mount_blog(&server).await;

    let mut ctx = create_test_context();
    let input = format!("{}/feed.xml", server.uri());
    match discover_feeds_at_url(&input, 1, &mut ctx).await {
        DiscoverFeedsResult::SingleFeed { feed, start_page } => {
            assert!(start_page.is_none());
            assert_eq!(
                feed.parsed.root_link.map(|link| link.url.to_string()),
                Some(format!("{}/", server.uri()))
            );
        }
        other => panic!("Expected a single feed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_multiple_feeds_are_returned_without_fetching() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/",
        r#"<html><head>
        <link rel="alternate" type="application/rss+xml" title="Posts" href="/posts.rss">
        <link rel="alternate" type="application/atom+xml" title="Notes" href="/notes.atom">
        </head><body></body></html>"#
            .to_string(),
    )
    .await;

    let mut ctx = create_test_context();
    match discover_feeds_at_url(&server.uri(), 1, &mut ctx).await {
        DiscoverFeedsResult::MultipleFeeds { feeds } => {
            let titles: Vec<Option<&str>> =
                feeds.iter().map(|feed| feed.title.as_deref()).collect();
            assert_eq!(titles, vec![Some("Posts"), Some("Notes")]);
        }
        other => panic!("Expected multiple feeds, got {:?}", other),
    }
    assert_eq!(ctx.counters.requests_made, 1);
}

#[tokio::test]
async fn test_page_without_feeds() {
    let server = MockServer::start().await;
    mount_html(&server, "/", "<html><body><a href=\"/about\">About</a></body></html>".to_string())
        .await;

    let mut ctx = create_test_context();
    let result = discover_feeds_at_url(&server.uri(), 1, &mut ctx).await;
    assert!(matches!(result, DiscoverFeedsResult::NoFeeds));
}

#[tokio::test]
async fn test_unreachable_and_bad_feeds() {
    let server = MockServer::start().await;
    mount_html(&server, "/", page_with_feed("")).await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("this is not a feed"))
        .mount(&server)
        .await;

    let mut ctx = create_test_context();
    let result = discover_feeds_at_url(&server.uri(), 1, &mut ctx).await;
    assert!(matches!(result, DiscoverFeedsResult::BadFeed { .. }));

    let input = format!("{}/missing", server.uri());
    let result = discover_feeds_at_url(&input, 1, &mut ctx).await;
    assert!(matches!(result, DiscoverFeedsResult::CouldNotReach { .. }));
}

#[tokio::test]
async fn test_not_a_url() {
    let mut ctx = create_test_context();
    let result = discover_feeds_at_url("not a url", 1, &mut ctx).await;
    assert!(matches!(result, DiscoverFeedsResult::NotAUrl));
    assert_eq!(ctx.counters.requests_made, 0);

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["result"], "not_a_url");
}
