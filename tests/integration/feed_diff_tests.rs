//! Incremental feed diff against a crawled archive

use crate::common::{create_test_context, mount_feed, mount_html, page_with_feed, rss_feed};
use blog_archive::feed::{parse_feed, FeedDiffError};
use blog_archive::{
    discover_feeds_at_url, extract_new_posts_from_feed, guided_crawl, CanonicalUri,
    DiscoverFeedsResult,
};
use url::Url;
use wiremock::MockServer;

/// Crawls a small archive blog and returns its archive, newest first
async fn crawl_archive(server: &MockServer) -> (Vec<CanonicalUri>, blog_archive::CanonicalEqualityConfig) {
    let base = server.uri();
    mount_html(
        server,
        "/",
        page_with_feed(
            r#"<ol class="posts">
            <li><a href="/posts/3">Three</a></li>
            <li><a href="/posts/2">Two</a></li>
            <li><a href="/posts/1">One</a></li>
            </ol>"#,
        ),
    )
    .await;
    mount_feed(
        server,
        "/feed.xml",
        rss_feed(
            &format!("{}/", base),
            &[
                ("Three", format!("{}/posts/3", base)),
                ("Two", format!("{}/posts/2", base)),
            ],
        ),
    )
    .await;

    let mut ctx = create_test_context();
    let DiscoverFeedsResult::SingleFeed { feed, start_page } =
        discover_feeds_at_url(&base, 1, &mut ctx).await
    else {
        panic!("Expected a single feed");
    };
    let result = guided_crawl(start_page.as_ref(), &feed, &mut ctx).await;
    let historical = result.historical_result().expect("history found");
    let known = historical
        .links
        .iter()
        .map(|link| link.link.curi.clone())
        .collect();
    (known, result.equality_config.clone())
}

#[tokio::test]
async fn test_new_posts_after_crawl_and_idempotence() {
    let server = MockServer::start().await;
    let (mut known, config) = crawl_archive(&server).await;
    assert_eq!(known.len(), 3);

    let base = server.uri();
    let feed_url = Url::parse(&format!("{}/feed.xml", base)).unwrap();
    let fresh = rss_feed(
        &format!("{}/", base),
        &[
            ("Five", format!("{}/posts/5", base)),
            ("Four", format!("{}/posts/4", base)),
            ("Three", format!("{}/posts/3", base)),
            ("Two", format!("{}/posts/2", base)),
        ],
    );
    let parsed = parse_feed(&fresh, &feed_url).unwrap();

    let new = extract_new_posts_from_feed(&parsed, &feed_url, &known, &[], &[], &config).unwrap();
    let urls: Vec<String> = new.iter().map(|link| link.as_str().to_string()).collect();
    assert_eq!(
        urls,
        vec![format!("{}/posts/5", base), format!("{}/posts/4", base)]
    );

    let mut updated: Vec<CanonicalUri> = new.iter().map(|link| link.curi.clone()).collect();
    updated.extend(known.iter().cloned());
    let again = extract_new_posts_from_feed(&parsed, &feed_url, &updated, &[], &[], &config).unwrap();
    assert!(again.is_empty());

    // Order of the stored archive does not matter
    known.extend(new.into_iter().map(|link| link.curi));
    let again = extract_new_posts_from_feed(&parsed, &feed_url, &known, &[], &[], &config).unwrap();
    assert!(again.is_empty());
    known.reverse();
    let again = extract_new_posts_from_feed(&parsed, &feed_url, &known, &[], &[], &config).unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn test_unrelated_feed_fails_closed() {
    let server = MockServer::start().await;
    let (known, config) = crawl_archive(&server).await;

    let feed_url = Url::parse("https://elsewhere.example/feed.xml").unwrap();
    let fresh = rss_feed(
        "https://elsewhere.example/",
        &[("Other", "https://elsewhere.example/posts/9".to_string())],
    );
    let parsed = parse_feed(&fresh, &feed_url).unwrap();

    let result = extract_new_posts_from_feed(&parsed, &feed_url, &known, &[], &[], &config);
    assert_eq!(result, Err(FeedDiffError::NoMatch));
}
