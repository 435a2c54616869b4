//! End-to-end crawl tests
//!
//! Mock HTTP servers drive full crawl cycles: pages link to each other,
//! robots.txt rules gate what gets fetched, and the emitted JSON records
//! are collected from the message bus and compared.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use spinneret::config::Settings;
use spinneret::crawler::{Crawler, ParsedResult, PolitenessPolicy, VisitedSet};
use spinneret::fetcher::Fetcher;
use spinneret::messaging::ChannelQueue;

fn test_settings() -> Settings {
    Settings {
        user_agent: "test-agent".to_string(),
        concurrency: 2,
        max_depth: 0,
        crawling_timeout: Duration::from_millis(200),
        fetching_timeout: Duration::from_secs(5),
        politeness_fixed_delay: Duration::ZERO,
    }
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Mounts the shared three-page graph: the root links to /foo/bar/baz,
/// which links to /foo/bar/test, which links to nothing new. Every page
/// carries the same off-domain canonical.
async fn mount_site(server: &MockServer, root: &str) {
    mount_page(
        server,
        root,
        r#"<head>
            <link rel="canonical" href="https://example-page.com/sample-page/" />
         </head>
         <body>
            <img src="/baz.png">
            <img src="/stonk">
            <a href="foo/bar/baz">
        </body>"#
            .to_string(),
    )
    .await;
    mount_page(
        server,
        "/foo/bar/baz",
        r#"<head>
            <link rel="canonical" href="https://example-page.com/sample-page/" />
            <link rel="canonical" href="/foo/bar/test" />
         </head>
         <body>
            <img src="/baz.png">
            <img src="/stonk">
        </body>"#
            .to_string(),
    )
    .await;
    mount_page(
        server,
        "/foo/bar/test",
        r#"<head>
            <link rel="canonical" href="https://example-page.com/sample-page/" />
         </head>
         <body>
            <img src="/stonk">
        </body>"#
            .to_string(),
    )
    .await;
}

/// Runs a crawl over the given seeds and returns the emitted records,
/// sorted by URL for order-insensitive comparison
async fn crawl_and_collect(
    settings: Settings,
    seeds: &[String],
    cancel: CancellationToken,
) -> Vec<ParsedResult> {
    let (queue, mut results) = ChannelQueue::new();
    let crawler = Crawler::new(settings, Arc::new(queue));
    crawler.crawl(seeds, cancel).await;
    drop(crawler);

    let mut collected = Vec::new();
    while let Some(payload) = results.recv().await {
        collected.push(serde_json::from_slice::<ParsedResult>(&payload).unwrap());
    }
    collected.sort_by(|a, b| a.url.cmp(&b.url));
    collected
}

fn site_expectations(base: &str, root: &str) -> Vec<ParsedResult> {
    vec![
        ParsedResult {
            url: format!("{}{}", base, root),
            links: vec![
                "https://example-page.com/sample-page/".to_string(),
                format!("{}/foo/bar/baz", base),
            ],
        },
        ParsedResult {
            url: format!("{}/foo/bar/baz", base),
            links: vec![format!("{}/foo/bar/test", base)],
        },
    ]
}

#[tokio::test]
async fn test_crawl_pages() {
    let server = MockServer::start().await;
    mount_site(&server, "/foo").await;

    let results = crawl_and_collect(
        test_settings(),
        &[format!("{}/foo", server.uri())],
        CancellationToken::new(),
    )
    .await;

    assert_eq!(results, site_expectations(&server.uri(), "/foo"));
}

#[tokio::test]
async fn test_crawl_pages_respecting_robots_txt() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/robots.txt",
        "User-agent: *\nDisallow: */test".to_string(),
    )
    .await;
    mount_site(&server, "/").await;

    let results = crawl_and_collect(
        test_settings(),
        &[server.uri()],
        CancellationToken::new(),
    )
    .await;

    // /foo/bar/test is discovered but never fetched
    assert_eq!(results, site_expectations(&server.uri(), "/"));
}

#[tokio::test]
async fn test_crawl_pages_respecting_max_depth() {
    let server = MockServer::start().await;
    mount_site(&server, "/foo").await;

    let settings = Settings {
        max_depth: 3,
        ..test_settings()
    };
    let results = crawl_and_collect(
        settings,
        &[format!("{}/foo", server.uri())],
        CancellationToken::new(),
    )
    .await;

    // The budget of 3 covers the whole graph
    assert_eq!(results, site_expectations(&server.uri(), "/foo"));
}

#[tokio::test]
async fn test_depth_budget_of_one_stops_after_seed() {
    let server = MockServer::start().await;
    mount_site(&server, "/foo").await;

    let settings = Settings {
        max_depth: 1,
        ..test_settings()
    };
    let results = crawl_and_collect(
        settings,
        &[format!("{}/foo", server.uri())],
        CancellationToken::new(),
    )
    .await;

    // The seed itself exhausts the budget; its links are never followed
    assert_eq!(results, site_expectations(&server.uri(), "/foo")[..1]);
}

#[tokio::test]
async fn test_crawl_multiple_seeds() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        mount_page(server, "/a", r#"<a href="/b">b</a>"#.to_string()).await;
        mount_page(server, "/b", "<body></body>".to_string()).await;
    }

    let results = crawl_and_collect(
        test_settings(),
        &[format!("{}/a", first.uri()), format!("{}/a", second.uri())],
        CancellationToken::new(),
    )
    .await;

    let mut expected = vec![
        ParsedResult {
            url: format!("{}/a", first.uri()),
            links: vec![format!("{}/b", first.uri())],
        },
        ParsedResult {
            url: format!("{}/a", second.uri()),
            links: vec![format!("{}/b", second.uri())],
        },
    ];
    expected.sort_by(|a, b| a.url.cmp(&b.url));

    assert_eq!(results, expected);
}

#[tokio::test]
async fn test_bad_seed_skipped_without_failing_others() {
    let server = MockServer::start().await;
    mount_site(&server, "/foo").await;

    let results = crawl_and_collect(
        test_settings(),
        &["http://[".to_string(), format!("{}/foo", server.uri())],
        CancellationToken::new(),
    )
    .await;

    assert_eq!(results, site_expectations(&server.uri(), "/foo"));
}

#[tokio::test]
async fn test_no_url_emitted_twice() {
    let server = MockServer::start().await;
    // Pages linking back to each other form a cycle
    mount_page(&server, "/a", r#"<a href="/b">b</a><a href="/a">a</a>"#.to_string()).await;
    mount_page(&server, "/b", r#"<a href="/a">a</a>"#.to_string()).await;

    let results = crawl_and_collect(
        test_settings(),
        &[format!("{}/a", server.uri())],
        CancellationToken::new(),
    )
    .await;

    let mut urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
    urls.dedup();
    assert_eq!(urls.len(), results.len());
}

#[tokio::test]
async fn test_cancellation_unwinds_before_quiet_period() {
    let server = MockServer::start().await;
    mount_page(&server, "/foo", "<body>nothing to see</body>".to_string()).await;

    // A quiet period far beyond the test horizon: only cancellation can
    // terminate the engine in time
    let settings = Settings {
        crawling_timeout: Duration::from_secs(60),
        ..test_settings()
    };
    let cancel = CancellationToken::new();
    let trip = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trip.cancel();
    });

    let results = tokio::time::timeout(
        Duration::from_secs(5),
        crawl_and_collect(settings, &[format!("{}/foo", server.uri())], cancel),
    )
    .await
    .expect("crawl should unwind on cancellation");

    assert!(results.is_empty());
}

#[tokio::test]
async fn test_robots_crawl_delay_governs_pacing() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/robots.txt",
        "User-agent: *\nDisallow: */baz/*\nCrawl-delay: 2".to_string(),
    )
    .await;

    let base = Url::parse(&server.uri()).unwrap();
    let policy = PolitenessPolicy::new(
        base,
        Arc::new(VisitedSet::new()),
        Duration::from_millis(100),
    );
    let fetcher = Fetcher::new("test-agent", None, Duration::from_secs(5)).unwrap();

    // Before the rules are loaded everything in-domain is eligible
    let probe = Url::parse(&format!("{}/foo/baz/bar", server.uri())).unwrap();
    assert!(policy.allowed(&probe).await);

    assert!(policy.load_robots(&fetcher, "test-agent").await);

    // Disallowed now; and the probe was consumed on first sight
    let denied = Url::parse(&format!("{}/foo/baz/qux", server.uri())).unwrap();
    assert!(!policy.allowed(&denied).await);
    assert!(!policy.allowed(&probe).await);

    // Jitter tops out at 150ms and nothing was fetched through the policy
    // yet, so the advertised delay decides
    assert_eq!(policy.crawl_delay().await, Duration::from_secs(2));
}

#[tokio::test]
async fn test_missing_robots_treated_as_absent() {
    let server = MockServer::start().await;
    mount_page(&server, "/foo", "<body></body>".to_string()).await;

    let base = Url::parse(&server.uri()).unwrap();
    let policy = PolitenessPolicy::new(base, Arc::new(VisitedSet::new()), Duration::ZERO);
    let fetcher = Fetcher::new("test-agent", None, Duration::from_secs(5)).unwrap();

    assert!(!policy.load_robots(&fetcher, "test-agent").await);

    // No rules means everything in-domain stays allowed
    let probe = Url::parse(&format!("{}/anything", server.uri())).unwrap();
    assert!(policy.allowed(&probe).await);
}
