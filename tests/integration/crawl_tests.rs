//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small catalog and run the full
//! fetch, extract, validate and replace cycle against a SQLite file.

use catalog_snapshot::config::{
    CatalogConfig, Config, CrawlerConfig, OutputConfig, UserAgentConfig, MIN_POLITENESS_DELAY_MS,
};
use catalog_snapshot::crawler::{run_crawl, CrawlService};
use catalog_snapshot::output::{
    format_markdown_summary, generate_markdown_summary, load_statistics, CatalogSummary,
};
use catalog_snapshot::storage::{
    BookFilter, BookQuery, SnapshotStore, SortField, SortOrder, SqliteStorage,
};
use catalog_snapshot::{Book, CrawlOutcome};
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock catalog
fn create_test_config(base_url: &str, total_pages: u32, db_path: &Path) -> Config {
    Config {
        catalog: CatalogConfig {
            base_url: base_url.to_string(),
            root_path: "index.html".to_string(),
            page_path_pattern: "catalogue/page-{page}.html".to_string(),
            total_pages,
        },
        crawler: CrawlerConfig {
            politeness_delay_ms: MIN_POLITENESS_DELAY_MS,
            request_timeout_secs: 5,
            max_concurrent_fetches: 1,
            respect_robots: true,
            max_crawl_delay_secs: 60,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.display().to_string(),
            summary_path: "./test_summary.md".to_string(),
        },
    }
}

fn item(slug: &str, price: &str, rating: &str, availability: &str) -> String {
    format!(
        r#"<article class="product_pod">
            <div class="image_container">
                <a href="catalogue/{slug}/index.html"><img src="media/cache/{slug}.jpg" alt="{slug}"></a>
            </div>
            <p class="star-rating {rating}"><i class="icon-star"></i></p>
            <h3><a href="catalogue/{slug}/index.html" title="{slug}">{slug}</a></h3>
            <div class="product_price">
                <p class="price_color">{price}</p>
                <p class="instock availability"><i class="icon-ok"></i> {availability}</p>
            </div>
        </article>"#
    )
}

fn page_html(items: &[String]) -> String {
    format!(
        "<html><head><title>All products</title></head><body><section><ol class=\"row\">{}</ol></section></body></html>",
        items.join("\n")
    )
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Three pages: two books, one book, then a server error
async fn mount_catalog(server: &MockServer) {
    mount_page(
        server,
        "/index.html",
        page_html(&[
            item("a-light-in-the-attic", "£51.77", "Three", "In stock"),
            item("tipping-the-velvet", "£53.74", "One", "Out of stock"),
        ]),
    )
    .await;
    mount_page(
        server,
        "/catalogue/page-2.html",
        page_html(&[item("soumission", "£50.10", "Five", "In stock")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/page-3.html"))
        .respond_with(ResponseTemplate::new(503))
        .mount(server)
        .await;
}

fn titles(books: &[Book]) -> Vec<String> {
    books.iter().map(|b| b.title.clone()).collect()
}

#[tokio::test]
async fn test_full_crawl_replaces_snapshot() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let config = create_test_config(&server.uri(), 3, &db_path);

    let session = run_crawl(config, "hash-1".to_string()).await.unwrap();

    assert_eq!(session.outcome, Some(CrawlOutcome::Completed));
    assert_eq!(session.pages_attempted, 3);
    assert_eq!(session.pages_succeeded, 2);
    assert_eq!(session.pages_failed(), 1);
    assert_eq!(session.failures[0].page, 3);
    assert_eq!(session.records_accepted, 3);
    assert_eq!(session.records_rejected, 0);
    assert!(session.ensure_replaced().is_ok());

    let store = SqliteStorage::new(&db_path).unwrap();
    let info = store.current_snapshot().unwrap().unwrap();
    assert_eq!(info.book_count, 3);
    assert_eq!(info.config_hash, "hash-1");
    assert_eq!(session.snapshot_id, Some(info.id));

    let detail = format!("{}/catalogue/soumission/index.html", server.uri());
    let book = store.find_by_detail_url(&detail).unwrap().unwrap();
    assert_eq!(book.title, "soumission");
    assert_eq!(book.price, 50.10);
    assert_eq!(book.price_text, "£50.10");
    assert_eq!(book.rating_value(), 5);
    assert!(book.in_stock);
    assert_eq!(
        book.image_url,
        format!("{}/media/cache/soumission.jpg", server.uri())
    );
    assert_eq!(store.find_by_id(&book.id).unwrap().unwrap().detail_url, detail);
}

#[tokio::test]
async fn test_recrawl_of_unchanged_catalog_is_idempotent() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let store = Arc::new(SqliteStorage::new(&db_path).unwrap());
    let service = CrawlService::new(
        create_test_config(&server.uri(), 3, &db_path),
        store.clone(),
        "hash",
    );

    let query = BookQuery {
        limit: 50,
        ..BookQuery::default()
    };

    service.start_crawl().await.unwrap().ensure_replaced().unwrap();
    let first_info = store.current_snapshot().unwrap().unwrap();
    let first = store.scan(&query).unwrap().books;

    service.start_crawl().await.unwrap().ensure_replaced().unwrap();
    let second_info = store.current_snapshot().unwrap().unwrap();
    let second = store.scan(&query).unwrap().books;

    assert_ne!(first_info.id, second_info.id);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert!(a.same_content(b), "{} changed between crawls", a.title);
    }
}

#[tokio::test]
async fn test_duplicate_detail_url_keeps_previous_snapshot() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/index.html",
        page_html(&[item("a-light-in-the-attic", "£51.77", "Three", "In stock")]),
    )
    .await;
    mount_page(
        &server,
        "/catalogue/page-2.html",
        page_html(&[item("soumission", "£50.10", "Five", "In stock")]),
    )
    .await;
    // Page 3 repeats a book from page 1
    mount_page(
        &server,
        "/catalogue/page-3.html",
        page_html(&[item("a-light-in-the-attic", "£51.77", "Three", "In stock")]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let store = Arc::new(SqliteStorage::new(&db_path).unwrap());

    let service = CrawlService::new(
        create_test_config(&server.uri(), 2, &db_path),
        store.clone(),
        "good",
    );
    service.start_crawl().await.unwrap().ensure_replaced().unwrap();

    let service = CrawlService::new(
        create_test_config(&server.uri(), 3, &db_path),
        store.clone(),
        "bad",
    );
    let session = service.start_crawl().await.unwrap();

    assert!(matches!(session.outcome, Some(CrawlOutcome::Degraded { .. })));
    assert!(session.ensure_replaced().is_err());

    let info = store.current_snapshot().unwrap().unwrap();
    assert_eq!(info.config_hash, "good");
    assert_eq!(store.count(&BookFilter::default()).unwrap(), 2);
}

#[tokio::test]
async fn test_rejected_records_are_not_stored() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/index.html",
        page_html(&[
            item("kept", "£12.00", "Two", "In stock"),
            item("free", "£0.00", "Two", "In stock"),
            item("unpriced", "ask in store", "Four", "In stock"),
        ]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let session = run_crawl(create_test_config(&server.uri(), 1, &db_path), "h".to_string())
        .await
        .unwrap();

    assert_eq!(session.records_accepted, 1);
    assert_eq!(session.records_rejected, 2);

    let store = SqliteStorage::new(&db_path).unwrap();
    let page = store.scan(&BookQuery::default()).unwrap();
    assert_eq!(titles(&page.books), vec!["kept"]);
}

#[tokio::test]
async fn test_robots_disallow_skips_pages() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /catalogue/\n"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let session = run_crawl(create_test_config(&server.uri(), 3, &db_path), "h".to_string())
        .await
        .unwrap();

    assert_eq!(session.outcome, Some(CrawlOutcome::Completed));
    assert_eq!(session.pages_succeeded, 1);
    assert_eq!(session.pages_failed(), 2);
    assert_eq!(session.records_accepted, 2);

    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| !r.url.path().starts_with("/catalogue/page-")));
}

#[tokio::test]
async fn test_concurrent_fetches_keep_catalog_order() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/index.html",
        page_html(&[item("page-one", "£1.00", "One", "In stock")]),
    )
    .await;
    for page in 2u32..=6 {
        let slug = format!("page-{page}-book");
        // Earlier pages answer slower than later ones
        Mock::given(method("GET"))
            .and(path(format!("/catalogue/page-{page}.html")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page_html(&[item(&slug, "£2.00", "Two", "In stock")]))
                    .set_delay(std::time::Duration::from_millis(u64::from(7 - page) * 20)),
            )
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let mut config = create_test_config(&server.uri(), 6, &db_path);
    config.crawler.max_concurrent_fetches = 4;

    run_crawl(config, "h".to_string()).await.unwrap();

    let store = SqliteStorage::new(&db_path).unwrap();
    let query = BookQuery {
        sort_by: SortField::Price,
        sort_order: SortOrder::Asc,
        ..BookQuery::default()
    };
    let page = store.scan(&query).unwrap();
    assert_eq!(
        titles(&page.books),
        vec![
            "page-one",
            "page-2-book",
            "page-3-book",
            "page-4-book",
            "page-5-book",
            "page-6-book",
        ]
    );
}

#[tokio::test]
async fn test_stats_and_summary_after_crawl() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("catalog.db");
    let session = run_crawl(create_test_config(&server.uri(), 3, &db_path), "h".to_string())
        .await
        .unwrap();

    let store = SqliteStorage::new(&db_path).unwrap();
    let stats = load_statistics(&store).unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.in_stock, 2);
    assert_eq!(stats.out_of_stock, 1);
    assert_eq!(stats.stock_percentage, 67);
    assert_eq!(stats.price_stats.min, 50.10);
    assert_eq!(stats.price_stats.max, 53.74);

    let summary = CatalogSummary::load(&store, Some(session)).unwrap();
    let summary_path = dir.path().join("summary.md");
    generate_markdown_summary(&summary, &summary_path).unwrap();

    let written = std::fs::read_to_string(&summary_path).unwrap();
    assert_eq!(written, format_markdown_summary(&summary));
    assert!(written.contains("**Total Books**: 3"));
    assert!(written.contains("**Outcome**: completed"));
    assert!(written.contains("- page 3:"));
}
