//! End-to-end pipeline tests: real HTTP over loopback, real SQLite, fake
//! browser.

use async_trait::async_trait;
use chrono::Duration;
use harvest_browser::{BrowserActions, BrowserError, SessionLauncher};
use harvest_core::{AppConfig, BatchScrapeRequest, Metadata, Record, ScrapeOptions};
use harvest_db::{Database, RecordQuery, RecordStore};
use harvest_scraper::{build_orchestrator, DedupGate, DedupOutcome, ScrapeOutcome};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct NoBrowser;

#[async_trait]
impl SessionLauncher for NoBrowser {
    async fn launch(&self) -> harvest_browser::Result<Box<dyn BrowserActions>> {
        Err(BrowserError::LaunchError("browser disabled in tests".to_string()))
    }
}

/// Serve the same page for every connection; the body includes the path so
/// different paths yield different fingerprints.
async fn serve_pages() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                let body = format!("<html><head><title>Page {path}</title></head><body>{path}</body></html>");
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}/gone")
}

async fn database(dir: &TempDir) -> Arc<Database> {
    Arc::new(
        Database::open(dir.path().join("harvest.db"), 5)
            .await
            .expect("open database"),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn batch_isolates_unreachable_url() {
    let dir = TempDir::new().expect("temp dir");
    let db = database(&dir).await;
    let base = serve_pages().await;
    let orchestrator =
        build_orchestrator(&AppConfig::default(), Arc::new(NoBrowser), db.clone()).expect("build");

    let batch = BatchScrapeRequest::new(
        [
            format!("{base}/first"),
            unreachable_url().await,
            format!("{base}/third"),
        ],
        ScrapeOptions::default(),
    );

    let records = match orchestrator.run(&batch).await.expect("batch never fails") {
        ScrapeOutcome::Batch(records) => records,
        ScrapeOutcome::Single(_) => panic!("expected three results"),
    };

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].record.status_code, 200);
    assert_eq!(records[0].record.title, "Page /first");
    assert!(records[1].record.is_degraded());
    assert!(records[1].record.url.ends_with("/gone"));
    assert_eq!(records[2].record.status_code, 200);
    assert_eq!(records[2].record.title, "Page /third");

    let stored = db.query(&RecordQuery::default()).await.expect("query");
    assert_eq!(stored.total, 3);
}

#[tokio::test]
async fn dynamic_request_without_browser_degrades() {
    let dir = TempDir::new().expect("temp dir");
    let db = database(&dir).await;
    let orchestrator =
        build_orchestrator(&AppConfig::default(), Arc::new(NoBrowser), db).expect("build");

    let batch = BatchScrapeRequest::new(
        ["https://example.com"],
        ScrapeOptions {
            use_dynamic_rendering: true,
            render_wait_ms: 0,
            ..ScrapeOptions::default()
        },
    );

    let ScrapeOutcome::Single(saved) = orchestrator.run(&batch).await.expect("run") else {
        panic!("single URL must collapse to a single result");
    };
    assert!(saved.record.is_degraded());
    assert!(saved.record.is_dynamic);
    assert!(saved.record.content.contains("browser disabled"));
}

#[tokio::test]
async fn identical_failures_keep_their_own_urls() {
    let dir = TempDir::new().expect("temp dir");
    let db = database(&dir).await;
    let orchestrator =
        build_orchestrator(&AppConfig::default(), Arc::new(NoBrowser), db.clone()).expect("build");

    let urls = ["https://a.example/", "https://b.example/", "https://c.example/"];
    let batch = BatchScrapeRequest::new(
        urls,
        ScrapeOptions {
            use_dynamic_rendering: true,
            render_wait_ms: 0,
            ..ScrapeOptions::default()
        },
    );

    let records = orchestrator.run(&batch).await.expect("run").into_records();

    let got: Vec<&str> = records.iter().map(|r| r.record.url.as_str()).collect();
    assert_eq!(got, urls);
    assert!(records.iter().all(|r| r.record.is_degraded()));
    assert!(records.iter().all(|r| r.outcome == DedupOutcome::Inserted));
    assert_eq!(
        db.query(&RecordQuery::default()).await.expect("query").total,
        3
    );
}

#[tokio::test]
async fn same_content_under_two_urls_an_hour_apart_keeps_one_id() {
    let dir = TempDir::new().expect("temp dir");
    let db = database(&dir).await;
    let gate = DedupGate::new(db.clone());

    let first = Record::new(
        "https://example.com/url1",
        "Test Page",
        "<html><body>Test content</body></html>",
        "text/html",
        Metadata::new(),
        false,
        200,
    );
    let mut second = Record::new(
        "https://example.com/url2",
        "Test Page",
        "<html><body>Test content</body></html>",
        "text/html",
        Metadata::new(),
        false,
        200,
    );
    second.scraped_at = first.scraped_at + Duration::hours(1);

    let saved_first = gate.save(first).await.expect("first save");
    let saved_second = gate.save(second).await.expect("second save");

    assert_eq!(saved_first.outcome, DedupOutcome::Inserted);
    assert_eq!(saved_second.outcome, DedupOutcome::Existing);
    assert_eq!(saved_first.record.id, saved_second.record.id);
    assert_eq!(
        saved_first.record.content_hash,
        saved_second.record.content_hash
    );
    assert_eq!(
        db.query(&RecordQuery::default()).await.expect("query").total,
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_candidates_store_once() {
    let dir = TempDir::new().expect("temp dir");
    let db = database(&dir).await;
    let gate = Arc::new(DedupGate::new(db.clone()));

    let mut handles = Vec::new();
    for i in 0..10 {
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            let record = Record::new(
                format!("https://mirror{i}.example.com"),
                "Mirror",
                "same body",
                "text/html",
                Metadata::new(),
                false,
                200,
            );
            gate.save(record).await.expect("save")
        }));
    }

    let mut ids = Vec::new();
    let mut inserted = 0;
    for handle in handles {
        let saved = handle.await.expect("task");
        if saved.outcome == DedupOutcome::Inserted {
            inserted += 1;
        }
        ids.push(saved.record.id);
    }

    assert_eq!(inserted, 1);
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(
        db.query(&RecordQuery::default()).await.expect("query").total,
        1
    );
}
