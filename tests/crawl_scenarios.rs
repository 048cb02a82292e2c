//! End-to-end crawls of a config-described site over an in-memory transport.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use lexacquire::scrapers::http_client::{Transport, TransportError, TransportResponse};
use lexacquire::scrapers::rate_limiter::RateLimitConfig;
use lexacquire::scrapers::{
    crawl, ConfiguredSite, HttpClient, RateLimiter, RetryPolicy, RunContext, RunSettings,
    SiteConfig,
};
use lexacquire::services::Downloader;
use lexacquire::storage::Storage;
use lexacquire::models::SCHEMA_VERSION;
use lexacquire::Ledger;

const LIST: &str = "https://gazette.example/laws";

/// Serves a fixed site; unknown URLs are 404, `failing` URLs are 503.
#[derive(Default)]
struct FakeSite {
    pages: HashMap<String, (String, Vec<u8>)>,
    failing: Vec<String>,
    log: Mutex<Vec<String>>,
}

impl FakeSite {
    fn html(mut self, url: &str, body: &str) -> Self {
        self.pages
            .insert(url.to_string(), ("text/html".to_string(), body.as_bytes().to_vec()));
        self
    }

    fn pdf(mut self, url: &str, body: &[u8]) -> Self {
        self.pages
            .insert(url.to_string(), ("application/pdf".to_string(), body.to_vec()));
        self
    }

    fn failing(mut self, url: &str) -> Self {
        self.failing.push(url.to_string());
        self
    }

    fn hits(&self, url: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn total(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for FakeSite {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        self.log.lock().unwrap().push(url.to_string());
        if self.failing.iter().any(|u| u == url) {
            return Ok(TransportResponse::new(503, url, Vec::new()));
        }
        Ok(match self.pages.get(url) {
            Some((content_type, body)) => TransportResponse::new(200, url, body.clone())
                .with_header("Content-Type", content_type),
            None => TransportResponse::new(404, url, Vec::new()),
        })
    }
}

/// Three laws, each a page with a heading and a PDF link.
fn gazette() -> FakeSite {
    let mut site = FakeSite::default().html(
        LIST,
        r#"<ul>
             <li><a class="law" href="/laws/1">Law 1</a></li>
             <li><a class="law" href="/laws/2">Law 2</a></li>
             <li><a class="law" href="/laws/3">Law 3</a></li>
           </ul>"#,
    );
    for (n, title) in [(1, "Law on Courts"), (2, "Law on Roads"), (3, "Law on Water")] {
        site = site
            .html(
                &format!("https://gazette.example/laws/{n}"),
                &format!(r#"<h1>{title}</h1><a class="pdf" href="/files/{n}.pdf">Download</a>"#),
            )
            .pdf(
                &format!("https://gazette.example/files/{n}.pdf"),
                format!("%PDF-1.4 law {n}").as_bytes(),
            );
    }
    site
}

fn gazette_driver() -> ConfiguredSite {
    let config: SiteConfig = toml::from_str(&format!(
        r#"
        start_url = "{LIST}"
        country = "Gazetteland"
        entry_selector = "a.law"
        title_selector = "h1"
        pdf_selector = "a.pdf"
        "#
    ))
    .unwrap();
    ConfiguredSite::new("gazette", config).unwrap()
}

fn context(root: &Path, transport: Arc<FakeSite>, attempts: u32) -> RunContext {
    let client = HttpClient::with_transport(
        transport,
        RateLimiter::with_config(RateLimitConfig::with_base_delay(Duration::ZERO)),
        RetryPolicy {
            max_attempts: attempts,
            retry_delay: Duration::ZERO,
        },
    );
    let downloader = Downloader::new(client, Storage::new(root), Ledger::new());
    RunContext::new(downloader, RunSettings::new(root.join("metadata.json")))
}

#[tokio::test]
async fn three_links_without_next_link() {
    let dir = tempdir().unwrap();
    let site = Arc::new(gazette());
    let ctx = context(dir.path(), site.clone(), 1);

    let summary = crawl(&gazette_driver(), &ctx).await.unwrap();
    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.downloaded, 3);
    assert!(summary.skipped.is_empty());
    // listing + three pages + three PDFs, nothing past the listing
    assert_eq!(site.total(), 7);
    assert_eq!(site.hits(LIST), 1);

    let records = Ledger::load(&dir.path().join("metadata.json")).await.unwrap();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert_eq!(record.country, "Gazetteland");
        assert!(record.download_path.exists());
        assert_eq!(
            record.download_path.extension().and_then(|e| e.to_str()),
            Some("pdf")
        );
    }
}

#[tokio::test]
async fn missing_title_skips_one_document() {
    let dir = tempdir().unwrap();
    let site = Arc::new(gazette().html(
        "https://gazette.example/laws/2",
        r#"<p>Repealed</p><a class="pdf" href="/files/2.pdf">Download</a>"#,
    ));
    let ctx = context(dir.path(), site.clone(), 1);

    let summary = crawl(&gazette_driver(), &ctx).await.unwrap();
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].kind, "markup_not_found");
    assert_eq!(summary.skipped[0].url, "https://gazette.example/laws/2");
    assert_eq!(site.hits("https://gazette.example/files/2.pdf"), 0);

    let records = Ledger::load(&dir.path().join("metadata.json")).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn rerun_keeps_files_and_skips_pdf_fetches() {
    let dir = tempdir().unwrap();
    let first = Arc::new(gazette());
    crawl(&gazette_driver(), &context(dir.path(), first, 1))
        .await
        .unwrap();
    let first_records = Ledger::load(&dir.path().join("metadata.json")).await.unwrap();

    let second = Arc::new(gazette());
    let summary = crawl(&gazette_driver(), &context(dir.path(), second.clone(), 1))
        .await
        .unwrap();
    assert_eq!(summary.downloaded, 0);
    assert_eq!(summary.already_present, 3);
    assert_eq!(second.hits("https://gazette.example/files/1.pdf"), 0);

    let second_records = Ledger::load(&dir.path().join("metadata.json")).await.unwrap();
    let paths = |records: &[lexacquire::DocumentRecord]| {
        let mut paths: Vec<_> = records.iter().map(|r| r.download_path.clone()).collect();
        paths.sort();
        paths
    };
    assert_eq!(paths(&first_records), paths(&second_records));
}

#[tokio::test]
async fn exhausted_retries_skip_the_file() {
    let dir = tempdir().unwrap();
    let site = Arc::new(gazette().failing("https://gazette.example/files/3.pdf"));
    let ctx = context(dir.path(), site.clone(), 3);

    let summary = crawl(&gazette_driver(), &ctx).await.unwrap();
    assert_eq!(summary.downloaded, 2);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].kind, "fetch_failed");
    assert_eq!(site.hits("https://gazette.example/files/3.pdf"), 3);
}

#[tokio::test]
async fn unreachable_listing_writes_nothing() {
    let dir = tempdir().unwrap();
    let site = Arc::new(FakeSite::default().failing(LIST));
    let ctx = context(dir.path(), site, 2);

    let err = crawl(&gazette_driver(), &ctx).await.unwrap_err();
    assert!(!err.is_recoverable());
    assert!(!dir.path().join("metadata.json").exists());
}
