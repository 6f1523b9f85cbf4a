//! Preview binary - boots one page of a local site checkout and prints the
//! resulting markup
//!
//! Usage:
//!   cargo run --bin preview
//!   CAFFE_ART_PAGE_URL=https://caffeart.rs/bar cargo run --bin preview
//!
//! Optional:
//! - CAFFE_ART_SITE_DIR (defaults to the current directory)
//! - CAFFE_ART_PAGE_URL (defaults to https://caffeart.rs/)
//! - CAFFE_ART_STORAGE_FILE (defaults to .caffe-art-storage.json)
//! - RUST_LOG (defaults to caffe_art_site=info)
//!
//! Saved preferences (language, cookie consent) persist in the storage file
//! between runs, like a returning visitor.

use anyhow::{Context, Result};
use caffe_art_site::analytics::LogSink;
use caffe_art_site::dom::{self, Document};
use caffe_art_site::fetch::{DirFetcher, Fetcher};
use caffe_art_site::storage::FileStorage;
use caffe_art_site::{Page, SiteConfig};
use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Where the page comes from and where preferences are kept
struct PreviewOptions {
    site_dir: PathBuf,
    page_url: Url,
    storage_file: PathBuf,
}

impl PreviewOptions {
    fn from_env() -> Result<Self> {
        let page_url = std::env::var("CAFFE_ART_PAGE_URL")
            .unwrap_or_else(|_| "https://caffeart.rs/".to_string());

        Ok(Self {
            site_dir: std::env::var("CAFFE_ART_SITE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            page_url: Url::parse(&page_url)
                .with_context(|| format!("Invalid CAFFE_ART_PAGE_URL: {}", page_url))?,
            storage_file: std::env::var("CAFFE_ART_STORAGE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".caffe-art-storage.json")),
        })
    }

    /// Site-relative path of the page's markup
    fn page_file(&self) -> String {
        let path = self.page_url.path().trim_matches('/');
        if path.is_empty() {
            "index.html".to_string()
        } else if path.ends_with(".html") {
            path.to_string()
        } else {
            format!("{}/index.html", path)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so the markup on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("caffe_art_site=info".parse()?),
        )
        .init();

    let options = PreviewOptions::from_env()?;
    let config = Arc::new(SiteConfig::from_env());

    let fetcher = Arc::new(DirFetcher::new(&options.site_dir));
    let page_file = options.page_file();
    info!("Previewing {} from {}", options.page_url, page_file);

    let markup = fetcher
        .fetch_text(&page_file)
        .await
        .with_context(|| format!("Failed to read {}", page_file))?;

    let storage = FileStorage::open(&options.storage_file)?;
    let doc = dom::shared(Document::parse(&markup, options.page_url.clone()));

    let page = Page::new(
        Arc::clone(&doc),
        config,
        fetcher,
        Arc::new(storage),
        Arc::new(LogSink),
    );

    let report = page.boot().await;
    if !report.all_loaded() {
        warn!("Some templates failed to load: {:?}", report);
    }

    info!(
        "Booted page in {} (analytics {})",
        page.i18n().current_language().code(),
        if page.tracker().is_initialized() {
            "running"
        } else {
            "off"
        }
    );

    println!("{}", doc.lock().to_html());
    Ok(())
}
