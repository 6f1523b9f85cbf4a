//! Full-page loading screen shown until the page has loaded.

use crate::config::SiteConfig;
use crate::dom::{Document, NodeId, SharedDocument};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const LOADING_SCREEN_ID: &str = "loadingScreen";

pub struct LoadingScreen {
    doc: SharedDocument,
    config: Arc<SiteConfig>,
    started: Instant,
    hiding: AtomicBool,
}

impl LoadingScreen {
    /// The minimum display time counts from here.
    pub fn new(doc: SharedDocument, config: Arc<SiteConfig>) -> Self {
        Self {
            doc,
            config,
            started: Instant::now(),
            hiding: AtomicBool::new(false),
        }
    }

    /// Mark the body as loading. Returns false when the page has no loading
    /// screen.
    pub fn init(&self) -> bool {
        let mut doc = self.doc.lock();
        if doc.get_element_by_id(LOADING_SCREEN_ID).is_none() {
            warn!("Loading screen element not found");
            return false;
        }
        let body = doc.body();
        doc.add_class(body, "loading");
        true
    }

    /// Show the screen until `page_loaded` resolves or the ceiling passes,
    /// then hide it.
    pub async fn run<L>(&self, page_loaded: L)
    where
        L: Future<Output = ()>,
    {
        if !self.init() {
            return;
        }

        tokio::select! {
            _ = page_loaded => debug!("Page loaded"),
            _ = tokio::time::sleep(self.config.loading_ceiling) => {
                warn!("Loading screen timeout - hiding forcefully");
            }
        }

        self.hide().await;
    }

    /// Fade the screen out once the minimum display time has passed. Only the
    /// first call has any effect.
    pub async fn hide(&self) {
        if self.hiding.swap(true, Ordering::SeqCst) {
            return;
        }

        let elapsed = self.started.elapsed();
        let remaining = self.config.loading_min_time.saturating_sub(elapsed);
        tokio::time::sleep(remaining).await;

        if !self.with_screen(|doc, screen| doc.add_class(screen, "transitioning")) {
            return;
        }

        tokio::time::sleep(self.config.loading_transition).await;
        self.with_screen(|doc, screen| {
            doc.add_class(screen, "hidden");
            let body = doc.body();
            doc.remove_class(body, "loading");
        });

        tokio::time::sleep(self.config.loading_removal).await;
        self.with_screen(|doc, screen| doc.set_style(screen, "display", "none"));
    }

    pub fn is_hiding(&self) -> bool {
        self.hiding.load(Ordering::SeqCst)
    }

    fn with_screen(&self, f: impl FnOnce(&mut Document, NodeId)) -> bool {
        let mut doc = self.doc.lock();
        match doc.get_element_by_id(LOADING_SCREEN_ID) {
            Some(screen) => {
                f(&mut *doc, screen);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom;
    use reqwest::Url;
    use std::time::Duration;

    fn page(markup: &str) -> SharedDocument {
        dom::shared(Document::parse(
            markup,
            Url::parse("https://caffeart.rs/").unwrap(),
        ))
    }

    const SCREEN: &str = r#"<body><div id="loadingScreen" class="loading-screen"></div></body>"#;

    fn screen_state(doc: &SharedDocument) -> (bool, bool, Option<String>, bool) {
        let doc = doc.lock();
        let screen = doc.get_element_by_id(LOADING_SCREEN_ID).unwrap();
        let body = doc.body();
        (
            doc.has_class(screen, "transitioning"),
            doc.has_class(screen, "hidden"),
            doc.style(screen, "display").map(str::to_string),
            doc.has_class(body, "loading"),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_display_time() {
        let doc = page(SCREEN);
        let screen = LoadingScreen::new(Arc::clone(&doc), Arc::new(SiteConfig::default()));

        let run = screen.run(async {});
        tokio::pin!(run);
        assert!(futures::poll!(run.as_mut()).is_pending());
        assert_eq!(screen_state(&doc), (false, false, None, true));

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert!(futures::poll!(run.as_mut()).is_pending());
        assert_eq!(screen_state(&doc), (true, false, None, true));

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(futures::poll!(run.as_mut()).is_pending());
        assert_eq!(screen_state(&doc), (true, true, None, false));

        tokio::time::advance(Duration::from_millis(800)).await;
        run.await;
        assert_eq!(
            screen_state(&doc),
            (true, true, Some("none".to_string()), false)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_hides_when_load_never_fires() {
        let doc = page(SCREEN);
        let screen = LoadingScreen::new(Arc::clone(&doc), Arc::new(SiteConfig::default()));

        let started = Instant::now();
        screen.run(futures::future::pending::<()>()).await;

        // 5s ceiling, then transition and removal; minimum time already met
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(6800));
        assert!(elapsed < Duration::from_millis(6850));
        assert_eq!(screen_state(&doc).2.as_deref(), Some("none"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_is_idempotent() {
        let doc = page(SCREEN);
        let screen = LoadingScreen::new(Arc::clone(&doc), Arc::new(SiteConfig::default()));
        screen.init();

        let started = Instant::now();
        futures::join!(screen.hide(), screen.hide());

        assert!(screen.is_hiding());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3300));
        assert!(elapsed < Duration::from_millis(3350));
        assert!(screen_state(&doc).1);
    }

    #[tokio::test]
    async fn test_missing_screen() {
        let doc = page("<body><main></main></body>");
        let screen = LoadingScreen::new(Arc::clone(&doc), Arc::new(SiteConfig::default()));

        assert!(!screen.init());
        screen.run(async {}).await;

        let doc = doc.lock();
        let body = doc.body();
        assert!(!doc.has_class(body, "loading"));
    }
}
