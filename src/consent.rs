//! Cookie consent: the persisted decision and the banner that asks for it.
//!
//! Nothing may reach the analytics pipeline before the visitor accepts.
//! The decision is terminal until [`ConsentGate::revoke`] clears it.

use crate::analytics::{events, EventParams};
use crate::config::SiteConfig;
use crate::dom::{NodeId, SharedDocument};
use crate::storage::Storage;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

pub const CONSENT_STORAGE_KEY: &str = "caffeArtCookieConsent";
pub const CONSENT_TIMESTAMP_KEY: &str = "caffeArtConsentTimestamp";

pub const BANNER_ID: &str = "cookie-consent-banner";
pub const ACCEPT_BUTTON_ID: &str = "cookie-accept";
pub const DECLINE_BUTTON_ID: &str = "cookie-decline";

/// The visitor's cookie decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsentState {
    #[default]
    Undecided,
    Accepted,
    Declined,
}

impl ConsentState {
    /// Stored representation. `Undecided` is the absence of a value.
    pub fn as_storage_value(&self) -> Option<&'static str> {
        match self {
            ConsentState::Undecided => None,
            ConsentState::Accepted => Some("accepted"),
            ConsentState::Declined => Some("declined"),
        }
    }

    /// Anything other than a recognized decision reads as `Undecided`.
    pub fn from_storage_value(value: Option<&str>) -> ConsentState {
        match value {
            Some("accepted") => ConsentState::Accepted,
            Some("declined") => ConsentState::Declined,
            _ => ConsentState::Undecided,
        }
    }
}

/// Persisted consent, readable by every component that needs to check it.
#[derive(Clone)]
pub struct ConsentStore {
    storage: Arc<dyn Storage>,
}

impl ConsentStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn status(&self) -> ConsentState {
        ConsentState::from_storage_value(self.storage.get(CONSENT_STORAGE_KEY).as_deref())
    }

    /// Persist a decision with the current time, replacing any earlier one.
    /// Setting `Undecided` clears the decision.
    pub fn set_status(&self, state: ConsentState) {
        match state.as_storage_value() {
            Some(value) => {
                self.storage.set(CONSENT_STORAGE_KEY, value);
                self.storage
                    .set(CONSENT_TIMESTAMP_KEY, &Utc::now().to_rfc3339());
            }
            None => self.clear(),
        }
    }

    pub fn has_accepted(&self) -> bool {
        self.status() == ConsentState::Accepted
    }

    /// When the current decision was made. Unparseable values read as absent.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let raw = self.storage.get(CONSENT_TIMESTAMP_KEY)?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn clear(&self) {
        self.storage.remove(CONSENT_STORAGE_KEY);
        self.storage.remove(CONSENT_TIMESTAMP_KEY);
    }
}

/// What the consent gate needs from the analytics tracker.
pub trait AnalyticsHandle: Send + Sync {
    /// Start tracking if consent allows it. Repeated calls are harmless.
    fn init(&self);
    fn track_event(&self, name: &str, params: EventParams);
}

/// Stand-in used when a page has no analytics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

impl AnalyticsHandle for NoopAnalytics {
    fn init(&self) {}
    fn track_event(&self, _name: &str, _params: EventParams) {}
}

/// One of the two banner buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentChoice {
    Accept,
    Decline,
}

pub struct ConsentGate {
    doc: SharedDocument,
    store: ConsentStore,
    analytics: Arc<dyn AnalyticsHandle>,
    config: Arc<SiteConfig>,
    accept_bound: AtomicBool,
    decline_bound: AtomicBool,
}

impl ConsentGate {
    pub fn new(
        doc: SharedDocument,
        store: ConsentStore,
        analytics: Arc<dyn AnalyticsHandle>,
        config: Arc<SiteConfig>,
    ) -> Self {
        Self {
            doc,
            store,
            analytics,
            config,
            accept_bound: AtomicBool::new(false),
            decline_bound: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> ConsentState {
        self.store.status()
    }

    pub fn set_status(&self, state: ConsentState) {
        self.store.set_status(state);
    }

    pub fn has_accepted(&self) -> bool {
        self.store.has_accepted()
    }

    pub fn consent_timestamp(&self) -> Option<DateTime<Utc>> {
        self.store.timestamp()
    }

    /// Act on the stored decision and bind the banner buttons.
    ///
    /// Undecided visitors see the banner and nothing else happens until they
    /// choose. A stored acceptance starts analytics right away.
    pub fn init(&self) {
        match self.status() {
            ConsentState::Undecided => {
                debug!("No consent decision yet, showing banner");
                self.show_banner();
            }
            ConsentState::Accepted => self.analytics.init(),
            ConsentState::Declined => debug!("Cookies declined, analytics stays off"),
        }

        let doc = self.doc.lock();
        self.accept_bound.store(
            doc.get_element_by_id(ACCEPT_BUTTON_ID).is_some(),
            Ordering::SeqCst,
        );
        self.decline_bound.store(
            doc.get_element_by_id(DECLINE_BUTTON_ID).is_some(),
            Ordering::SeqCst,
        );
    }

    /// Whether [`init`](Self::init) found at least one banner button.
    pub fn is_bound(&self) -> bool {
        self.accept_bound.load(Ordering::SeqCst) || self.decline_bound.load(Ordering::SeqCst)
    }

    /// The bound banner button containing `target`, if any.
    pub fn control_for(&self, target: NodeId) -> Option<ConsentChoice> {
        let doc = self.doc.lock();
        let within = |id: &str| doc.closest(target, &format!("#{}", id)).is_some();

        if self.accept_bound.load(Ordering::SeqCst) && within(ACCEPT_BUTTON_ID) {
            Some(ConsentChoice::Accept)
        } else if self.decline_bound.load(Ordering::SeqCst) && within(DECLINE_BUTTON_ID) {
            Some(ConsentChoice::Decline)
        } else {
            None
        }
    }

    pub async fn on_accept(&self) {
        info!("Cookies accepted");
        self.set_status(ConsentState::Accepted);
        let hiding = self.start_banner_hide();

        self.analytics.init();
        self.analytics.track_event(
            "cookie_consent_given",
            events::params(json!({
                "event_category": "Privacy",
                "event_label": "Accepted",
                "consent_method": "banner",
            })),
        );

        if hiding {
            self.finish_banner_hide().await;
        }
    }

    /// Persist the refusal and hide the banner. Never starts analytics.
    pub async fn on_decline(&self) {
        info!("Cookies declined");
        self.set_status(ConsentState::Declined);
        self.hide_banner().await;
    }

    /// Forget the decision and ask again.
    ///
    /// A tracker that is already running is not torn down, but it checks the
    /// stored decision and stops forwarding events.
    pub fn revoke(&self) {
        info!("Cookie consent revoked");
        self.store.clear();
        self.show_banner();
    }

    pub fn show_banner(&self) {
        let mut doc = self.doc.lock();
        if let Some(banner) = doc.get_element_by_id(BANNER_ID) {
            doc.set_style(banner, "display", "block");
        }
    }

    /// Slide the banner out, then remove it from the layout.
    pub async fn hide_banner(&self) {
        if self.start_banner_hide() {
            self.finish_banner_hide().await;
        }
    }

    fn start_banner_hide(&self) -> bool {
        let mut doc = self.doc.lock();
        let Some(banner) = doc.get_element_by_id(BANNER_ID) else {
            return false;
        };
        doc.set_style(banner, "animation", "slideDown 0.5s ease-out");
        true
    }

    async fn finish_banner_hide(&self) {
        tokio::time::sleep(self.config.banner_hide_delay).await;

        let mut doc = self.doc.lock();
        if let Some(banner) = doc.get_element_by_id(BANNER_ID) {
            doc.set_style(banner, "display", "none");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{self, Document};
    use crate::storage::MemoryStorage;
    use parking_lot::Mutex;
    use reqwest::Url;
    use std::time::Duration;

    const BANNER: &str = r#"<div id="cookie-consent-banner" style="display: none">
<p>Koristimo kolačiće.</p>
<button id="cookie-accept"><i id="accept-icon" class="fas fa-check"></i> Prihvati</button>
<button id="cookie-decline"><span>Odbij</span></button>
</div>"#;

    #[derive(Default)]
    struct RecordingAnalytics {
        inits: Mutex<usize>,
        events: Mutex<Vec<(String, EventParams)>>,
    }

    impl AnalyticsHandle for RecordingAnalytics {
        fn init(&self) {
            *self.inits.lock() += 1;
        }

        fn track_event(&self, name: &str, params: EventParams) {
            self.events.lock().push((name.to_string(), params));
        }
    }

    struct Fixture {
        gate: ConsentGate,
        doc: SharedDocument,
        storage: Arc<MemoryStorage>,
        analytics: Arc<RecordingAnalytics>,
    }

    fn fixture(storage: MemoryStorage) -> Fixture {
        let doc = dom::shared(Document::parse(
            BANNER,
            Url::parse("https://caffeart.rs/").unwrap(),
        ));
        let storage = Arc::new(storage);
        let analytics = Arc::new(RecordingAnalytics::default());
        let gate = ConsentGate::new(
            Arc::clone(&doc),
            ConsentStore::new(storage.clone()),
            analytics.clone(),
            Arc::new(SiteConfig::default()),
        );
        Fixture {
            gate,
            doc,
            storage,
            analytics,
        }
    }

    fn banner_style(doc: &SharedDocument, property: &str) -> Option<String> {
        let doc = doc.lock();
        let banner = doc.get_element_by_id(BANNER_ID).unwrap();
        doc.style(banner, property).map(str::to_string)
    }

    #[test]
    fn test_status_defaults_to_undecided() {
        let f = fixture(MemoryStorage::new());
        assert_eq!(f.gate.status(), ConsentState::Undecided);
        assert!(!f.gate.has_accepted());
        assert!(f.gate.consent_timestamp().is_none());
    }

    #[test]
    fn test_unrecognized_value_reads_undecided() {
        let f = fixture(MemoryStorage::with_entries([(CONSENT_STORAGE_KEY, "maybe")]));
        assert_eq!(f.gate.status(), ConsentState::Undecided);
    }

    #[test]
    fn test_set_status_persists_value_and_timestamp() {
        let f = fixture(MemoryStorage::new());
        let before = Utc::now();

        f.gate.set_status(ConsentState::Declined);
        assert_eq!(f.storage.get(CONSENT_STORAGE_KEY).as_deref(), Some("declined"));
        let stamp = f.gate.consent_timestamp().unwrap();
        assert!(stamp >= before - chrono::Duration::seconds(1));

        f.gate.set_status(ConsentState::Accepted);
        assert!(f.gate.has_accepted());
    }

    #[test]
    fn test_declining_after_accepting_withdraws_consent() {
        let f = fixture(MemoryStorage::new());

        f.gate.set_status(ConsentState::Accepted);
        assert!(f.gate.has_accepted());

        f.gate.set_status(ConsentState::Declined);
        assert!(!f.gate.has_accepted());
        assert_eq!(f.gate.status(), ConsentState::Declined);
        assert_eq!(f.storage.get(CONSENT_STORAGE_KEY).as_deref(), Some("declined"));
    }

    #[test]
    fn test_init_undecided_shows_banner_only() {
        let f = fixture(MemoryStorage::new());
        f.gate.init();

        assert_eq!(banner_style(&f.doc, "display").as_deref(), Some("block"));
        assert_eq!(*f.analytics.inits.lock(), 0);
        assert!(f.gate.is_bound());
    }

    #[test]
    fn test_init_accepted_starts_analytics() {
        let f = fixture(MemoryStorage::with_entries([(CONSENT_STORAGE_KEY, "accepted")]));
        f.gate.init();

        assert_eq!(*f.analytics.inits.lock(), 1);
        assert_eq!(banner_style(&f.doc, "display").as_deref(), Some("none"));
    }

    #[test]
    fn test_init_declined_does_nothing() {
        let f = fixture(MemoryStorage::with_entries([(CONSENT_STORAGE_KEY, "declined")]));
        f.gate.init();

        assert_eq!(*f.analytics.inits.lock(), 0);
        assert_eq!(banner_style(&f.doc, "display").as_deref(), Some("none"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accept_initializes_then_tracks() {
        let f = fixture(MemoryStorage::new());
        f.gate.init();

        let accept = f.gate.on_accept();
        tokio::pin!(accept);
        assert!(futures::poll!(accept.as_mut()).is_pending());

        // Banner animates out while analytics already runs
        assert_eq!(
            banner_style(&f.doc, "animation").as_deref(),
            Some("slideDown 0.5s ease-out")
        );
        assert_eq!(banner_style(&f.doc, "display").as_deref(), Some("block"));
        assert_eq!(*f.analytics.inits.lock(), 1);

        tokio::time::advance(Duration::from_millis(500)).await;
        accept.await;
        assert_eq!(banner_style(&f.doc, "display").as_deref(), Some("none"));

        let events = f.analytics.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "cookie_consent_given");
        assert_eq!(events[0].1["event_category"], "Privacy");
        assert_eq!(events[0].1["event_label"], "Accepted");
        assert_eq!(events[0].1["consent_method"], "banner");
        assert!(f.gate.has_accepted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_decline_never_initializes() {
        let f = fixture(MemoryStorage::new());
        f.gate.init();
        f.gate.on_decline().await;

        assert_eq!(f.gate.status(), ConsentState::Declined);
        assert_eq!(*f.analytics.inits.lock(), 0);
        assert!(f.analytics.events.lock().is_empty());
        assert_eq!(banner_style(&f.doc, "display").as_deref(), Some("none"));
    }

    #[test]
    fn test_revoke_resets_and_shows_banner() {
        let f = fixture(MemoryStorage::with_entries([
            (CONSENT_STORAGE_KEY, "accepted"),
            (CONSENT_TIMESTAMP_KEY, "2026-01-05T10:00:00+00:00"),
        ]));
        assert!(f.gate.consent_timestamp().is_some());

        assert!(f.gate.has_accepted());
        f.gate.revoke();

        assert_eq!(f.gate.status(), ConsentState::Undecided);
        assert!(!f.gate.has_accepted());
        assert!(f.storage.get(CONSENT_TIMESTAMP_KEY).is_none());
        assert_eq!(banner_style(&f.doc, "display").as_deref(), Some("block"));
    }

    #[tokio::test]
    async fn test_hide_without_banner_is_noop() {
        let doc = dom::shared(Document::new(Url::parse("https://caffeart.rs/").unwrap()));
        let gate = ConsentGate::new(
            doc,
            ConsentStore::new(Arc::new(MemoryStorage::new())),
            Arc::new(NoopAnalytics),
            Arc::new(SiteConfig::default()),
        );

        gate.show_banner();
        gate.hide_banner().await;
        gate.init();
        assert!(!gate.is_bound());
    }

    #[test]
    fn test_control_for_requires_binding() {
        let f = fixture(MemoryStorage::new());
        let span = f.doc.lock().query_selector("#cookie-decline span").unwrap();
        let accept = f.doc.lock().get_element_by_id(ACCEPT_BUTTON_ID).unwrap();

        assert_eq!(f.gate.control_for(span), None);

        f.gate.init();
        assert_eq!(f.gate.control_for(span), Some(ConsentChoice::Decline));
        assert_eq!(f.gate.control_for(accept), Some(ConsentChoice::Accept));

        let paragraph = f.doc.lock().query_selector("p").unwrap();
        assert_eq!(f.gate.control_for(paragraph), None);
    }

    #[test]
    fn test_control_for_child_with_own_id() {
        let f = fixture(MemoryStorage::new());
        f.gate.init();

        let icon = f.doc.lock().get_element_by_id("accept-icon").unwrap();
        assert_eq!(f.gate.control_for(icon), Some(ConsentChoice::Accept));
    }
}
