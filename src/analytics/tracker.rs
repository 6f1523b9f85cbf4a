use super::events::{self, EventParams, ScrollDepth, TrackingEvent};
use super::tag::{TagCommand, TagSink};
use crate::config::SiteConfig;
use crate::consent::{AnalyticsHandle, ConsentStore};
use crate::dom::{NodeId, SharedDocument};
use crate::i18n::{LanguageObserver, Locale, LANG_STORAGE_KEY};
use crate::storage::Storage;
use crate::utils::{PageType, Throttle};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

struct TrackerState {
    initialized: bool,
    queue: Vec<TrackingEvent>,
    scroll_depth: ScrollDepth,
    scroll_throttle: Throttle,
}

/// Consent-gated analytics tracker.
///
/// Events tracked before initialization wait in a queue and are delivered in
/// order, exactly once, when the tracker starts.
pub struct Tracker {
    doc: SharedDocument,
    storage: Arc<dyn Storage>,
    consent: ConsentStore,
    sink: Arc<dyn TagSink>,
    config: Arc<SiteConfig>,
    state: Mutex<TrackerState>,
}

impl Tracker {
    pub fn new(
        doc: SharedDocument,
        storage: Arc<dyn Storage>,
        sink: Arc<dyn TagSink>,
        config: Arc<SiteConfig>,
    ) -> Self {
        let consent = ConsentStore::new(Arc::clone(&storage));
        let scroll_throttle = Throttle::new(config.scroll_depth_throttle);
        Self {
            doc,
            storage,
            consent,
            sink,
            config,
            state: Mutex::new(TrackerState {
                initialized: false,
                queue: Vec::new(),
                scroll_depth: ScrollDepth::new(),
                scroll_throttle,
            }),
        }
    }

    /// Start tracking. Does nothing without consent or when already running.
    pub fn init(&self) {
        if !self.consent.has_accepted() {
            debug!("Analytics not started: no consent");
            return;
        }

        let mut state = self.state.lock();
        if state.initialized {
            return;
        }

        self.load_tag_script();

        self.sink.push(TagCommand::Js {
            timestamp: Utc::now(),
        });
        self.sink.push(TagCommand::Config {
            measurement_id: self.config.measurement_id.clone(),
            params: events::params(json!({
                "anonymize_ip": true,
                "send_page_view": true,
                "cookie_flags": "SameSite=None;Secure",
            })),
        });

        let language = self
            .storage
            .get(LANG_STORAGE_KEY)
            .unwrap_or_else(|| Locale::default().code().to_string());
        self.sink.push(TagCommand::Set {
            user_properties: events::params(json!({
                "language": language,
                "page_type": self.page_type(),
            })),
        });

        state.initialized = true;

        let queued = std::mem::take(&mut state.queue);
        if !queued.is_empty() {
            debug!("Flushing {} queued events", queued.len());
        }
        for event in queued {
            self.sink.push(event.into());
        }

        info!("Analytics initialized ({})", self.config.measurement_id);
    }

    fn load_tag_script(&self) {
        let mut doc = self.doc.lock();
        let script = doc.create_element("script");
        doc.set_attribute(script, "async", "");
        doc.set_attribute(script, "src", &self.config.tag_script_src());
        let head = doc.head();
        doc.append_child(head, script);
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn measurement_id(&self) -> &str {
        &self.config.measurement_id
    }

    /// Events waiting for initialization.
    pub fn queued(&self) -> Vec<TrackingEvent> {
        self.state.lock().queue.clone()
    }

    pub fn page_type(&self) -> PageType {
        PageType::classify(self.doc.lock().pathname())
    }

    /// Queue the event before initialization, deliver it after.
    ///
    /// Once running, events are dropped if consent has since been withdrawn.
    pub fn track_event(&self, name: &str, params: EventParams) {
        self.track(TrackingEvent::new(name, params));
    }

    fn track(&self, event: TrackingEvent) {
        let mut state = self.state.lock();
        if !state.initialized {
            state.queue.push(event);
            return;
        }
        if !self.consent.has_accepted() {
            debug!("Dropping {} event: consent withdrawn", event.name);
            return;
        }
        self.sink.push(event.into());
    }

    pub fn track_phone_click(&self) {
        self.track(events::phone_click(&self.config.contact_phone, self.page_type()));
    }

    pub fn track_email_click(&self) {
        self.track(events::email_click(&self.config.contact_email, self.page_type()));
    }

    pub fn track_social_click(&self, platform: &str, location: Option<&str>) {
        self.track(events::social_click(platform, location));
    }

    /// Also updates the `language` user property once running.
    pub fn track_language_change(&self, previous: &str, new: &str) {
        self.track(events::language_change(previous, new));

        if self.is_initialized() && self.consent.has_accepted() {
            self.sink.push(TagCommand::Set {
                user_properties: events::params(json!({ "language": new })),
            });
        }
    }

    pub fn track_navigation(&self, link_text: &str, destination: &str, location: Option<&str>) {
        self.track(events::navigation(link_text, destination, location));
    }

    pub fn track_cta_click(&self, button_text: &str, destination: &str, location: Option<&str>) {
        self.track(events::cta_click(button_text, destination, location));
    }

    pub fn track_faq_view(&self, question: &str, index: usize) {
        self.track(events::faq_view(question, index));
    }

    pub fn track_menu_category(&self, category_name: &str, section: &str) {
        self.track(events::menu_category(category_name, section));
    }

    pub fn track_scroll_depth(&self, percentage: u8) {
        self.track(events::scroll_depth(self.page_type(), percentage));
    }

    /// Automatic click tracking for contact and social links. Inactive until
    /// the tracker has started.
    pub fn handle_click(&self, target: NodeId) {
        if !self.is_initialized() {
            return;
        }

        let (phone, email, social_href) = {
            let doc = self.doc.lock();
            let social_href = doc
                .closest(target, ".contact-social a")
                .map(|link| doc.attribute(link, "href").unwrap_or_default().to_string());
            (
                doc.closest(target, "a[href^=\"tel:\"]").is_some(),
                doc.closest(target, "a[href^=\"mailto:\"]").is_some(),
                social_href,
            )
        };

        if phone {
            self.track_phone_click();
        }
        if email {
            self.track_email_click();
        }
        if let Some(href) = social_href {
            self.track_social_click(events::social_platform(&href), Some("Footer"));
        }
    }

    /// Throttled scroll-depth check against the current scroll position.
    pub fn handle_scroll(&self) {
        let (scroll_y, viewport_height, scroll_height) = {
            let doc = self.doc.lock();
            (doc.scroll_y(), doc.viewport_height(), doc.scroll_height())
        };

        let crossed = {
            let mut state = self.state.lock();
            if !state.initialized || !state.scroll_throttle.ready() {
                return;
            }
            let Some(percentage) =
                ScrollDepth::percentage(scroll_y, viewport_height, scroll_height)
            else {
                return;
            };
            state.scroll_depth.check(percentage)
        };

        for threshold in crossed {
            self.track_scroll_depth(threshold);
        }
    }
}

impl AnalyticsHandle for Tracker {
    fn init(&self) {
        Tracker::init(self);
    }

    fn track_event(&self, name: &str, params: EventParams) {
        Tracker::track_event(self, name, params);
    }
}

impl LanguageObserver for Tracker {
    fn language_changed(&self, previous: Locale, current: Locale) {
        self.track_language_change(previous.code(), current.code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::DataLayer;
    use crate::consent::CONSENT_STORAGE_KEY;
    use crate::dom::{self, Document};
    use crate::storage::MemoryStorage;
    use proptest::prelude::*;
    use reqwest::Url;
    use serde_json::Value;
    use std::time::Duration;

    const FOOTER: &str = r#"<html><head></head><body>
<a id="phone" href="tel:+381612003932"><span>Pozovi</span></a>
<a id="mail" href="mailto:caffeart@gmail.com">Pišite nam</a>
<div class="contact-social">
  <a id="fb" href="https://www.facebook.com/caffeart"><i class="fab fa-facebook"></i></a>
  <a id="ig" href="https://instagram.com/caffeart">IG</a>
</div>
<p id="plain">Tekst</p>
</body></html>"#;

    struct Fixture {
        tracker: Tracker,
        doc: SharedDocument,
        storage: Arc<MemoryStorage>,
        layer: Arc<DataLayer>,
    }

    fn fixture(path: &str, storage: MemoryStorage) -> Fixture {
        let doc = dom::shared(Document::parse(
            FOOTER,
            Url::parse(&format!("https://caffeart.rs{}", path)).unwrap(),
        ));
        let storage = Arc::new(storage);
        let layer = Arc::new(DataLayer::new());
        let tracker = Tracker::new(
            Arc::clone(&doc),
            storage.clone(),
            layer.clone(),
            Arc::new(SiteConfig::default()),
        );
        Fixture {
            tracker,
            doc,
            storage,
            layer,
        }
    }

    fn accepted() -> MemoryStorage {
        MemoryStorage::with_entries([(CONSENT_STORAGE_KEY, "accepted")])
    }

    fn event_names(layer: &DataLayer) -> Vec<String> {
        layer.events().into_iter().map(|e| e.name).collect()
    }

    fn click(f: &Fixture, selector: &str) {
        let target = f.doc.lock().query_selector(selector).unwrap();
        f.tracker.handle_click(target);
    }

    #[test]
    fn test_init_requires_consent() {
        let f = fixture("/", MemoryStorage::new());
        f.tracker.init();

        assert!(!f.tracker.is_initialized());
        assert!(f.layer.is_empty());
        assert!(f.doc.lock().query_selector("script").is_none());
    }

    #[test]
    fn test_init_configures_pipeline() {
        let storage = accepted();
        storage.set(LANG_STORAGE_KEY, "en");
        let f = fixture("/Caffe_art/bar/", storage);
        f.tracker.init();

        assert!(f.tracker.is_initialized());
        assert_eq!(f.tracker.measurement_id(), "G-PB3G5YR15S");

        let commands = f.layer.commands();
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], TagCommand::Js { .. }));
        match &commands[1] {
            TagCommand::Config {
                measurement_id,
                params,
            } => {
                assert_eq!(measurement_id, "G-PB3G5YR15S");
                assert_eq!(params["anonymize_ip"], true);
                assert_eq!(params["send_page_view"], true);
                assert_eq!(params["cookie_flags"], "SameSite=None;Secure");
            }
            other => panic!("expected config, got {:?}", other),
        }
        match &commands[2] {
            TagCommand::Set { user_properties } => {
                assert_eq!(user_properties["language"], "en");
                assert_eq!(user_properties["page_type"], "bar");
            }
            other => panic!("expected set, got {:?}", other),
        }

        let doc = f.doc.lock();
        let script = doc.query_selector("head script").unwrap();
        assert_eq!(
            doc.attribute(script, "src"),
            Some("https://www.googletagmanager.com/gtag/js?id=G-PB3G5YR15S")
        );
        assert!(doc.has_attribute(script, "async"));
    }

    #[test]
    fn test_init_is_idempotent() {
        let f = fixture("/", accepted());
        f.tracker.init();
        f.tracker.init();

        assert_eq!(f.layer.len(), 3);
        assert_eq!(f.doc.lock().query_selector_all("script").len(), 1);
    }

    #[test]
    fn test_language_property_defaults_to_serbian() {
        let f = fixture("/", accepted());
        f.tracker.init();

        match &f.layer.commands()[2] {
            TagCommand::Set { user_properties } => {
                assert_eq!(user_properties["language"], "sr");
                assert_eq!(user_properties["page_type"], "home");
            }
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_queue_flushes_in_order_once() {
        let f = fixture("/", MemoryStorage::new());
        f.tracker.track_event("first", EventParams::new());
        f.tracker.track_faq_view("Radno vreme?", 1);
        f.tracker.init();

        // Still no consent: nothing delivered, nothing lost
        assert!(f.layer.is_empty());
        assert_eq!(f.tracker.queued().len(), 2);

        f.storage.set(CONSENT_STORAGE_KEY, "accepted");
        f.tracker.init();
        f.tracker.track_event("third", EventParams::new());
        f.tracker.init();

        assert_eq!(event_names(&f.layer), vec!["first", "faq_view", "third"]);
        assert!(f.tracker.queued().is_empty());
    }

    #[test]
    fn test_withdrawn_consent_drops_events() {
        let f = fixture("/", accepted());
        f.tracker.init();
        f.tracker.track_event("before", EventParams::new());

        f.storage.remove(CONSENT_STORAGE_KEY);
        f.tracker.track_event("after", EventParams::new());

        assert_eq!(event_names(&f.layer), vec!["before"]);
        assert!(f.tracker.queued().is_empty());
    }

    #[test]
    fn test_language_change_updates_user_property() {
        let f = fixture("/", accepted());
        f.tracker.init();
        f.tracker.language_changed(Locale::Sr, Locale::En);

        let commands = f.layer.commands();
        let event = &f.layer.events()[0];
        assert_eq!(event.name, "language_change");
        assert_eq!(event.params["previous_language"], "sr");
        assert_eq!(event.params["new_language"], "en");
        assert_eq!(event.params["event_category"], "Engagement");

        match commands.last() {
            Some(TagCommand::Set { user_properties }) => {
                assert_eq!(user_properties.len(), 1);
                assert_eq!(user_properties["language"], "en");
            }
            other => panic!("expected set, got {:?}", other),
        }
    }

    #[test]
    fn test_language_change_before_init_is_queued() {
        let f = fixture("/", MemoryStorage::new());
        f.tracker.language_changed(Locale::Sr, Locale::En);

        assert_eq!(f.tracker.queued().len(), 1);
        assert!(f.layer.is_empty());
    }

    #[test]
    fn test_contact_params_use_config_and_page() {
        let f = fixture("/contact", accepted());
        f.tracker.init();
        f.tracker.track_phone_click();
        f.tracker.track_email_click();

        let events = f.layer.events();
        assert_eq!(events[0].params["phone_number"], "+381612003932");
        assert_eq!(events[0].params["page"], "contact");
        assert_eq!(events[1].params["email"], "caffeart@gmail.com");
        assert_eq!(events[1].params["event_label"], "Email Click");
    }

    #[test]
    fn test_auto_click_tracking() {
        let f = fixture("/", accepted());

        // Not active before init
        click(&f, "#phone span");
        assert!(f.tracker.queued().is_empty());

        f.tracker.init();
        click(&f, "#phone span");
        click(&f, "#mail");
        click(&f, "#fb i");
        click(&f, "#ig");
        click(&f, "#plain");

        let events = f.layer.events();
        let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "contact_phone_click",
                "contact_email_click",
                "social_media_click",
                "social_media_click"
            ]
        );
        assert_eq!(events[2].params["platform"], "Facebook");
        assert_eq!(events[2].params["link_location"], "Footer");
        assert_eq!(events[3].params["platform"], "Instagram");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_depth_thresholds() {
        let f = fixture("/gallery", accepted());
        f.doc.lock().set_viewport(1000.0, 4000.0);
        f.tracker.init();

        f.tracker.handle_scroll();
        f.doc.lock().scroll_to(3000.0);
        // Throttled: same instant
        f.tracker.handle_scroll();

        tokio::time::advance(Duration::from_millis(1000)).await;
        f.tracker.handle_scroll();
        tokio::time::advance(Duration::from_millis(1000)).await;
        f.tracker.handle_scroll();

        let depths: Vec<Value> = f
            .layer
            .events()
            .into_iter()
            .map(|e| {
                assert_eq!(e.name, "scroll_depth");
                assert_eq!(e.params["page"], "gallery");
                e.params["depth_percentage"].clone()
            })
            .collect();
        assert_eq!(depths, vec![json!(25), json!(50), json!(75), json!(100)]);
    }

    #[test]
    fn test_scroll_ignored_before_init() {
        let f = fixture("/", MemoryStorage::new());
        f.doc.lock().set_viewport(1000.0, 1000.0);
        f.tracker.handle_scroll();

        assert!(f.tracker.queued().is_empty());
    }

    proptest! {
        #[test]
        fn prop_queued_events_delivered_in_order(names in proptest::collection::vec("[a-z_]{1,12}", 0..20)) {
            let f = fixture("/", MemoryStorage::new());
            for name in &names {
                f.tracker.track_event(name, EventParams::new());
            }
            f.storage.set(CONSENT_STORAGE_KEY, "accepted");
            f.tracker.init();
            f.tracker.init();

            prop_assert_eq!(event_names(&f.layer), names);
            prop_assert!(f.tracker.queued().is_empty());
        }
    }
}
