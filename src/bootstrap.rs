//! Page bootstrap: builds every component for one page view, loads the
//! shared template fragments and routes page events to the components.

use crate::analytics::{TagSink, Tracker};
use crate::config::SiteConfig;
use crate::consent::{AnalyticsHandle, ConsentChoice, ConsentGate, ConsentStore};
use crate::dom::{Document, NodeId, SharedDocument};
use crate::faq::Faq;
use crate::fetch::Fetcher;
use crate::i18n::{I18n, LanguageObserver, LocaleSource};
use crate::loading::LoadingScreen;
use crate::menu::Menu;
use crate::storage::Storage;
use crate::utils::{self, Throttle, MENU_ICON_OPEN};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const STICKY_NAV_OFFSET: f64 = 100.0;
const SCROLL_FRAME: Duration = Duration::from_millis(16);

/// A template fragment and the element it is loaded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Header,
    Footer,
    CookieConsent,
}

impl Template {
    pub fn path(&self) -> &'static str {
        match self {
            Template::Header => "components/header.html",
            Template::Footer => "components/footer.html",
            Template::CookieConsent => "components/cookie-consent.html",
        }
    }

    pub fn container(&self) -> &'static str {
        match self {
            Template::Header => "#header-nav",
            Template::Footer => "#footer-container",
            Template::CookieConsent => "#cookie-consent-container",
        }
    }
}

/// Which templates made it into the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateReport {
    pub header: bool,
    pub footer: bool,
    pub cookie_consent: bool,
}

impl TemplateReport {
    pub fn all_loaded(&self) -> bool {
        self.header && self.footer && self.cookie_consent
    }
}

struct NavState {
    mobile_menu_bound: bool,
    sticky_throttle: Throttle,
}

/// One page view with all of its components wired together.
pub struct Page<F> {
    doc: SharedDocument,
    config: Arc<SiteConfig>,
    fetcher: Arc<F>,
    tracker: Arc<Tracker>,
    consent: Arc<ConsentGate>,
    i18n: Arc<I18n<F>>,
    menu: Arc<Menu<F>>,
    faq: Faq,
    loading: LoadingScreen,
    nav: Mutex<NavState>,
}

impl<F: Fetcher + 'static> Page<F> {
    pub fn new(
        doc: SharedDocument,
        config: Arc<SiteConfig>,
        fetcher: Arc<F>,
        storage: Arc<dyn Storage>,
        sink: Arc<dyn TagSink>,
    ) -> Self {
        let tracker = Arc::new(Tracker::new(
            Arc::clone(&doc),
            Arc::clone(&storage),
            sink,
            Arc::clone(&config),
        ));
        let analytics: Arc<dyn AnalyticsHandle> = tracker.clone();

        let consent = Arc::new(ConsentGate::new(
            Arc::clone(&doc),
            ConsentStore::new(Arc::clone(&storage)),
            Arc::clone(&analytics),
            Arc::clone(&config),
        ));

        let i18n = Arc::new(I18n::new(
            Arc::clone(&doc),
            storage,
            Arc::clone(&fetcher),
            Arc::clone(&config),
        ));
        let locale_source: Arc<dyn LocaleSource> = i18n.clone();

        let menu = Arc::new(Menu::new(
            Arc::clone(&doc),
            Arc::clone(&fetcher),
            Arc::clone(&config),
            Some(locale_source),
        ));

        // Analytics hears about a switch before the menu re-renders
        i18n.subscribe(tracker.clone() as Arc<dyn LanguageObserver>);
        i18n.subscribe(menu.clone() as Arc<dyn LanguageObserver>);

        let faq = Faq::new(Arc::clone(&doc), analytics);
        let loading = LoadingScreen::new(Arc::clone(&doc), Arc::clone(&config));
        let sticky_throttle = Throttle::new(config.sticky_nav_throttle);

        Self {
            doc,
            config,
            fetcher,
            tracker,
            consent,
            i18n,
            menu,
            faq,
            loading,
            nav: Mutex::new(NavState {
                mobile_menu_bound: false,
                sticky_throttle,
            }),
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    pub fn consent(&self) -> &Arc<ConsentGate> {
        &self.consent
    }

    pub fn i18n(&self) -> &Arc<I18n<F>> {
        &self.i18n
    }

    pub fn menu(&self) -> &Arc<Menu<F>> {
        &self.menu
    }

    pub fn faq(&self) -> &Faq {
        &self.faq
    }

    /// Load the page behind its loading screen.
    pub async fn boot(&self) -> TemplateReport {
        let (loaded_tx, loaded_rx) = tokio::sync::oneshot::channel::<()>();

        let load = async {
            let report = self.load().await;
            let _ = loaded_tx.send(());
            report
        };
        let screen = self.loading.run(async {
            let _ = loaded_rx.await;
        });

        let (report, ()) = futures::join!(load, screen);
        report
    }

    /// Load templates, translations and the menu.
    ///
    /// Translations are applied only once all three templates are in place.
    /// The menu loads independently of both.
    pub async fn load(&self) -> TemplateReport {
        utils::remove_trailing_slash(&mut self.doc.lock());
        self.faq.init();

        let templates = async {
            let (header, footer, cookie_consent) = futures::join!(
                self.load_template(Template::Header),
                self.load_template(Template::Footer),
                self.load_template(Template::CookieConsent),
            );
            let report = TemplateReport {
                header,
                footer,
                cookie_consent,
            };

            if report.all_loaded() {
                self.i18n.init().await;
            } else {
                warn!("Not all templates loaded, translations not applied: {:?}", report);
            }
            report
        };

        let (report, ()) = futures::join!(templates, self.menu.init());
        info!("Page loaded: {}", self.doc.lock().pathname());
        report
    }

    async fn load_template(&self, template: Template) -> bool {
        let path = format!("{}{}", utils::path_prefix(&self.config), template.path());
        let markup = match self.fetcher.fetch_text(&path).await {
            Ok(markup) => markup,
            Err(e) => {
                error!("Failed to load template: {}", e);
                return false;
            }
        };

        {
            let mut doc = self.doc.lock();
            let Some(container) = doc.query_selector(template.container()) else {
                warn!("No {} container for {}", template.container(), path);
                return false;
            };
            doc.set_inner_html(container, &markup);
        }
        debug!("Loaded {}", path);

        match template {
            Template::Header => self.setup_header(),
            Template::Footer => self.setup_footer(),
            Template::CookieConsent => self.consent.init(),
        }
        true
    }

    fn setup_header(&self) {
        let base = self.config.base_url.clone();
        let mut doc = self.doc.lock();

        let links = [
            (".logo-link", base.clone()),
            (".nav-bar", format!("{}bar/", base)),
            (".nav-gallery", format!("{}gallery/", base)),
            (".nav-contact", format!("{}contact/", base)),
        ];
        for (selector, href) in links {
            if let Some(link) = doc.query_selector(selector) {
                doc.set_attribute(link, "href", &href);
            }
        }

        if let Some(logo) = doc.query_selector(".logo") {
            let src = self.logo_src(&doc);
            doc.set_attribute(logo, "src", src);
        }

        let bound = doc.query_selector(".mobile-menu-icon").is_some()
            && doc.query_selector(".main-nav").is_some();
        self.nav.lock().mobile_menu_bound = bound;

        set_active_nav_link(&mut doc);
    }

    fn logo_src(&self, doc: &Document) -> &'static str {
        if doc.location().host_str() == Some(self.config.github_pages_host.as_str()) {
            return "/Caffe_art/assets/img/logo/logo.png";
        }
        let path = doc.pathname();
        let in_subfolder = ["/bar", "/gallery", "/contact", "/faq"]
            .iter()
            .any(|folder| path.contains(folder));
        if in_subfolder {
            "../assets/img/logo/logo.png"
        } else {
            "assets/img/logo/logo.png"
        }
    }

    fn setup_footer(&self) {
        let mut doc = self.doc.lock();
        if let Some(button) = doc.query_selector(".faq-button") {
            let href = format!("{}faq/", self.config.base_url);
            doc.set_attribute(button, "href", &href);
        }
    }

    /// Dispatch a click on `target`. Resolves once everything the click
    /// started has finished; returns whether the default action was
    /// prevented.
    pub async fn click(&self, target: NodeId) -> bool {
        if self.toggle_mobile_menu(target) {
            return false;
        }

        if let Some(code) = self.i18n.language_control_for(target) {
            self.i18n.switch_language(&code).await;
            return true;
        }

        if let Some(choice) = self.consent.control_for(target) {
            match choice {
                ConsentChoice::Accept => self.consent.on_accept().await,
                ConsentChoice::Decline => self.consent.on_decline().await,
            }
            return false;
        }

        if let Some(question) = self.faq.question_for(target) {
            self.faq.toggle(question);
            return false;
        }

        self.track_navigation(target);
        self.track_cta(target);
        self.close_menu_from_link(target);
        self.tracker.handle_click(target);

        self.smooth_scroll(target).await
    }

    /// Dispatch a key press on `target`. Returns whether it was handled.
    pub fn key(&self, target: NodeId, key: &str) -> bool {
        self.faq.key(target, key)
    }

    /// React to the current scroll position.
    pub fn scroll(&self) {
        self.update_sticky_nav();
        self.tracker.handle_scroll();
    }

    fn update_sticky_nav(&self) {
        if !self.nav.lock().sticky_throttle.ready() {
            return;
        }
        let mut doc = self.doc.lock();
        let Some(nav) = doc.query_selector("nav") else {
            return;
        };
        if doc.scroll_y() > STICKY_NAV_OFFSET {
            doc.add_class(nav, "sticky");
        } else {
            doc.remove_class(nav, "sticky");
        }
    }

    /// Open or close the mobile navigation when its icon is clicked. Returns
    /// whether `target` was the icon.
    fn toggle_mobile_menu(&self, target: NodeId) -> bool {
        if !self.nav.lock().mobile_menu_bound {
            return false;
        }

        let mut doc = self.doc.lock();
        let Some(icon) = doc.closest(target, ".mobile-menu-icon") else {
            return false;
        };
        let Some(main_nav) = doc.query_selector(".main-nav") else {
            return false;
        };

        if doc.has_class(main_nav, "open") {
            utils::close_mobile_menu(&mut doc);
            return true;
        }

        // Body offset holds the scroll position until the menu closes
        let scroll_position = doc.scroll_y();
        let body = doc.body();
        doc.add_class(main_nav, "open");
        doc.add_class(body, "menu-open");
        doc.set_style(body, "top", &format!("-{}px", scroll_position));
        doc.set_inner_html(icon, MENU_ICON_OPEN);
        true
    }

    fn close_menu_from_link(&self, target: NodeId) {
        if !self.nav.lock().mobile_menu_bound {
            return;
        }
        let mut doc = self.doc.lock();
        if doc.closest(target, ".main-nav li a").is_some() {
            utils::close_mobile_menu(&mut doc);
        }
    }

    fn track_navigation(&self, target: NodeId) {
        let navigation = {
            let doc = self.doc.lock();
            doc.closest(target, ".main-nav a")
                .filter(|&link| !doc.has_attribute(link, "data-lang"))
                .map(|link| {
                    let open = doc
                        .query_selector(".main-nav")
                        .is_some_and(|nav| doc.has_class(nav, "open"));
                    (
                        doc.text_content(link).trim().to_string(),
                        doc.attribute(link, "href").unwrap_or_default().to_string(),
                        if open { "Mobile Menu" } else { "Header" },
                    )
                })
        };

        if let Some((text, href, location)) = navigation {
            self.tracker.track_navigation(&text, &href, Some(location));
        }
    }

    fn track_cta(&self, target: NodeId) {
        let cta = {
            let doc = self.doc.lock();
            doc.closest(target, ".cta-box .link-naslov").map(|button| {
                (
                    doc.text_content(button).trim().to_string(),
                    doc.attribute(button, "href").unwrap_or_default().to_string(),
                )
            })
        };

        if let Some((text, href)) = cta {
            self.tracker.track_cta_click(&text, &href, Some("Homepage"));
        }
    }

    /// Animate to a same-page anchor. Returns whether the click was an anchor
    /// with a target on this page.
    async fn smooth_scroll(&self, target: NodeId) -> bool {
        let destination = {
            let doc = self.doc.lock();
            let Some(anchor) = doc.closest(target, "a[href*=\"#\"]") else {
                return false;
            };
            let href = doc.attribute(anchor, "href").unwrap_or_default();
            if href == "#" {
                return false;
            }
            let Ok(url) = doc.location().join(href) else {
                return false;
            };

            let same_page = url.path().trim_start_matches('/')
                == doc.pathname().trim_start_matches('/')
                && url.host_str() == doc.location().host_str();
            let fragment = url.fragment().unwrap_or_default();
            if !same_page || fragment.is_empty() {
                return false;
            }

            let element = doc
                .get_element_by_id(fragment)
                .or_else(|| doc.query_selector(&format!("[name=\"{}\"]", fragment)));
            match element {
                Some(element) => doc.offset_top(element),
                None => return false,
            }
        };

        self.animate_scroll(destination).await;
        true
    }

    async fn animate_scroll(&self, destination: f64) {
        let start_position = self.doc.lock().scroll_y();
        let distance = destination - start_position;
        let duration = self.config.smooth_scroll_duration;

        let started = Instant::now();
        let mut frames = tokio::time::interval(SCROLL_FRAME);
        loop {
            frames.tick().await;
            let elapsed = started.elapsed().min(duration);
            let position = ease_in_out_quad(elapsed, start_position, distance, duration);
            self.doc.lock().scroll_to(position);
            if elapsed >= duration {
                break;
            }
        }
    }
}

/// Quadratic ease-in-out from `start` by `change` over `duration`.
pub fn ease_in_out_quad(elapsed: Duration, start: f64, change: f64, duration: Duration) -> f64 {
    if duration.is_zero() {
        return start + change;
    }
    let mut t = elapsed.as_secs_f64() / (duration.as_secs_f64() / 2.0);
    if t < 1.0 {
        return change / 2.0 * t * t + start;
    }
    t -= 1.0;
    -change / 2.0 * (t * (t - 2.0) - 1.0) + start
}

/// Mark the navigation link of the current section as active.
pub fn set_active_nav_link(doc: &mut Document) {
    for link in doc.query_selector_all(".main-nav li a") {
        doc.remove_class(link, "active");
    }

    let path = doc.pathname().to_string();
    let active = [("/bar", ".nav-bar"), ("/gallery", ".nav-gallery"), ("/contact", ".nav-contact")]
        .into_iter()
        .find(|(folder, _)| path.contains(folder))
        .and_then(|(_, selector)| doc.query_selector(selector));
    if let Some(link) = active {
        doc.add_class(link, "active");
    }
}
