//! The translation engine: loads a locale's document and applies it to the
//! tagged elements of the page.

use super::locale::{Locale, LANG_STORAGE_KEY};
use super::tree::{parse_attr_pairs, TranslationTree};
use crate::config::SiteConfig;
use crate::dom::{NodeId, SharedDocument};
use crate::fetch::{fetch_json, Fetcher};
use crate::storage::Storage;
use crate::utils::{self, PageType};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Elements whose text is a single translation key.
pub const TEXT_ATTRIBUTE: &str = "data-i18n";
/// Elements carrying `attribute:key` pairs separated by `;`.
pub const ATTR_ATTRIBUTE: &str = "data-i18n-attr";
/// Language switch controls; each carries `data-lang`.
pub const LANGUAGE_CONTROLS: &str = ".lang-switcher button, .mobile-lang-switcher button, \
                                     .lang-switcher a, .mobile-lang-switcher a";

/// Bar page menu cards, in card order.
const BAR_CARD_CATEGORIES: [&str; 4] = ["spirits", "beers", "cold_drinks", "hot_drinks"];

/// Something that wants to hear about completed language switches.
pub trait LanguageObserver: Send + Sync {
    fn language_changed(&self, previous: Locale, current: Locale);
}

/// Something that knows the current display language.
pub trait LocaleSource: Send + Sync {
    fn current_locale(&self) -> Locale;
}

struct State {
    /// Requested locale; ahead of `applied` while a switch is in flight.
    current: Locale,
    translations: Arc<TranslationTree>,
    /// Locale of `translations`.
    loaded: Locale,
    /// Locale whose text the page last finished showing.
    applied: Locale,
    switcher_bound: bool,
}

/// Translation engine for one page view.
pub struct I18n<F> {
    doc: SharedDocument,
    storage: Arc<dyn Storage>,
    fetcher: Arc<F>,
    config: Arc<SiteConfig>,
    state: Mutex<State>,
    /// Request token; a load whose token is no longer current is discarded.
    generation: AtomicU64,
    observers: Mutex<Vec<Arc<dyn LanguageObserver>>>,
}

impl<F: Fetcher> I18n<F> {
    pub fn new(
        doc: SharedDocument,
        storage: Arc<dyn Storage>,
        fetcher: Arc<F>,
        config: Arc<SiteConfig>,
    ) -> Self {
        Self {
            doc,
            storage,
            fetcher,
            config,
            state: Mutex::new(State {
                current: Locale::default(),
                translations: Arc::new(TranslationTree::default()),
                loaded: Locale::default(),
                applied: Locale::default(),
                switcher_bound: false,
            }),
            generation: AtomicU64::new(0),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Register a collaborator notified after each language switch, in
    /// registration order.
    pub fn subscribe(&self, observer: Arc<dyn LanguageObserver>) {
        self.observers.lock().push(observer);
    }

    pub fn current_language(&self) -> Locale {
        self.state.lock().current
    }

    /// The translation document currently applied.
    pub fn translations(&self) -> Arc<TranslationTree> {
        Arc::clone(&self.state.lock().translations)
    }

    /// Restore the saved locale, load and apply its translations and wire the
    /// language controls.
    ///
    /// Must run after every template fragment with translatable markup is in
    /// the page.
    pub async fn init(&self) {
        let locale = Locale::from_storage(self.storage.as_ref()).unwrap_or_default();
        self.state.lock().current = locale;
        self.doc.lock().set_lang(locale.code());
        info!("Initializing i18n with locale {}", locale);

        if self.load_translations().await {
            self.apply_translations().await;
        }

        self.setup_language_switcher();
        self.update_active_language();
    }

    fn next_token(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current_token(&self, token: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == token
    }

    /// Load the current locale's document, falling back to the default locale
    /// on failure.
    ///
    /// Returns whether a document was installed. Nothing is installed when
    /// both loads fail or a newer load has started in the meantime.
    pub async fn load_translations(&self) -> bool {
        let token = self.next_token();
        let requested = self.current_language();

        let Some((locale, tree)) = self.fetch_with_fallback(requested).await else {
            return false;
        };

        if !self.is_current_token(token) {
            debug!("Discarding stale {} translations", locale);
            return false;
        }

        {
            let mut state = self.state.lock();
            state.current = locale;
            state.translations = Arc::new(tree);
            state.loaded = locale;
        }
        if locale != requested {
            self.doc.lock().set_lang(locale.code());
        }
        true
    }

    async fn fetch_with_fallback(&self, locale: Locale) -> Option<(Locale, TranslationTree)> {
        let prefix = utils::path_prefix(&self.config);

        let path = locale.translation_path(prefix);
        match fetch_json::<_, TranslationTree>(self.fetcher.as_ref(), &path).await {
            Ok(tree) => return Some((locale, tree)),
            Err(e) if locale.is_default() => {
                warn!("Failed to load default translations: {}", e);
                return None;
            }
            Err(e) => warn!("Failed to load {} translations, falling back: {}", locale, e),
        }

        let fallback = Locale::default();
        let path = fallback.translation_path(prefix);
        match fetch_json::<_, TranslationTree>(self.fetcher.as_ref(), &path).await {
            Ok(tree) => Some((fallback, tree)),
            Err(e) => {
                warn!("Failed to load fallback translations: {}", e);
                None
            }
        }
    }

    /// Apply the current translations to the page.
    ///
    /// Attributes change immediately; text fades out and the new content is
    /// swapped in at the fade midpoint. Keys that do not resolve leave the
    /// element untouched.
    ///
    /// Returns false when a newer load replaced the translations during the
    /// fade; the newer content is then left in place.
    pub async fn apply_translations(&self) -> bool {
        let token = self.generation.load(Ordering::SeqCst);
        let (tree, locale) = {
            let state = self.state.lock();
            (Arc::clone(&state.translations), state.loaded)
        };

        let pending: Vec<(NodeId, String)> = {
            let mut doc = self.doc.lock();
            self.update_page_title_with(&mut doc, &tree);

            let pending: Vec<(NodeId, String)> = doc
                .query_selector_all(&format!("[{}]", TEXT_ATTRIBUTE))
                .into_iter()
                .filter_map(|id| {
                    let key = doc.attribute(id, TEXT_ATTRIBUTE)?;
                    tree.resolve(key.trim()).map(|text| (id, text.to_string()))
                })
                .collect();
            for (id, _) in &pending {
                doc.set_style(*id, "opacity", "0");
            }

            for id in doc.query_selector_all(&format!("[{}]", ATTR_ATTRIBUTE)) {
                let pairs = doc.attribute(id, ATTR_ATTRIBUTE).unwrap_or_default().to_string();
                for (attr, key) in parse_attr_pairs(&pairs) {
                    if let Some(value) = tree.resolve(key) {
                        doc.set_attribute(id, attr, value);
                    }
                }
            }

            translate_bar_cards(&mut doc, &tree);
            pending
        };

        if !self.config.fade_midpoint.is_zero() {
            tokio::time::sleep(self.config.fade_midpoint).await;
        }

        let stale = !self.is_current_token(token);
        if stale {
            debug!("Translations changed during fade, keeping newer content");
        }

        {
            let mut doc = self.doc.lock();
            for (id, text) in pending {
                if !stale {
                    doc.set_text_content(id, &text);
                    doc.set_style(id, "transition", "opacity 0.3s ease");
                }
                doc.set_style(id, "opacity", "1");
            }
        }

        if !stale {
            self.state.lock().applied = locale;
        }
        !stale
    }

    /// Locale of the text the page currently shows.
    pub fn applied_language(&self) -> Locale {
        self.state.lock().applied
    }

    /// Set the document title from `meta.title.{page}` when it resolves.
    pub fn update_page_title(&self) {
        let tree = self.translations();
        let mut doc = self.doc.lock();
        self.update_page_title_with(&mut doc, &tree);
    }

    fn update_page_title_with(&self, doc: &mut crate::dom::Document, tree: &TranslationTree) {
        let key = PageType::title_key(doc.pathname());
        if let Some(title) = tree.resolve(key) {
            doc.set_title(title);
        }
    }

    /// Switch to `code` if it is a supported locale other than the current one.
    pub async fn switch_language(&self, code: &str) {
        let Ok(target) = Locale::from_code(code) else {
            debug!("Ignoring unsupported language '{}'", code);
            return;
        };

        let previous = {
            let mut state = self.state.lock();
            if state.current == target {
                return;
            }
            state.current = target;
            state.applied
        };

        info!("Switching language {} -> {}", previous, target);
        self.storage.set(LANG_STORAGE_KEY, target.code());
        self.doc.lock().set_lang(target.code());

        // A stale load or apply leaves reporting to the newer switch
        if !self.load_translations().await || !self.apply_translations().await {
            self.update_active_language();
            utils::close_mobile_menu(&mut self.doc.lock());
            return;
        }
        self.update_active_language();

        let current = self.applied_language();
        if current != previous {
            let observers: Vec<_> = self.observers.lock().clone();
            for observer in observers {
                observer.language_changed(previous, current);
            }
        }

        utils::close_mobile_menu(&mut self.doc.lock());
    }

    /// Mark the language controls as wired. Returns whether any exist.
    pub fn setup_language_switcher(&self) -> bool {
        let found = !self.doc.lock().query_selector_all(LANGUAGE_CONTROLS).is_empty();
        self.state.lock().switcher_bound = found;
        found
    }

    pub fn is_switcher_bound(&self) -> bool {
        self.state.lock().switcher_bound
    }

    /// The `data-lang` of the language control containing `target`, if any.
    pub fn language_control_for(&self, target: NodeId) -> Option<String> {
        if !self.is_switcher_bound() {
            return None;
        }
        let doc = self.doc.lock();
        let control = doc.closest(target, LANGUAGE_CONTROLS)?;
        Some(doc.attribute(control, "data-lang").unwrap_or_default().to_string())
    }

    /// Give the control of the current locale the `active` class.
    pub fn update_active_language(&self) {
        let current = self.current_language();
        let mut doc = self.doc.lock();
        for control in doc.query_selector_all(LANGUAGE_CONTROLS) {
            if doc.attribute(control, "data-lang") == Some(current.code()) {
                doc.add_class(control, "active");
            } else {
                doc.remove_class(control, "active");
            }
        }
    }
}

impl<F: Fetcher> LocaleSource for I18n<F> {
    fn current_locale(&self) -> Locale {
        self.current_language()
    }
}

/// Static menu cards on the bar page take their title and list items from
/// `bar.categories.*`.
fn translate_bar_cards(doc: &mut crate::dom::Document, tree: &TranslationTree) {
    if !utils::is_current_page(doc, "/bar") {
        return;
    }

    let cards = doc.query_selector_all(".menu-card");
    for (card, category_key) in cards.into_iter().zip(BAR_CARD_CATEGORIES) {
        let Some(category) = tree.get(&format!("bar.categories.{}", category_key)) else {
            continue;
        };

        if let Some(title) = category.get("title").and_then(|t| t.as_str()) {
            if let Some(title_element) = doc.query_selector_within(card, ".menu-card-title") {
                doc.set_text_content(title_element, title);
            }
        }

        let items = category.get("items").and_then(|i| i.as_array());
        let list_items = doc.query_selector_all_within(card, ".menu-card-list li");
        for (index, item) in list_items.into_iter().enumerate() {
            let text = items
                .and_then(|items| items.get(index))
                .and_then(|value| value.as_str())
                .filter(|text| !text.is_empty());
            if let Some(text) = text {
                doc.set_text_content(item, text);
            }
        }
    }
}
