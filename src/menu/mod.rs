//! Drinks menu for the bar page.
//!
//! The menu document is fetched once per page view and re-rendered from the
//! cached copy whenever the display language changes.

mod model;
mod render;

pub use model::{CategoryTitle, MenuCategory, MenuData, MenuFile, MenuItem, Price};
pub use render::{category_icon, format_volume, render_menu, section_title, Section, SECTIONS};

use crate::config::SiteConfig;
use crate::dom::SharedDocument;
use crate::fetch::{fetch_json, Fetcher};
use crate::i18n::{LanguageObserver, Locale, LocaleSource};
use crate::utils;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

pub const MENU_CONTAINER_ID: &str = "drinks-menu";

struct MenuState {
    data: Option<Arc<MenuData>>,
    locale: Locale,
}

pub struct Menu<F> {
    doc: SharedDocument,
    fetcher: Arc<F>,
    config: Arc<SiteConfig>,
    locale_source: Option<Arc<dyn LocaleSource>>,
    state: Mutex<MenuState>,
}

impl<F: Fetcher> Menu<F> {
    pub fn new(
        doc: SharedDocument,
        fetcher: Arc<F>,
        config: Arc<SiteConfig>,
        locale_source: Option<Arc<dyn LocaleSource>>,
    ) -> Self {
        Self {
            doc,
            fetcher,
            config,
            locale_source,
            state: Mutex::new(MenuState {
                data: None,
                locale: Locale::default(),
            }),
        }
    }

    fn read_locale(&self) -> Locale {
        self.locale_source
            .as_ref()
            .map(|source| source.current_locale())
            .unwrap_or_default()
    }

    pub fn current_locale(&self) -> Locale {
        self.state.lock().locale
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().data.is_some()
    }

    /// Fetch the menu document and render it.
    pub async fn init(&self) {
        self.state.lock().locale = self.read_locale();

        let path = format!("{}assets/data/menu.json", utils::path_prefix(&self.config));
        match fetch_json::<_, MenuFile>(self.fetcher.as_ref(), &path).await {
            Ok(file) => {
                debug!(
                    "Loaded menu with {} categories",
                    file.menu.alcoholic_drinks.len()
                );
                self.state.lock().data = Some(Arc::new(file.menu));
            }
            Err(e) => error!("Error loading menu data: {}", e),
        }

        self.render();
    }

    /// Render the cached menu into `#drinks-menu`.
    ///
    /// Returns whether anything was rendered.
    pub fn render(&self) -> bool {
        let (data, locale) = {
            let state = self.state.lock();
            (state.data.clone(), state.locale)
        };
        let Some(data) = data else {
            error!("Menu data not loaded");
            return false;
        };

        let mut doc = self.doc.lock();
        let Some(container) = doc.get_element_by_id(MENU_CONTAINER_ID) else {
            error!("Menu container not found");
            return false;
        };
        render_menu(&mut doc, container, &data, locale);
        true
    }

    /// Re-read the display language and re-render without fetching again.
    pub fn update_language(&self) {
        self.state.lock().locale = self.read_locale();
        self.render();
    }
}

impl<F: Fetcher> LanguageObserver for Menu<F> {
    fn language_changed(&self, _previous: Locale, _current: Locale) {
        self.update_language();
    }
}
