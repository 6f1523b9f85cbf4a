//! Small helpers shared by the page components.

use crate::config::SiteConfig;
use crate::dom::Document;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

static LEADING_INT_REGEX: OnceLock<Regex> = OnceLock::new();

/// Coarse page category derived from the URL path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Home,
    Bar,
    Gallery,
    Contact,
    Faq,
}

impl PageType {
    /// First of bar, gallery, contact, faq whose `/{name}` segment the path
    /// contains; `Home` otherwise.
    pub fn classify(path: &str) -> PageType {
        const ORDER: [PageType; 4] = [
            PageType::Bar,
            PageType::Gallery,
            PageType::Contact,
            PageType::Faq,
        ];

        ORDER
            .into_iter()
            .find(|page| path.contains(&format!("/{}", page.as_str())))
            .unwrap_or(PageType::Home)
    }

    /// Translation key for the page title. Titles exist for home, bar,
    /// gallery and contact; anything else uses the home title.
    pub fn title_key(path: &str) -> &'static str {
        const TITLED: [PageType; 3] = [PageType::Bar, PageType::Gallery, PageType::Contact];

        let page = TITLED.into_iter().find(|page| {
            path.contains(&format!("/{}", page.as_str()))
                || path.contains(&format!("{}.html", page.as_str()))
        });

        match page {
            Some(PageType::Bar) => "meta.title.bar",
            Some(PageType::Gallery) => "meta.title.gallery",
            Some(PageType::Contact) => "meta.title.contact",
            _ => "meta.title.home",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Home => "home",
            PageType::Bar => "bar",
            PageType::Gallery => "gallery",
            PageType::Contact => "contact",
            PageType::Faq => "faq",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefix for asset and template paths. The site relies on a `<base>` tag, so
/// this is normally empty.
pub fn path_prefix(config: &SiteConfig) -> &str {
    &config.path_prefix
}

/// Admits at most one call per `delay`.
#[derive(Debug, Clone)]
pub struct Throttle {
    delay: Duration,
    last_call: Option<Instant>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: None,
        }
    }

    /// Whether a call made now should run. Admitted calls restart the window.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        if let Some(last) = self.last_call {
            if now.duration_since(last) < self.delay {
                return false;
            }
        }
        self.last_call = Some(now);
        true
    }
}

pub fn is_current_page(doc: &Document, pattern: &str) -> bool {
    doc.pathname().contains(pattern)
}

/// Drop a trailing slash from the location without navigating.
///
/// Returns whether the location changed.
pub fn remove_trailing_slash(doc: &mut Document) -> bool {
    let path = doc.pathname();
    if path.len() <= 1 || !path.ends_with('/') {
        return false;
    }

    let trimmed = path[..path.len() - 1].to_string();
    let mut location = doc.location().clone();
    location.set_path(&trimmed);
    debug!("Normalized location to {}", location);
    doc.replace_location(location);
    true
}

/// Markup of the mobile menu icon when the menu is closed.
pub const MENU_ICON_CLOSED: &str = r#"<i class="fas fa-bars"></i>"#;
/// Markup of the mobile menu icon when the menu is open.
pub const MENU_ICON_OPEN: &str = r#"<i class="fas fa-times"></i>"#;

/// Close the mobile navigation overlay if it is open and restore the scroll
/// offset saved in the body's `top` style.
pub fn close_mobile_menu(doc: &mut Document) {
    let Some(main_nav) = doc.query_selector(".main-nav") else {
        return;
    };
    if !doc.has_class(main_nav, "open") {
        return;
    }

    let body = doc.body();
    doc.remove_class(main_nav, "open");
    doc.remove_class(body, "menu-open");

    let scroll_position = doc
        .style(body, "top")
        .and_then(leading_int)
        .map(i64::abs)
        .unwrap_or(0);
    doc.set_style(body, "top", "");
    doc.scroll_to(scroll_position as f64);

    if let Some(menu_icon) = doc.query_selector(".mobile-menu-icon") {
        doc.set_inner_html(menu_icon, MENU_ICON_CLOSED);
    }
}

/// Leading integer of a CSS length such as `-340px`, like `parseInt`.
fn leading_int(value: &str) -> Option<i64> {
    let regex = LEADING_INT_REGEX.get_or_init(|| Regex::new(r"^\s*([+-]?\d+)").unwrap());
    regex
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
