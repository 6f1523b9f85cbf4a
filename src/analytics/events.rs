//! Tracking events and the fixed parameter shapes of the semantic events.

use crate::utils::PageType;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Event parameters: a flat JSON object of primitive values.
pub type EventParams = Map<String, Value>;

/// Scroll depths reported once each per page view, ascending.
pub const SCROLL_THRESHOLDS: [u8; 4] = [25, 50, 75, 100];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingEvent {
    pub name: String,
    pub params: EventParams,
}

impl TrackingEvent {
    pub fn new(name: impl Into<String>, params: EventParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Take the fields of a JSON object; any other value yields no parameters.
pub fn params(value: Value) -> EventParams {
    match value {
        Value::Object(map) => map,
        _ => EventParams::new(),
    }
}

pub fn phone_click(phone_number: &str, page: PageType) -> TrackingEvent {
    TrackingEvent::new(
        "contact_phone_click",
        params(json!({
            "event_category": "Contact",
            "event_label": "Phone Number Click",
            "phone_number": phone_number,
            "page": page,
        })),
    )
}

pub fn email_click(email: &str, page: PageType) -> TrackingEvent {
    TrackingEvent::new(
        "contact_email_click",
        params(json!({
            "event_category": "Contact",
            "event_label": "Email Click",
            "email": email,
            "page": page,
        })),
    )
}

pub fn social_click(platform: &str, location: Option<&str>) -> TrackingEvent {
    TrackingEvent::new(
        "social_media_click",
        params(json!({
            "event_category": "Social",
            "platform": platform,
            "link_location": location.unwrap_or("Footer"),
        })),
    )
}

pub fn language_change(previous: &str, new: &str) -> TrackingEvent {
    TrackingEvent::new(
        "language_change",
        params(json!({
            "event_category": "Engagement",
            "previous_language": previous,
            "new_language": new,
        })),
    )
}

pub fn navigation(link_text: &str, destination: &str, location: Option<&str>) -> TrackingEvent {
    TrackingEvent::new(
        "navigation_click",
        params(json!({
            "event_category": "Navigation",
            "link_text": link_text,
            "link_url": destination,
            "click_location": location.unwrap_or("Header"),
        })),
    )
}

pub fn cta_click(button_text: &str, destination: &str, location: Option<&str>) -> TrackingEvent {
    TrackingEvent::new(
        "cta_click",
        params(json!({
            "event_category": "CTA",
            "button_text": button_text,
            "destination": destination,
            "location": location.unwrap_or("Homepage"),
        })),
    )
}

/// `index` is 1-based.
pub fn faq_view(question: &str, index: usize) -> TrackingEvent {
    TrackingEvent::new(
        "faq_view",
        params(json!({
            "event_category": "FAQ",
            "question": question,
            "question_index": index,
        })),
    )
}

pub fn menu_category(category_name: &str, section: &str) -> TrackingEvent {
    TrackingEvent::new(
        "menu_category_view",
        params(json!({
            "event_category": "Menu",
            "category_name": category_name,
            "section": section,
        })),
    )
}

pub fn scroll_depth(page: PageType, percentage: u8) -> TrackingEvent {
    TrackingEvent::new(
        "scroll_depth",
        params(json!({
            "event_category": "Engagement",
            "page": page,
            "depth_percentage": percentage,
        })),
    )
}

/// Social network named by a link target.
pub fn social_platform(href: &str) -> &'static str {
    if href.contains("facebook.com") {
        "Facebook"
    } else if href.contains("instagram.com") {
        "Instagram"
    } else {
        "Unknown"
    }
}

/// Scroll-depth thresholds already reported for this page view.
#[derive(Debug, Clone, Default)]
pub struct ScrollDepth {
    fired: [bool; SCROLL_THRESHOLDS.len()],
}

impl ScrollDepth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentage of the document seen so far, or `None` for an empty
    /// document.
    pub fn percentage(scroll_y: f64, viewport_height: f64, scroll_height: f64) -> Option<f64> {
        (scroll_height > 0.0).then(|| (scroll_y + viewport_height) / scroll_height * 100.0)
    }

    /// Mark and return the thresholds `percentage` reaches for the first time.
    pub fn check(&mut self, percentage: f64) -> Vec<u8> {
        SCROLL_THRESHOLDS
            .iter()
            .zip(self.fired.iter_mut())
            .filter_map(|(&threshold, fired)| {
                if *fired || percentage < f64::from(threshold) {
                    return None;
                }
                *fired = true;
                Some(threshold)
            })
            .collect()
    }

    pub fn fired(&self) -> Vec<u8> {
        SCROLL_THRESHOLDS
            .iter()
            .zip(self.fired)
            .filter_map(|(&threshold, fired)| fired.then_some(threshold))
            .collect()
    }
}
