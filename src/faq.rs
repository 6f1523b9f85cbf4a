//! FAQ page accordion: at most one answer open at a time.

use crate::analytics::events;
use crate::consent::AnalyticsHandle;
use crate::dom::{NodeId, SharedDocument};
use std::sync::Arc;

const ITEM_SELECTOR: &str = ".faq-item";
const QUESTION_SELECTOR: &str = ".faq-question";

pub struct Faq {
    doc: SharedDocument,
    analytics: Arc<dyn AnalyticsHandle>,
}

impl Faq {
    pub fn new(doc: SharedDocument, analytics: Arc<dyn AnalyticsHandle>) -> Self {
        Self { doc, analytics }
    }

    /// Open the first item. Returns the number of items found.
    pub fn init(&self) -> usize {
        let mut doc = self.doc.lock();
        let items = doc.query_selector_all(ITEM_SELECTOR);

        if let Some(&first) = items.first() {
            if let Some(question) = doc.query_selector_within(first, QUESTION_SELECTOR) {
                doc.add_class(first, "active");
                doc.set_attribute(question, "aria-expanded", "true");
            }
        }
        items.len()
    }

    /// The FAQ question containing `target`, if any.
    pub fn question_for(&self, target: NodeId) -> Option<NodeId> {
        let doc = self.doc.lock();
        let question = doc.closest(target, QUESTION_SELECTOR)?;
        doc.closest(question, ITEM_SELECTOR)?;
        Some(question)
    }

    /// Toggle the item owning `question`, closing every other item. Opening an
    /// item reports a `faq_view`.
    pub fn toggle(&self, question: NodeId) {
        let event = {
            let mut doc = self.doc.lock();
            let Some(item) = doc.closest(question, ITEM_SELECTOR) else {
                return;
            };
            let items = doc.query_selector_all(ITEM_SELECTOR);
            let was_active = doc.has_class(item, "active");

            let event = if was_active {
                None
            } else {
                let text = doc
                    .query_selector_within(question, "span")
                    .map(|span| doc.text_content(span))
                    .unwrap_or_default();
                let index = items.iter().position(|&i| i == item).map_or(0, |i| i + 1);
                Some(events::faq_view(&text, index))
            };

            for &other in items.iter().filter(|&&other| other != item) {
                doc.remove_class(other, "active");
                if let Some(other_question) = doc.query_selector_within(other, QUESTION_SELECTOR) {
                    doc.set_attribute(other_question, "aria-expanded", "false");
                }
            }

            if was_active {
                doc.remove_class(item, "active");
                doc.set_attribute(question, "aria-expanded", "false");
            } else {
                doc.add_class(item, "active");
                doc.set_attribute(question, "aria-expanded", "true");
            }
            event
        };

        if let Some(event) = event {
            self.analytics.track_event(&event.name, event.params);
        }
    }

    /// Enter and Space on a question act like a click. Returns whether the key
    /// was handled.
    pub fn key(&self, target: NodeId, key: &str) -> bool {
        if key != "Enter" && key != " " {
            return false;
        }
        match self.question_for(target) {
            Some(question) => {
                self.toggle(question);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::EventParams;
    use crate::dom::{self, Document};
    use parking_lot::Mutex;
    use reqwest::Url;

    const FAQ: &str = r#"<div class="faq-list">
<div class="faq-item"><button class="faq-question"><span>Radno vreme?</span><i></i></button><div class="faq-answer">8-24</div></div>
<div class="faq-item"><button class="faq-question"><span>Parking?</span></button><div class="faq-answer">Da</div></div>
<div class="faq-item"><button class="faq-question"><span>Rezervacije?</span></button></div>
</div>"#;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, EventParams)>>);

    impl AnalyticsHandle for Recording {
        fn init(&self) {}
        fn track_event(&self, name: &str, params: EventParams) {
            self.0.lock().push((name.to_string(), params));
        }
    }

    fn fixture() -> (Faq, SharedDocument, Arc<Recording>) {
        let doc = dom::shared(Document::parse(
            FAQ,
            Url::parse("https://caffeart.rs/faq").unwrap(),
        ));
        let analytics = Arc::new(Recording::default());
        (Faq::new(Arc::clone(&doc), analytics.clone()), doc, analytics)
    }

    fn active_items(doc: &SharedDocument) -> Vec<usize> {
        let doc = doc.lock();
        doc.query_selector_all(".faq-item")
            .into_iter()
            .enumerate()
            .filter(|(_, id)| doc.has_class(*id, "active"))
            .map(|(i, _)| i)
            .collect()
    }

    fn question(doc: &SharedDocument, index: usize) -> NodeId {
        doc.lock().query_selector_all(".faq-question")[index]
    }

    #[test]
    fn test_init_opens_first_item() {
        let (faq, doc, _) = fixture();
        assert_eq!(faq.init(), 3);
        assert_eq!(active_items(&doc), vec![0]);

        let q = question(&doc, 0);
        assert_eq!(doc.lock().attribute(q, "aria-expanded"), Some("true"));
    }

    #[test]
    fn test_opening_closes_others_and_tracks() {
        let (faq, doc, analytics) = fixture();
        faq.init();

        faq.toggle(question(&doc, 1));

        assert_eq!(active_items(&doc), vec![1]);
        let first = question(&doc, 0);
        assert_eq!(doc.lock().attribute(first, "aria-expanded"), Some("false"));

        let events = analytics.0.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "faq_view");
        assert_eq!(events[0].1["question"], "Parking?");
        assert_eq!(events[0].1["question_index"], 2);
        assert_eq!(events[0].1["event_category"], "FAQ");
    }

    #[test]
    fn test_closing_active_item_does_not_track() {
        let (faq, doc, analytics) = fixture();
        faq.init();

        faq.toggle(question(&doc, 0));

        assert!(active_items(&doc).is_empty());
        assert!(analytics.0.lock().is_empty());
    }

    #[test]
    fn test_question_lookup_from_inner_element() {
        let (faq, doc, _) = fixture();
        let span = doc.lock().query_selector(".faq-question span").unwrap();
        assert_eq!(faq.question_for(span), Some(question(&doc, 0)));

        let answer = doc.lock().query_selector(".faq-answer").unwrap();
        assert_eq!(faq.question_for(answer), None);
    }

    #[test]
    fn test_keyboard_toggle() {
        let (faq, doc, analytics) = fixture();
        faq.init();

        assert!(!faq.key(question(&doc, 2), "Tab"));
        assert!(faq.key(question(&doc, 2), " "));
        assert_eq!(active_items(&doc), vec![2]);
        assert!(faq.key(question(&doc, 2), "Enter"));
        assert!(active_items(&doc).is_empty());
        assert_eq!(analytics.0.lock().len(), 1);
    }

    #[test]
    fn test_page_without_faq() {
        let doc = dom::shared(Document::parse(
            "<p>Početna</p>",
            Url::parse("https://caffeart.rs/").unwrap(),
        ));
        let faq = Faq::new(doc, Arc::new(crate::consent::NoopAnalytics));
        assert_eq!(faq.init(), 0);
    }
}
