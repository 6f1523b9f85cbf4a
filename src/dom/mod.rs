//! In-memory page model.
//!
//! The site scripts only ever touch the page through a handful of DOM calls:
//! selector queries, attributes, classes, inline styles, text and markup
//! replacement, plus the window's location and scroll state. This module
//! provides exactly that surface so every component can run (and be tested)
//! without a browser.
//!
//! - `document`: the element arena and window state
//! - `parse`: tolerant HTML fragment parsing and serialization helpers
//! - `selector`: the CSS selector subset used by the site

mod document;
mod parse;
mod selector;

use parking_lot::Mutex;
use std::sync::Arc;

pub use document::{Document, NodeId};
pub use selector::{Selector, SelectorError};

/// The page shared between all components of one page view.
pub type SharedDocument = Arc<Mutex<Document>>;

pub fn shared(document: Document) -> SharedDocument {
    Arc::new(Mutex::new(document))
}
