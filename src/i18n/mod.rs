//! Internationalization (i18n) for the site's two display languages.
//!
//! # Architecture
//!
//! - `locale`: the closed set of supported locales and their persisted preference
//! - `tree`: a loaded translation document and dot-key resolution
//! - `engine`: loads documents, applies them to the page and switches language
//!
//! # Example
//!
//! ```rust,ignore
//! use caffe_art_site::i18n::{I18n, Locale};
//!
//! let i18n = I18n::new(doc, storage, fetcher, config);
//! i18n.init().await;
//! i18n.switch_language("en").await;
//! assert_eq!(i18n.current_language(), Locale::En);
//! ```

mod engine;
mod locale;
mod tree;

pub use engine::{
    I18n, LanguageObserver, LocaleSource, ATTR_ATTRIBUTE, LANGUAGE_CONTROLS, TEXT_ATTRIBUTE,
};
pub use locale::{Locale, LANG_STORAGE_KEY};
pub use tree::{parse_attr_pairs, TranslationTree};
