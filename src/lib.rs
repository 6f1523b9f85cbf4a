//! Client-side runtime for the Caffe Art café site.
//!
//! Every page view boots the same set of components against an in-memory
//! page model: shared templates, the Serbian/English translation engine,
//! consent-gated analytics, the drinks menu, the FAQ accordion and the
//! loading screen. [`bootstrap::Page`] wires them together.

pub mod analytics;
pub mod bootstrap;
pub mod config;
pub mod consent;
pub mod dom;
pub mod faq;
pub mod fetch;
pub mod i18n;
pub mod loading;
pub mod menu;
pub mod storage;
pub mod utils;

pub use bootstrap::{Page, TemplateReport};
pub use config::SiteConfig;
