//! Consent-gated analytics.
//!
//! - `events`: event parameter shapes and scroll-depth bookkeeping
//! - `tag`: commands for the third-party tag pipeline and where they go
//! - `tracker`: queueing, initialization and automatic click/scroll tracking

pub mod events;
mod tag;
mod tracker;

pub use events::{EventParams, ScrollDepth, TrackingEvent, SCROLL_THRESHOLDS};
pub use tag::{DataLayer, LogSink, TagCommand, TagSink};
pub use tracker::Tracker;
