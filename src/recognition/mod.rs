//! Widget recognition
//!
//! - [`matcher`]: the external template matcher contract and mode scope guard
//! - [`strategy`]: EXACT → COLOR → TOLERANT fallback
//! - [`locator`]: one resolution attempt for one widget
//! - [`templates`]: template identifiers and storage

pub mod locator;
pub mod matcher;
pub mod strategy;
pub mod templates;
pub mod types;

pub use locator::WidgetLocator;
pub use matcher::{ImageMatcher, ModeGuard};
pub use strategy::RecognitionStrategy;
pub use templates::{subimage, DirTemplateStore, MemoryTemplateStore, TemplateId, TemplateStore};
pub use types::{Image, Match, MatchThreshold, Point, RecognitionMode, Rect};
