//! External collaborators
//!
//! Everything the engine needs from the outside world, bundled so traversal,
//! execution and recording share one set of handles.

use crate::action::InputInjector;
use crate::recognition::{Image, ImageMatcher, Rect, TemplateStore};
use crate::time::Sleeper;
use crate::Result;

pub struct Backends {
    pub matcher: Box<dyn ImageMatcher>,
    pub injector: Box<dyn InputInjector>,
    pub templates: Box<dyn TemplateStore>,
    pub sleeper: Box<dyn Sleeper>,
    /// Captured screen area in absolute coordinates. Widget rectangles are
    /// relative to its origin.
    pub screen: Rect,
}

impl Backends {
    pub fn new(
        matcher: Box<dyn ImageMatcher>,
        injector: Box<dyn InputInjector>,
        templates: Box<dyn TemplateStore>,
        sleeper: Box<dyn Sleeper>,
        screen: Rect,
    ) -> Self {
        Self {
            matcher,
            injector,
            templates,
            sleeper,
            screen,
        }
    }

    /// Fresh screenshot of the selected screen area
    pub fn capture(&mut self) -> Result<Image> {
        self.injector.capture_screen(self.screen)
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("screen", &self.screen)
            .finish_non_exhaustive()
    }
}
