//! Recognition mode fallback
//!
//! Widget presence is decided by trying the matcher in the fixed order
//! EXACT, COLOR, TOLERANT and keeping the first non-empty result. A weak EXACT
//! match is still the answer; weaker modes only run when EXACT finds nothing.

use tracing::{debug, info};

use super::matcher::{ImageMatcher, ModeGuard};
use super::types::{Image, Match, RecognitionMode};

/// Ordered multi-mode template search
#[derive(Debug, Clone, Copy, Default)]
pub struct RecognitionStrategy;

impl RecognitionStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Locate `template` in `screenshot`, falling back through every mode.
    ///
    /// The matcher's mode is restored before returning.
    pub fn locate(
        &self,
        matcher: &mut dyn ImageMatcher,
        template: &Image,
        screenshot: &Image,
    ) -> Option<Match> {
        let mut guard = ModeGuard::new(matcher);

        for mode in RecognitionMode::FALLBACK_ORDER {
            guard.set_mode(mode);
            if let Some(found) = guard.find_image(screenshot, template) {
                info!(?mode, percent = found.percent, "Template matched");
                return Some(found);
            }
            debug!(?mode, "No match");
        }

        None
    }

    /// Single search in one mode, no fallback.
    pub fn locate_with_mode(
        &self,
        matcher: &mut dyn ImageMatcher,
        mode: RecognitionMode,
        template: &Image,
        screenshot: &Image,
    ) -> Option<Match> {
        let mut guard = ModeGuard::new(matcher);
        guard.set_mode(mode);
        let found = guard.find_image(screenshot, template);
        if let Some(m) = &found {
            info!(?mode, percent = m.percent, "Template matched");
        }
        found
    }
}
