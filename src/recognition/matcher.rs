//! Template matcher contract
//!
//! The pixel-level matching algorithm lives outside this crate. Callers hand a
//! screenshot and a template to an [`ImageMatcher`] and get back the best
//! location it found under the currently selected [`RecognitionMode`].

use std::ops::{Deref, DerefMut};

use super::types::{Image, Match, RecognitionMode};

/// Template matching backend
pub trait ImageMatcher {
    /// Currently selected recognition mode
    fn mode(&self) -> RecognitionMode;

    /// Select the recognition mode used by subsequent searches
    fn set_mode(&mut self, mode: RecognitionMode);

    /// Best match of `template` inside `screenshot`, if any
    fn find_image(&mut self, screenshot: &Image, template: &Image) -> Option<Match>;
}

/// Scope guard that restores the matcher's recognition mode when dropped.
pub struct ModeGuard<'a> {
    matcher: &'a mut dyn ImageMatcher,
    saved: RecognitionMode,
}

impl<'a> ModeGuard<'a> {
    pub fn new(matcher: &'a mut dyn ImageMatcher) -> Self {
        let saved = matcher.mode();
        Self { matcher, saved }
    }

    /// Mode that will be restored on drop
    pub fn saved_mode(&self) -> RecognitionMode {
        self.saved
    }
}

impl<'a> Deref for ModeGuard<'a> {
    type Target = dyn ImageMatcher + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.matcher
    }
}

impl<'a> DerefMut for ModeGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.matcher
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        self.matcher.set_mode(self.saved);
    }
}
