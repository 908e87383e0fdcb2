//! Per-widget location
//!
//! A single resolution attempt: load the widget's template, run the mode
//! fallback once and apply the global threshold. Retrying is the caller's job.

use tracing::{debug, warn};

use super::matcher::ImageMatcher;
use super::strategy::RecognitionStrategy;
use super::templates::TemplateStore;
use super::types::{Image, Match, MatchThreshold};
use crate::graph::{Widget, WidgetStatus};

/// Resolves widgets against a screenshot
#[derive(Debug, Clone, Copy, Default)]
pub struct WidgetLocator {
    strategy: RecognitionStrategy,
    threshold: MatchThreshold,
}

impl WidgetLocator {
    pub fn new(threshold: MatchThreshold) -> Self {
        Self {
            strategy: RecognitionStrategy::new(),
            threshold,
        }
    }

    pub fn threshold(&self) -> MatchThreshold {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: MatchThreshold) {
        self.threshold = threshold;
    }

    pub fn strategy(&self) -> &RecognitionStrategy {
        &self.strategy
    }

    /// Search for an image and keep the result only if it clears the threshold.
    pub fn find_accepted(
        &self,
        matcher: &mut dyn ImageMatcher,
        template: &Image,
        screenshot: &Image,
    ) -> Option<Match> {
        let found = self.strategy.locate(matcher, template, screenshot)?;
        if self.threshold.accepts(&found) {
            Some(found)
        } else {
            debug!(
                percent = found.percent,
                threshold = self.threshold.percent(),
                "Match below threshold"
            );
            None
        }
    }

    /// Try to locate `widget` in `screenshot`, updating its status and rectangle.
    ///
    /// A template that cannot be loaded counts as not found.
    pub fn resolve(
        &self,
        matcher: &mut dyn ImageMatcher,
        templates: &dyn TemplateStore,
        widget: &mut Widget,
        screenshot: &Image,
    ) -> bool {
        let template = match templates.load(&widget.template) {
            Ok(Some(image)) => image,
            Ok(None) => {
                warn!(template = %widget.template, "Template missing");
                widget.status = WidgetStatus::Unlocated;
                return false;
            }
            Err(e) => {
                warn!(template = %widget.template, error = %e, "Template unreadable");
                widget.status = WidgetStatus::Unlocated;
                return false;
            }
        };

        match self.find_accepted(matcher, &template, screenshot) {
            Some(found) => {
                widget.mark_located(found.rect());
                true
            }
            None => {
                widget.status = WidgetStatus::Unlocated;
                false
            }
        }
    }
}
