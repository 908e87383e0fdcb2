//! Action execution
//!
//! Performs a located widget's action through the [`InputInjector`]. The
//! cursor is put back where the user left it once the action is done.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::injector::{InputInjector, MouseButton};
use crate::backends::Backends;
use crate::graph::{Widget, WidgetAction};
use crate::recognition::{RecognitionMode, RecognitionStrategy, TemplateId};
use crate::Result;

/// Delays used while performing actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTiming {
    /// Gap between the clicks of a double or triple click
    pub double_click_gap: Duration,
    /// How long each key is held while typing
    pub key_hold: Duration,
    /// Wait between the first and second click of a menu action
    pub menu_second_click_delay: Duration,
}

impl Default for ActionTiming {
    fn default() -> Self {
        Self {
            double_click_gap: Duration::from_millis(100),
            key_hold: Duration::from_millis(50),
            menu_second_click_delay: Duration::from_millis(1500),
        }
    }
}

/// Performs widget actions
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionExecutor {
    timing: ActionTiming,
    strategy: RecognitionStrategy,
}

impl ActionExecutor {
    pub fn new(timing: ActionTiming) -> Self {
        Self {
            timing,
            strategy: RecognitionStrategy::new(),
        }
    }

    pub fn timing(&self) -> &ActionTiming {
        &self.timing
    }

    /// Perform `widget`'s action at the center of its last observed rectangle.
    pub fn execute(&self, backends: &mut Backends, widget: &Widget) -> Result<()> {
        if widget.is_check() {
            return Ok(());
        }

        let origin = backends.screen.origin();
        let restore = backends.injector.cursor_position()?;
        let target = widget.location.center().offset_by(origin);
        debug!(action = widget.action.label(), x = target.x, y = target.y, "Performing");
        backends.injector.move_mouse_to(target)?;

        match &widget.action {
            WidgetAction::LeftClick => click(backends.injector.as_mut(), MouseButton::Left)?,
            WidgetAction::RightClick => click(backends.injector.as_mut(), MouseButton::Right)?,
            WidgetAction::DoubleClick => self.left_clicks(backends, 2)?,
            WidgetAction::Type { text, clicks } => {
                self.left_clicks(backends, clicks.get())?;
                match text {
                    Some(text) => self.type_text(backends, text)?,
                    None => warn!(template = %widget.template, "Type widget has no text"),
                }
            }
            WidgetAction::TwoStepMenu { second_template } => {
                click(backends.injector.as_mut(), MouseButton::Left)?;
                self.second_click(backends, second_template.as_ref())?;
            }
            WidgetAction::Check => {}
        }

        backends.injector.move_mouse_to(restore)?;
        Ok(())
    }

    fn left_clicks(&self, backends: &mut Backends, count: u8) -> Result<()> {
        for i in 0..count {
            if i > 0 {
                backends.sleeper.sleep(self.timing.double_click_gap);
            }
            click(backends.injector.as_mut(), MouseButton::Left)?;
        }
        Ok(())
    }

    fn type_text(&self, backends: &mut Backends, text: &str) -> Result<()> {
        for ch in text.chars() {
            let Some(code) = backends.injector.key_code_for(ch) else {
                info!(?ch, "No key code, skipping character");
                continue;
            };
            backends.injector.press_key(code)?;
            backends.sleeper.sleep(self.timing.key_hold);
            backends.injector.release_key(code)?;
        }
        Ok(())
    }

    /// Second half of a menu action: find the menu entry and click it.
    ///
    /// Matched once in exact mode against a fresh capture.
    fn second_click(&self, backends: &mut Backends, template: Option<&TemplateId>) -> Result<()> {
        backends.sleeper.sleep(self.timing.menu_second_click_delay);

        let Some(id) = template else {
            info!("Menu action has no second template yet");
            return Ok(());
        };
        let image = match backends.templates.load(id) {
            Ok(Some(image)) => image,
            Ok(None) => {
                warn!(template = %id, "Second template missing");
                return Ok(());
            }
            Err(e) => {
                warn!(template = %id, error = %e, "Second template unreadable");
                return Ok(());
            }
        };

        let screenshot = backends.capture()?;
        let found = self.strategy.locate_with_mode(
            backends.matcher.as_mut(),
            RecognitionMode::Exact,
            &image,
            &screenshot,
        );

        match found {
            Some(m) => {
                let target = m.center().offset_by(backends.screen.origin());
                backends.injector.move_mouse_to(target)?;
                click(backends.injector.as_mut(), MouseButton::Left)
            }
            None => {
                info!(template = %id, "Second menu entry not found");
                Ok(())
            }
        }
    }
}

fn click(injector: &mut dyn InputInjector, button: MouseButton) -> Result<()> {
    injector.press_button(button)?;
    injector.release_button(button)
}
