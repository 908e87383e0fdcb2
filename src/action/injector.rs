//! Input injection contract
//!
//! Native mouse, keyboard and screen capture primitives live outside this
//! crate. Failures are reported as [`Error::Collaborator`](crate::Error).

use serde::{Deserialize, Serialize};

use crate::recognition::{Image, Point, Rect};
use crate::Result;

/// Mouse buttons the executor presses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
}

/// Platform key code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u32);

/// Native input and screen capture backend
pub trait InputInjector {
    /// Move the cursor to an absolute screen position
    fn move_mouse_to(&mut self, point: Point) -> Result<()>;

    /// Current absolute cursor position
    fn cursor_position(&mut self) -> Result<Point>;

    fn press_button(&mut self, button: MouseButton) -> Result<()>;

    fn release_button(&mut self, button: MouseButton) -> Result<()>;

    fn press_key(&mut self, key: KeyCode) -> Result<()>;

    fn release_key(&mut self, key: KeyCode) -> Result<()>;

    /// Key code producing `ch`, if the keyboard layout has one
    fn key_code_for(&self, ch: char) -> Option<KeyCode>;

    /// Capture the given absolute screen area
    fn capture_screen(&mut self, area: Rect) -> Result<Image>;
}
