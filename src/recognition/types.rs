//! Core types for widget recognition
//!
//! Screen geometry, match results and the acceptance threshold shared by the
//! locator, the traversal engine and the session.

use serde::{Deserialize, Serialize};

/// Image type used for screenshots and templates
pub type Image = image::RgbaImage;

/// A point in screen (or screen-area) pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate by the origin of an enclosing area
    pub fn offset_by(self, origin: Point) -> Self {
        Self::new(self.x + origin.x, self.y + origin.y)
    }
}

/// Axis-aligned rectangle, top-left anchored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Build the rectangle spanned by two corner points.
    ///
    /// Degenerate spans are widened to one pixel so a selection is never empty.
    pub fn from_corners(a: Point, b: Point) -> Self {
        let width = a.x.abs_diff(b.x).max(1);
        let height = a.y.abs_diff(b.y).max(1);
        Self::new(a.x.min(b.x), a.y.min(b.y), width, height)
    }

    /// Rectangle of the given size centered on a point, clamped to the
    /// non-negative quadrant.
    pub fn centered_on(center: Point, width: u32, height: u32) -> Self {
        let x = (center.x as f32 - width as f32 / 2.0) as i32;
        let y = (center.y as f32 - height as f32 / 2.0) as i32;
        Self::new(x.max(0), y.max(0), width, height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x
            && p.y >= self.y
            && (p.x as i64) < self.x as i64 + self.width as i64
            && (p.y as i64) < self.y as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Recognition modes, cheapest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RecognitionMode {
    /// Exact pixel comparison
    #[default]
    Exact,
    /// Color-tolerant comparison
    Color,
    /// Broadly tolerant comparison
    Tolerant,
}

impl RecognitionMode {
    /// Fixed fallback order used when deciding widget presence
    pub const FALLBACK_ORDER: [RecognitionMode; 3] = [
        RecognitionMode::Exact,
        RecognitionMode::Color,
        RecognitionMode::Tolerant,
    ];
}

/// One located occurrence of a template image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Confidence in [0, 100]
    pub percent: u8,
}

impl Match {
    pub fn new(x: i32, y: i32, width: u32, height: u32, percent: u8) -> Self {
        Self {
            x,
            y,
            width,
            height,
            percent: percent.min(100),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn center(&self) -> Point {
        self.rect().center()
    }
}

/// Global minimum confidence a match needs to be accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchThreshold(u8);

impl MatchThreshold {
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    pub fn accepts(&self, m: &Match) -> bool {
        m.percent >= self.0
    }
}

impl Default for MatchThreshold {
    fn default() -> Self {
        Self(100)
    }
}
