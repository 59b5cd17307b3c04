//! Point text geometry.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Average glyph advance as a fraction of the font size.
const CHAR_WIDTH_FACTOR: f64 = 0.55;
/// Line height as a fraction of the font size.
const LINE_HEIGHT_FACTOR: f64 = 1.2;
/// Distance from the top of a line to its baseline, as a fraction of the font size.
const ASCENT_FACTOR: f64 = 0.8;
/// Width reserved for empty or very short text so it stays clickable.
const MIN_WIDTH: f64 = 20.0;

/// A text item anchored at its first baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    /// Left end of the first baseline.
    pub position: Point,
    pub content: String,
    pub font_size: f64,
}

impl TextData {
    pub const DEFAULT_FONT_SIZE: f64 = 20.0;

    pub fn new(position: Point, content: impl Into<String>) -> Self {
        Self {
            position,
            content: content.into(),
            font_size: Self::DEFAULT_FONT_SIZE,
        }
    }

    /// Approximate width from the widest line.
    fn approximate_width(&self) -> f64 {
        let max_line_len = self
            .content
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        (max_line_len as f64 * self.font_size * CHAR_WIDTH_FACTOR).max(MIN_WIDTH)
    }

    /// Approximate height based on font size and number of lines.
    fn approximate_height(&self) -> f64 {
        let line_count = self.content.lines().count().max(1);
        let line_count = if self.content.ends_with('\n') {
            line_count + 1
        } else {
            line_count
        };
        line_count as f64 * self.font_size * LINE_HEIGHT_FACTOR
    }

    pub fn bounds(&self) -> Rect {
        let top = self.position.y - self.font_size * ASCENT_FACTOR;
        Rect::new(
            self.position.x,
            top,
            self.position.x + self.approximate_width(),
            top + self.approximate_height(),
        )
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }
}
