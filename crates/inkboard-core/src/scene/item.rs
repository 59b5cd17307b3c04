//! Scene item definitions.

use super::path::PathData;
use super::text::TextData;
use kurbo::{Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an item in the scene arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Identifier of a layer inside one scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u32);

/// Corner positions of a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// The corner diagonal to this one.
    pub fn opposite(self) -> Self {
        match self {
            Corner::TopLeft => Corner::BottomRight,
            Corner::TopRight => Corner::BottomLeft,
            Corner::BottomLeft => Corner::TopRight,
            Corner::BottomRight => Corner::TopLeft,
        }
    }

    /// Position of this corner on `rect`.
    pub fn of(self, rect: Rect) -> Point {
        match self {
            Corner::TopLeft => Point::new(rect.x0, rect.y0),
            Corner::TopRight => Point::new(rect.x1, rect.y0),
            Corner::BottomLeft => Point::new(rect.x0, rect.y1),
            Corner::BottomRight => Point::new(rect.x1, rect.y1),
        }
    }

    /// Horizontal and vertical direction away from the opposite corner.
    pub fn signs(self) -> (f64, f64) {
        match self {
            Corner::TopLeft => (-1.0, -1.0),
            Corner::TopRight => (1.0, -1.0),
            Corner::BottomLeft => (-1.0, 1.0),
            Corner::BottomRight => (1.0, 1.0),
        }
    }

    /// Compass direction used by cursors and handle names.
    pub fn direction(self) -> &'static str {
        match self {
            Corner::TopLeft => "nw",
            Corner::TopRight => "ne",
            Corner::BottomLeft => "sw",
            Corner::BottomRight => "se",
        }
    }

    pub fn from_direction(direction: &str) -> Option<Self> {
        match direction {
            "nw" => Some(Corner::TopLeft),
            "ne" => Some(Corner::TopRight),
            "sw" => Some(Corner::BottomLeft),
            "se" => Some(Corner::BottomRight),
            _ => None,
        }
    }

    /// Which corner of `rect` the point `p` lies nearest to, judged from the center.
    pub fn classify(rect: Rect, p: Point) -> Self {
        let center = rect.center();
        match (p.x < center.x, p.y < center.y) {
            (true, true) => Corner::TopLeft,
            (false, true) => Corner::TopRight,
            (true, false) => Corner::BottomLeft,
            (false, false) => Corner::BottomRight,
        }
    }
}

/// Kind of asset a placeholder stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceholderKind {
    Image,
    Model3d,
}

/// Helper items are derived decorations; they are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HelperKind {
    ResizeHandle(Corner),
    SelectionBorder,
    SelectionArea,
}

/// Closed set of item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Drawing,
    Image,
    Model3d,
    Text,
    Placeholder(PlaceholderKind),
    Helper(HelperKind),
}

impl ItemKind {
    pub fn is_helper(&self) -> bool {
        matches!(self, ItemKind::Helper(_))
    }

    /// Tag string used in logs and notifications.
    pub fn tag(&self) -> &'static str {
        match self {
            ItemKind::Drawing => "drawing",
            ItemKind::Image => "image",
            ItemKind::Model3d => "3d-model",
            ItemKind::Text => "text",
            ItemKind::Placeholder(PlaceholderKind::Image) => "image-placeholder",
            ItemKind::Placeholder(PlaceholderKind::Model3d) => "3d-model-placeholder",
            ItemKind::Helper(_) => "selection-helper",
        }
    }
}

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    /// Accent used for selection decorations.
    pub fn accent() -> Self {
        Self::new(0, 153, 255, 255)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Style properties shared by all items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStyle {
    pub stroke_color: SerializableColor,
    pub stroke_width: f64,
    pub fill_color: Option<SerializableColor>,
    #[serde(default)]
    pub dashed: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl Default for ItemStyle {
    fn default() -> Self {
        Self {
            stroke_color: SerializableColor::black(),
            stroke_width: 2.0,
            fill_color: None,
            dashed: false,
            opacity: 1.0,
        }
    }
}

impl ItemStyle {
    /// Thin dashed outline used by helpers and placeholders.
    pub fn outline() -> Self {
        Self {
            stroke_color: SerializableColor::accent(),
            stroke_width: 1.0,
            dashed: true,
            ..Self::default()
        }
    }
}

/// Geometry carried by an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Path(PathData),
    /// Axis-aligned frame, used by images, models and handles.
    Frame(Rect),
    Text(TextData),
    /// Container whose bounds are the union of its children.
    Group,
}

/// Everything needed to insert a new item.
#[derive(Debug, Clone)]
pub struct ItemSpec {
    pub kind: ItemKind,
    pub geometry: Geometry,
    pub style: ItemStyle,
    pub correlation: Option<String>,
}

impl ItemSpec {
    pub fn new(kind: ItemKind, geometry: Geometry) -> Self {
        Self {
            kind,
            geometry,
            style: ItemStyle::default(),
            correlation: None,
        }
    }

    pub fn with_style(mut self, style: ItemStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_correlation(mut self, correlation: impl Into<String>) -> Self {
        self.correlation = Some(correlation.into());
        self
    }
}

/// A node in the scene arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub layer: LayerId,
    #[serde(default)]
    pub parent: Option<ItemId>,
    #[serde(default)]
    pub children: Vec<ItemId>,
    /// Stable id linking the item to non-graph records (image instances, text records).
    #[serde(default)]
    pub correlation: Option<String>,
    pub geometry: Geometry,
    pub style: ItemStyle,
    /// Show all control points (set while the path is the editable selection).
    #[serde(skip)]
    pub full_selected: bool,
    /// Stroke width before the selection highlight was applied.
    #[serde(skip)]
    pub highlight_base: Option<f64>,
    /// Opacity to show again once the text overlay closes.
    #[serde(skip)]
    pub edit_opacity: Option<f64>,
    /// Preview not yet part of the document (pending line, unsettled new text).
    #[serde(skip)]
    pub transient: bool,
}

impl SceneItem {
    pub fn path(&self) -> Option<&PathData> {
        match &self.geometry {
            Geometry::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn path_mut(&mut self) -> Option<&mut PathData> {
        match &mut self.geometry {
            Geometry::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&TextData> {
        match &self.geometry {
            Geometry::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn text_mut(&mut self) -> Option<&mut TextData> {
        match &mut self.geometry {
            Geometry::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Widen the stroke by one unit, remembering the original width.
    pub fn highlight(&mut self) {
        if self.highlight_base.is_none() {
            self.highlight_base = Some(self.style.stroke_width);
            self.style.stroke_width += 1.0;
        }
    }

    pub fn unhighlight(&mut self) {
        if let Some(width) = self.highlight_base.take() {
            self.style.stroke_width = width;
        }
    }

    /// Hide the item behind the text overlay, remembering its opacity.
    pub fn hide_for_edit(&mut self) {
        if self.edit_opacity.is_none() {
            self.edit_opacity = Some(self.style.opacity);
            self.style.opacity = 0.0;
        }
    }

    pub fn reveal(&mut self) {
        if let Some(opacity) = self.edit_opacity.take() {
            self.style.opacity = opacity;
        }
    }

    /// Copy of the item with selection and editing decorations stripped, as persisted.
    pub(crate) fn persisted(&self) -> SceneItem {
        let mut item = self.clone();
        item.unhighlight();
        item.reveal();
        item.full_selected = false;
        item.transient = false;
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_opposites() {
        for corner in Corner::ALL {
            assert_eq!(corner.opposite().opposite(), corner);
            let rect = Rect::new(0.0, 0.0, 10.0, 20.0);
            let p = corner.of(rect);
            let q = corner.opposite().of(rect);
            assert!((p.x - q.x).abs() > 0.0 && (p.y - q.y).abs() > 0.0);
        }
    }

    #[test]
    fn test_corner_directions() {
        for corner in Corner::ALL {
            assert_eq!(Corner::from_direction(corner.direction()), Some(corner));
        }
        assert_eq!(Corner::from_direction("n"), None);
    }

    #[test]
    fn test_classify_corner() {
        let rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(Corner::classify(rect, Point::new(1.0, 2.0)), Corner::TopLeft);
        assert_eq!(Corner::classify(rect, Point::new(99.0, 98.0)), Corner::BottomRight);
    }

    #[test]
    fn test_color_conversion() {
        let color = SerializableColor::new(255, 128, 64, 200);
        let peniko_color: Color = color.into();
        let back: SerializableColor = peniko_color.into();
        assert_eq!(color, back);
    }

    #[test]
    fn test_highlight_restores_width() {
        let mut item = SceneItem {
            id: ItemId(1),
            kind: ItemKind::Drawing,
            layer: LayerId(0),
            parent: None,
            children: Vec::new(),
            correlation: None,
            geometry: Geometry::Group,
            style: ItemStyle::default(),
            full_selected: false,
            highlight_base: None,
            edit_opacity: None,
            transient: false,
        };
        item.highlight();
        item.highlight();
        assert!((item.style.stroke_width - 3.0).abs() < f64::EPSILON);
        assert!((item.persisted().style.stroke_width - 2.0).abs() < f64::EPSILON);
        item.unhighlight();
        assert!((item.style.stroke_width - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_persisted_shows_item_hidden_for_edit() {
        let mut item = SceneItem {
            id: ItemId(2),
            kind: ItemKind::Text,
            layer: LayerId(0),
            parent: None,
            children: Vec::new(),
            correlation: None,
            geometry: Geometry::Text(TextData::new(Point::new(0.0, 0.0), "hello")),
            style: ItemStyle::default(),
            full_selected: false,
            highlight_base: None,
            edit_opacity: None,
            transient: false,
        };
        item.style.opacity = 0.8;
        item.hide_for_edit();
        item.hide_for_edit();
        assert_eq!(item.style.opacity, 0.0);
        assert_eq!(item.persisted().style.opacity, 0.8);
        assert_eq!(item.persisted().edit_opacity, None);
        item.reveal();
        assert_eq!(item.style.opacity, 0.8);
    }
}
