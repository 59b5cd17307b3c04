//! Tool modes and the drawing tools.

use crate::canvas::Canvas;
use crate::scene::{
    Geometry, HelperKind, ItemId, ItemKind, ItemSpec, ItemStyle, PathData, PlaceholderKind,
    SceneError,
};
use crate::session::{SessionKind, SessionSlot, SessionTag};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Available tool modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ToolMode {
    #[default]
    Select,
    Free,
    Line,
    Rect,
    Circle,
    Image,
    QuickImage,
    #[serde(rename = "3d-model")]
    Model3d,
    Text,
}

impl ToolMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolMode::Select => "select",
            ToolMode::Free => "free",
            ToolMode::Line => "line",
            ToolMode::Rect => "rect",
            ToolMode::Circle => "circle",
            ToolMode::Image => "image",
            ToolMode::QuickImage => "quick-image",
            ToolMode::Model3d => "3d-model",
            ToolMode::Text => "text",
        }
    }

    /// Modes whose pointer gestures go to the [`DrawTool`].
    pub fn is_drawing(&self) -> bool {
        matches!(
            self,
            ToolMode::Free
                | ToolMode::Line
                | ToolMode::Rect
                | ToolMode::Circle
                | ToolMode::Image
                | ToolMode::Model3d
        )
    }
}

impl fmt::Display for ToolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "select" => ToolMode::Select,
            "free" => ToolMode::Free,
            "line" => ToolMode::Line,
            "rect" => ToolMode::Rect,
            "circle" => ToolMode::Circle,
            "image" => ToolMode::Image,
            "quick-image" => ToolMode::QuickImage,
            "3d-model" => ToolMode::Model3d,
            "text" => ToolMode::Text,
            other => return Err(format!("unknown tool mode: {other}")),
        })
    }
}

/// Shape being dragged out by a drawing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeShape {
    Free,
    Rect,
    Circle,
}

/// State of a drawing interaction.
#[derive(Debug, Clone)]
pub enum DrawSession {
    Stroke {
        shape: StrokeShape,
        item: ItemId,
        start: Point,
    },
    /// Line drag; the path only exists once the pointer passed the threshold.
    Line { start: Point, item: Option<ItemId> },
    /// Placeholder region with a preview rectangle.
    Region {
        kind: PlaceholderKind,
        start: Point,
        preview: Option<ItemId>,
    },
}

impl SessionTag for DrawSession {
    fn kind(&self) -> SessionKind {
        SessionKind::Draw
    }
}

/// What a finished drawing gesture produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawResult {
    Path(ItemId),
    Placeholder(ItemId),
    /// A click without drag in line mode; the next click finishes the line.
    LinePending(ItemId),
    /// Degenerate shape, dropped.
    Discarded,
}

/// Drawing tools for free, line, rect, circle and placeholder regions.
#[derive(Debug, Default)]
pub struct DrawTool {
    session: SessionSlot<DrawSession>,
    /// Two-click line waiting for its end point.
    pending_line: Option<ItemId>,
}

impl DrawTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_open()
    }

    pub fn pending_line(&self) -> Option<ItemId> {
        self.pending_line
    }

    /// Begin a drawing interaction.
    pub fn pointer_down(
        &mut self,
        canvas: &mut Canvas,
        mode: ToolMode,
        point: Point,
    ) -> Result<Option<DrawResult>, SceneError> {
        if mode == ToolMode::Line {
            if let Some(pending) = self.pending_line.take() {
                set_last_point(canvas, pending, point)?;
                return Ok(Some(finish_path(canvas, pending)));
            }
        }

        let session = match mode {
            ToolMode::Free => DrawSession::Stroke {
                shape: StrokeShape::Free,
                item: canvas.add_path(PathData::polyline(vec![point]))?,
                start: point,
            },
            ToolMode::Rect => DrawSession::Stroke {
                shape: StrokeShape::Rect,
                item: canvas.add_path(PathData::rectangle(Rect::from_points(point, point)))?,
                start: point,
            },
            ToolMode::Circle => DrawSession::Stroke {
                shape: StrokeShape::Circle,
                item: canvas.add_path(PathData::ellipse(Rect::from_points(point, point)))?,
                start: point,
            },
            ToolMode::Line => DrawSession::Line {
                start: point,
                item: None,
            },
            ToolMode::Image | ToolMode::Model3d => {
                let kind = if mode == ToolMode::Image {
                    PlaceholderKind::Image
                } else {
                    PlaceholderKind::Model3d
                };
                let preview = canvas.add_item(
                    ItemSpec::new(
                        ItemKind::Helper(HelperKind::SelectionArea),
                        Geometry::Frame(Rect::from_points(point, point)),
                    )
                    .with_style(ItemStyle::outline()),
                )?;
                DrawSession::Region {
                    kind,
                    start: point,
                    preview: Some(preview),
                }
            }
            ToolMode::Select | ToolMode::QuickImage | ToolMode::Text => return Ok(None),
        };

        if let Err(e) = self.session.open(session) {
            log::warn!("Drawing not started: {e}");
        }
        Ok(None)
    }

    /// Update the shape being drawn. Returns whether the scene changed.
    pub fn pointer_move(&mut self, canvas: &mut Canvas, point: Point) -> bool {
        let threshold = canvas.tolerance(canvas.config.drag_threshold);
        let result = match self.session.get_mut() {
            None => match self.pending_line {
                Some(pending) => set_last_point(canvas, pending, point),
                None => return false,
            },
            Some(DrawSession::Stroke { shape, item, start }) => {
                let (shape, start) = (*shape, *start);
                update_path(canvas, *item, |path| match shape {
                    StrokeShape::Free => {
                        if path.segments.last() != Some(&point) {
                            path.segments.push(point);
                        }
                    }
                    StrokeShape::Rect => *path = PathData::rectangle(Rect::from_points(start, point)),
                    StrokeShape::Circle => *path = PathData::ellipse(Rect::from_points(start, point)),
                })
            }
            Some(DrawSession::Line { start, item }) => {
                if let Some(id) = *item {
                    set_last_point(canvas, id, point)
                } else if start.distance(point) >= threshold {
                    canvas
                        .add_path(PathData::polyline(vec![*start, point]))
                        .map(|id| *item = Some(id))
                } else {
                    return false;
                }
            }
            Some(DrawSession::Region { start, preview, .. }) => {
                let rect = Rect::from_points(*start, point);
                if let Some(helper) = preview.and_then(|id| canvas.scene.get_mut(id)) {
                    helper.geometry = Geometry::Frame(rect);
                }
                Ok(())
            }
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Abandoning drawing: {e}");
                self.session.close();
                self.pending_line = None;
                false
            }
        }
    }

    /// Finish the gesture. Degenerate shapes are removed.
    pub fn pointer_up(&mut self, canvas: &mut Canvas, point: Point) -> Option<DrawResult> {
        let session = self.session.close()?;
        let result = match session {
            DrawSession::Stroke { item, .. } => finish_path(canvas, item),
            DrawSession::Line { item: Some(item), .. } => finish_path(canvas, item),
            DrawSession::Line { start, item: None } => {
                match canvas.add_path(PathData::polyline(vec![start, start])) {
                    Ok(id) => {
                        if let Some(preview) = canvas.scene.get_mut(id) {
                            preview.transient = true;
                        }
                        self.pending_line = Some(id);
                        DrawResult::LinePending(id)
                    }
                    Err(e) => {
                        log::warn!("Could not start two-click line: {e}");
                        DrawResult::Discarded
                    }
                }
            }
            DrawSession::Region {
                kind,
                start,
                preview,
            } => {
                if let Some(id) = preview {
                    discard(canvas, id);
                }
                let rect = Rect::from_points(start, point);
                if rect.width() < 1.0 || rect.height() < 1.0 {
                    DrawResult::Discarded
                } else {
                    match canvas.add_placeholder(kind, rect) {
                        Ok(id) => DrawResult::Placeholder(id),
                        Err(e) => {
                            log::warn!("Could not add placeholder: {e}");
                            DrawResult::Discarded
                        }
                    }
                }
            }
        };
        Some(result)
    }

    /// Drop the in-progress shape and any pending line.
    pub fn cancel(&mut self, canvas: &mut Canvas) -> bool {
        let mut cancelled = false;
        if let Some(session) = self.session.close() {
            let item = match session {
                DrawSession::Stroke { item, .. } => Some(item),
                DrawSession::Line { item, .. } => item,
                DrawSession::Region { preview, .. } => preview,
            };
            if let Some(id) = item {
                discard(canvas, id);
            }
            cancelled = true;
        }
        if let Some(pending) = self.pending_line.take() {
            discard(canvas, pending);
            cancelled = true;
        }
        cancelled
    }

    /// Settle a pending two-click line (on mode change).
    pub fn settle_pending(&mut self, canvas: &mut Canvas) -> Option<DrawResult> {
        self.pending_line.take().map(|id| finish_path(canvas, id))
    }
}

fn update_path(
    canvas: &mut Canvas,
    id: ItemId,
    f: impl FnOnce(&mut PathData),
) -> Result<(), SceneError> {
    let path = canvas
        .scene
        .get_mut(id)
        .ok_or(SceneError::UnknownItem(id))?
        .path_mut()
        .ok_or(SceneError::WrongGeometry(id, "path"))?;
    f(path);
    Ok(())
}

fn set_last_point(canvas: &mut Canvas, id: ItemId, point: Point) -> Result<(), SceneError> {
    update_path(canvas, id, |path| {
        if let Some(last) = path.segments.last_mut() {
            *last = point;
        }
    })
}

/// Keep a drawn path unless it is too small to see.
fn finish_path(canvas: &mut Canvas, id: ItemId) -> DrawResult {
    let degenerate = match canvas.scene.get(id).and_then(|i| i.path()) {
        Some(path) if path.segments.len() < 2 => true,
        Some(path) if path.closed => {
            let bounds = path.bounds();
            bounds.width() < 1.0 || bounds.height() < 1.0
        }
        Some(path) => path.length() < 1.0,
        None => return DrawResult::Discarded,
    };
    if degenerate {
        log::debug!("Discarding degenerate path {id}");
        discard(canvas, id);
        return DrawResult::Discarded;
    }
    if let Some(item) = canvas.scene.get_mut(id) {
        item.transient = false;
    }
    DrawResult::Path(id)
}

fn discard(canvas: &mut Canvas, id: ItemId) {
    if let Err(e) = canvas.remove_item(id) {
        log::warn!("Could not remove drawing preview {id}: {e}");
    }
}
