//! Dragging the control points or the body of the editable path.

use crate::canvas::Canvas;
use crate::scene::{ItemId, PathData, SceneError};
use crate::selection::CursorStyle;
use crate::session::{SessionKind, SessionSlot, SessionTag};
use kurbo::{Point, Rect};

#[derive(Debug, Clone)]
pub enum PathSession {
    SegmentDrag {
        path: ItemId,
        segment: usize,
        start: Point,
        original: PathData,
    },
    PathDrag {
        path: ItemId,
        start: Point,
        original: PathData,
    },
}

impl SessionTag for PathSession {
    fn kind(&self) -> SessionKind {
        match self {
            PathSession::SegmentDrag { .. } => SessionKind::SegmentDrag,
            PathSession::PathDrag { .. } => SessionKind::PathDrag,
        }
    }
}

/// What a pointer-down on the editable path grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClaim {
    Segment { path: ItemId, index: usize },
    Body { path: ItemId },
}

#[derive(Debug, Default)]
pub struct PathEditor {
    session: SessionSlot<PathSession>,
}

impl PathEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_open()
    }

    /// Claim the pointer if it lands on a control point or the stroke of the
    /// editable path.
    pub fn pointer_down(&mut self, canvas: &Canvas, point: Point) -> Option<PathClaim> {
        let (path_id, path, width) = editable_path(canvas)?;

        let segment_tol = canvas.tolerance(canvas.config.segment_tolerance);
        let (claim, session) = match segment_at(&path, point, segment_tol) {
            Some(index) => (
                PathClaim::Segment {
                    path: path_id,
                    index,
                },
                PathSession::SegmentDrag {
                    path: path_id,
                    segment: index,
                    start: point,
                    original: path,
                },
            ),
            None => {
                let stroke_tol = canvas.tolerance(canvas.config.stroke_tolerance);
                if path.stroke_distance(point) > stroke_tol + width / 2.0 {
                    return None;
                }
                (
                    PathClaim::Body { path: path_id },
                    PathSession::PathDrag {
                        path: path_id,
                        start: point,
                        original: path,
                    },
                )
            }
        };

        match self.session.open(session) {
            Ok(_) => Some(claim),
            Err(e) => {
                log::warn!("Path edit not started: {e}");
                None
            }
        }
    }

    /// Apply a drag. With `shift`, dragging a rectangle corner scales the
    /// rectangle uniformly about its center.
    pub fn pointer_move(&mut self, canvas: &mut Canvas, point: Point, shift: bool) -> bool {
        let (path_id, updated) = match self.session.get() {
            None => return false,
            Some(PathSession::SegmentDrag {
                path,
                segment,
                start,
                original,
            }) => {
                let updated = if shift && original.is_rectangle() {
                    scale_rectangle(original, *start, point)
                } else {
                    let mut moved = original.clone();
                    match moved.segments.get_mut(*segment) {
                        Some(p) => {
                            *p = point;
                            Some(moved)
                        }
                        None => None,
                    }
                };
                (*path, updated)
            }
            Some(PathSession::PathDrag {
                path,
                start,
                original,
            }) => {
                let mut moved = original.clone();
                moved.translate(point - *start);
                (*path, Some(moved))
            }
        };

        let Some(updated) = updated else {
            return false;
        };
        match write_path(canvas, path_id, updated) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Abandoning path edit: {e}");
                self.session.close();
                false
            }
        }
    }

    pub fn pointer_up(&mut self) -> Option<SessionKind> {
        self.session.close().map(|s| s.kind())
    }

    /// Abort the drag and restore the path as it was at pointer-down.
    pub fn cancel(&mut self, canvas: &mut Canvas) -> bool {
        let Some(session) = self.session.close() else {
            return false;
        };
        let (path, original) = match session {
            PathSession::SegmentDrag { path, original, .. } => (path, original),
            PathSession::PathDrag { path, original, .. } => (path, original),
        };
        if let Err(e) = write_path(canvas, path, original) {
            log::debug!("Path gone before cancel: {e}");
        }
        true
    }

    /// Hover cursor over the editable path.
    pub fn cursor_hint(&self, canvas: &Canvas, point: Point) -> Option<CursorStyle> {
        let (_, path, width) = editable_path(canvas)?;
        if segment_at(&path, point, canvas.tolerance(canvas.config.segment_tolerance)).is_some() {
            return Some(CursorStyle::Crosshair);
        }
        let stroke_tol = canvas.tolerance(canvas.config.stroke_tolerance);
        (path.stroke_distance(point) <= stroke_tol + width / 2.0).then_some(CursorStyle::Move)
    }
}

fn editable_path(canvas: &Canvas) -> Option<(ItemId, PathData, f64)> {
    let id = canvas.selection.editable_path?;
    let item = canvas.scene.get(id)?;
    Some((id, item.path()?.clone(), item.style.stroke_width))
}

/// Index of the first control point within `tolerance` of `point`.
fn segment_at(path: &PathData, point: Point, tolerance: f64) -> Option<usize> {
    path.segments
        .iter()
        .position(|p| p.distance(point) <= tolerance)
}

fn write_path(canvas: &mut Canvas, id: ItemId, path: PathData) -> Result<(), SceneError> {
    let item = canvas.scene.get_mut(id).ok_or(SceneError::UnknownItem(id))?;
    let target = item
        .path_mut()
        .ok_or(SceneError::WrongGeometry(id, "path"))?;
    *target = path;
    Ok(())
}

/// Scale a rectangle path about its center by how far the pointer moved
/// away from (or towards) the center since the drag started.
fn scale_rectangle(original: &PathData, start: Point, current: Point) -> Option<PathData> {
    let bounds = original.bounds();
    let center = bounds.center();
    let start_dist = center.distance(start);
    if start_dist < f64::EPSILON {
        return None;
    }
    let factor = center.distance(current) / start_dist;
    let half_w = bounds.width() / 2.0 * factor;
    let half_h = bounds.height() / 2.0 * factor;
    let mut scaled = original.clone();
    scaled.set_rect(Rect::new(
        center.x - half_w,
        center.y - half_h,
        center.x + half_w,
        center.y + half_h,
    ));
    Some(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas_with_rect(rect: Rect) -> (Canvas, ItemId) {
        let mut canvas = Canvas::default();
        let id = canvas.add_path(PathData::rectangle(rect)).unwrap();
        canvas.select_path(id, true);
        (canvas, id)
    }

    #[test]
    fn test_segment_drag_moves_one_point() {
        let (mut canvas, id) = canvas_with_rect(Rect::new(0.0, 0.0, 100.0, 50.0));
        let mut editor = PathEditor::new();
        let claim = editor.pointer_down(&canvas, Point::new(101.0, 1.0)).unwrap();
        assert_eq!(claim, PathClaim::Segment { path: id, index: 1 });

        assert!(editor.pointer_move(&mut canvas, Point::new(120.0, -10.0), false));
        let path = canvas.scene.get(id).unwrap().path().unwrap().clone();
        assert_eq!(path.segments[1], Point::new(120.0, -10.0));
        assert_eq!(path.segments[0], Point::new(0.0, 0.0));
        assert_eq!(editor.pointer_up(), Some(SessionKind::SegmentDrag));
    }

    #[test]
    fn test_shift_corner_drag_scales_about_center() {
        let (mut canvas, id) = canvas_with_rect(Rect::new(0.0, 0.0, 100.0, 50.0));
        let mut editor = PathEditor::new();
        editor.pointer_down(&canvas, Point::new(100.0, 50.0)).unwrap();
        // Twice as far from the center (50, 25) as the starting corner.
        assert!(editor.pointer_move(&mut canvas, Point::new(150.0, 75.0), true));

        let path = canvas.scene.get(id).unwrap().path().unwrap().clone();
        assert_eq!(path.segments.len(), 4);
        assert!(path.is_rectangle());
        let bounds = path.bounds();
        assert!((bounds.center().x - 50.0).abs() < 1e-9);
        assert!((bounds.center().y - 25.0).abs() < 1e-9);
        assert!((bounds.width() - 200.0).abs() < 1e-9);
        assert!((bounds.height() - 100.0).abs() < 1e-9);
        // The dragged corner is still the bottom-right segment.
        assert!((path.segments[2].x - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_body_drag_translates() {
        let (mut canvas, id) = canvas_with_rect(Rect::new(0.0, 0.0, 100.0, 50.0));
        let mut editor = PathEditor::new();
        let claim = editor.pointer_down(&canvas, Point::new(50.0, 1.0)).unwrap();
        assert_eq!(claim, PathClaim::Body { path: id });
        editor.pointer_move(&mut canvas, Point::new(60.0, 11.0), false);
        editor.pointer_move(&mut canvas, Point::new(70.0, 21.0), false);
        let bounds = canvas.scene.get(id).unwrap().path().unwrap().bounds();
        assert_eq!(bounds, Rect::new(20.0, 20.0, 120.0, 70.0));
    }

    #[test]
    fn test_no_claim_off_path() {
        let (canvas, _) = canvas_with_rect(Rect::new(0.0, 0.0, 100.0, 50.0));
        let mut editor = PathEditor::new();
        assert!(editor.pointer_down(&canvas, Point::new(50.0, 25.0)).is_none());
        assert!(!editor.is_active());
    }

    #[test]
    fn test_deleted_path_abandons_session() {
        let (mut canvas, id) = canvas_with_rect(Rect::new(0.0, 0.0, 100.0, 50.0));
        let mut editor = PathEditor::new();
        editor.pointer_down(&canvas, Point::new(0.0, 0.0)).unwrap();
        canvas.scene.remove(id).unwrap();
        assert!(!editor.pointer_move(&mut canvas, Point::new(5.0, 5.0), false));
        assert!(!editor.is_active());
    }

    #[test]
    fn test_cancel_restores_original() {
        let (mut canvas, id) = canvas_with_rect(Rect::new(0.0, 0.0, 100.0, 50.0));
        let before = canvas.scene.get(id).unwrap().path().unwrap().clone();
        let mut editor = PathEditor::new();
        editor.pointer_down(&canvas, Point::new(0.0, 0.0)).unwrap();
        editor.pointer_move(&mut canvas, Point::new(-40.0, -40.0), false);
        assert!(editor.cancel(&mut canvas));
        assert_eq!(canvas.scene.get(id).unwrap().path().unwrap(), &before);
    }
}
