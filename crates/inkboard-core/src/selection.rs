//! Click selection, box selection, image drag and proportional resize.

use crate::assets::AssetKind;
use crate::canvas::Canvas;
use crate::scene::{
    Corner, GRID_LAYER, Geometry, HelperKind, HitOptions, ItemId, ItemKind, ItemSpec, ItemStyle,
    SceneGraph,
};
use crate::session::{SessionError, SessionKind, SessionSlot, SessionTag};
use kurbo::{Point, Rect, Vec2};

/// Current selection sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    /// Path that receives segment and body drags.
    pub editable_path: Option<ItemId>,
    /// All selected paths, including the editable one.
    pub paths: Vec<ItemId>,
    pub images: Vec<String>,
    pub models: Vec<String>,
    pub texts: Vec<String>,
}

impl SelectionState {
    pub fn is_empty(&self) -> bool {
        self.editable_path.is_none()
            && self.paths.is_empty()
            && self.images.is_empty()
            && self.models.is_empty()
            && self.texts.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Selected paths, editable one first, without duplicates.
    pub fn path_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.editable_path.into_iter().collect();
        for id in &self.paths {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    /// Drop every reference to a removed item. Returns whether anything changed.
    pub fn evict(&mut self, id: ItemId, correlation: Option<&str>) -> bool {
        let before = self.clone();
        if self.editable_path == Some(id) {
            self.editable_path = None;
        }
        self.paths.retain(|&p| p != id);
        if let Some(corr) = correlation {
            self.images.retain(|i| i != corr);
            self.models.retain(|m| m != corr);
            self.texts.retain(|t| t != corr);
        }
        *self != before
    }

    /// True when `asset_id` is the only thing selected.
    fn is_sole_asset(&self, asset_id: &str) -> bool {
        let assets = self.images.len() + self.models.len();
        assets == 1
            && self.paths.is_empty()
            && self.editable_path.is_none()
            && (self.images.iter().chain(self.models.iter())).any(|a| a == asset_id)
    }

    fn is_sole_path(&self, id: ItemId) -> bool {
        self.path_ids() == [id]
            && self.images.is_empty()
            && self.models.is_empty()
            && self.editable_path == Some(id)
    }
}

/// Pointer cursor requested by the interaction layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Default,
    Move,
    NwseResize,
    NeswResize,
    Crosshair,
    Text,
}

impl CursorStyle {
    pub fn for_corner(corner: Corner) -> Self {
        match corner {
            Corner::TopLeft | Corner::BottomRight => CursorStyle::NwseResize,
            Corner::TopRight | Corner::BottomLeft => CursorStyle::NeswResize,
        }
    }
}

/// Result of a select-mode click that reached the selection tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Image(String),
    Model(String),
    Path(ItemId),
    /// Empty space (or an unselectable path). Selection was cleared.
    Background { box_started: bool },
}

/// What a finished selection box picked up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxSelection {
    pub images: Vec<String>,
    pub models: Vec<String>,
    pub paths: Vec<ItemId>,
}

#[derive(Debug, Clone)]
pub enum SelectionSession {
    Move {
        start: Point,
        originals: Vec<(ItemId, Rect)>,
    },
    Resize {
        target: ItemId,
        corner: Corner,
        start_bounds: Rect,
    },
    SelectionBox {
        start: Point,
        current: Point,
        area: Option<ItemId>,
    },
}

impl SessionTag for SelectionSession {
    fn kind(&self) -> SessionKind {
        match self {
            SelectionSession::Move { .. } => SessionKind::Move,
            SelectionSession::Resize { corner, .. } => SessionKind::Resize(*corner),
            SelectionSession::SelectionBox { .. } => SessionKind::SelectionBox,
        }
    }
}

#[derive(Debug, Default)]
pub struct SelectionTool {
    session: SessionSlot<SelectionSession>,
}

impl SelectionTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_open()
    }

    pub fn session_kind(&self) -> Option<SessionKind> {
        self.session.kind()
    }

    /// Select-mode click after placeholder, handle and path-edit checks.
    pub fn handle_selection_click(
        &mut self,
        canvas: &mut Canvas,
        point: Point,
        additive: bool,
        allow_box: bool,
    ) -> ClickOutcome {
        for kind in [AssetKind::Image, AssetKind::Model3d] {
            if let Some(asset_id) = asset_under(canvas, point, kind) {
                click_asset(canvas, kind, &asset_id, additive);
                self.begin_move(canvas, point);
                return match kind {
                    AssetKind::Image => ClickOutcome::Image(asset_id),
                    AssetKind::Model3d => ClickOutcome::Model(asset_id),
                };
            }
        }

        let tol = canvas.tolerance(canvas.config.stroke_tolerance);
        let hit = canvas.scene.hit_test(point, HitOptions::stroke(tol).with_fill(), |item| {
            item.kind == ItemKind::Drawing
        });
        if let Some(hit) = hit {
            let on_grid = canvas.scene.layer_name_of(hit.item) == Some(GRID_LAYER);
            let in_placeholder = canvas.scene.placeholder_ancestor(hit.item).is_some();
            if !on_grid && !in_placeholder {
                if additive {
                    if canvas.selection.paths.contains(&hit.item) {
                        canvas.deselect_path(hit.item);
                    } else {
                        canvas.select_path(hit.item, false);
                    }
                } else if !canvas.selection.is_sole_path(hit.item) {
                    canvas.clear_selection();
                    canvas.select_path(hit.item, true);
                }
                return ClickOutcome::Path(hit.item);
            }
            log::debug!("Ignoring click on non-selectable path {}", hit.item);
        }

        canvas.clear_selection();
        let text_under = canvas
            .scene
            .hit_test(point, HitOptions::bounds(0.0), |item| item.kind == ItemKind::Text)
            .is_some();
        if text_under || !allow_box {
            return ClickOutcome::Background { box_started: false };
        }
        let box_started = match self.begin_selection_box(canvas, point) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not start selection box: {e}");
                false
            }
        };
        ClickOutcome::Background { box_started }
    }

    fn begin_move(&mut self, canvas: &Canvas, point: Point) {
        let originals: Vec<(ItemId, Rect)> = canvas
            .selection
            .images
            .iter()
            .chain(canvas.selection.models.iter())
            .filter_map(|asset_id| canvas.scene.find_by_correlation(asset_id))
            .filter_map(|id| canvas.scene.bounds(id).map(|b| (id, b)))
            .collect();
        if originals.is_empty() {
            return;
        }
        if let Err(e) = self.session.open(SelectionSession::Move {
            start: point,
            originals,
        }) {
            log::warn!("Could not start move: {e}");
        }
    }

    /// Start a proportional resize of an image or model from one of its handles.
    pub fn begin_resize(
        &mut self,
        canvas: &Canvas,
        target: ItemId,
        corner: Corner,
    ) -> Result<(), SessionError> {
        let Some(start_bounds) = canvas.scene.bounds(target) else {
            log::warn!("Resize target {target} has no bounds");
            return Ok(());
        };
        self.session.open(SelectionSession::Resize {
            target,
            corner,
            start_bounds,
        })?;
        Ok(())
    }

    fn begin_selection_box(&mut self, canvas: &mut Canvas, point: Point) -> Result<(), SessionError> {
        self.session.open(SelectionSession::SelectionBox {
            start: point,
            current: point,
            area: None,
        })?;
        let area = canvas.add_item(
            ItemSpec::new(
                ItemKind::Helper(HelperKind::SelectionArea),
                Geometry::Frame(Rect::from_points(point, point)),
            )
            .with_style(ItemStyle::outline()),
        );
        match (area, self.session.get_mut()) {
            (Ok(id), Some(SelectionSession::SelectionBox { area, .. })) => *area = Some(id),
            (Err(e), _) => log::warn!("Selection area not shown: {e}"),
            _ => {}
        }
        Ok(())
    }

    /// Apply a pointer move to the open session. Returns whether anything changed.
    pub fn update(&mut self, canvas: &mut Canvas, point: Point) -> bool {
        let result = match self.session.get_mut() {
            None => return false,
            Some(SelectionSession::Move { start, originals }) => {
                let delta = point - *start;
                originals
                    .iter()
                    .try_for_each(|(id, rect)| canvas.scene.set_frame(*id, *rect + delta))
            }
            Some(SelectionSession::Resize {
                target,
                corner,
                start_bounds,
            }) => {
                let rect = resize_bounds(*start_bounds, *corner, point, canvas.config.min_resize_width);
                canvas.scene.set_frame(*target, rect)
            }
            Some(SelectionSession::SelectionBox { start, current, area }) => {
                *current = point;
                let rect = Rect::from_points(*start, point);
                if let Some(item) = area.and_then(|id| canvas.scene.get_mut(id)) {
                    item.geometry = Geometry::Frame(rect);
                }
                Ok(())
            }
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Abandoning selection session: {e}");
                self.session.close();
                false
            }
        }
    }

    /// Close the open session. A selection box applies its selection here.
    pub fn finish(&mut self, canvas: &mut Canvas) -> Option<SessionKind> {
        let session = self.session.close()?;
        let kind = session.kind();
        if let SelectionSession::SelectionBox { start, current, area } = session {
            remove_area(canvas, area);
            let picked = select_in_rect(&canvas.scene, Rect::from_points(start, current));
            for asset_id in &picked.images {
                canvas.select_asset(AssetKind::Image, asset_id);
            }
            for asset_id in &picked.models {
                canvas.select_asset(AssetKind::Model3d, asset_id);
            }
            for &id in &picked.paths {
                canvas.select_path(id, false);
            }
            log::debug!(
                "Box selected {} images, {} models, {} paths",
                picked.images.len(),
                picked.models.len(),
                picked.paths.len()
            );
        }
        Some(kind)
    }

    /// Abort the open session, putting moved or resized items back.
    pub fn cancel(&mut self, canvas: &mut Canvas) -> bool {
        let Some(session) = self.session.close() else {
            return false;
        };
        match session {
            SelectionSession::Move { originals, .. } => {
                for (id, rect) in originals {
                    restore_frame(canvas, id, rect);
                }
            }
            SelectionSession::Resize {
                target,
                start_bounds,
                ..
            } => {
                restore_frame(canvas, target, start_bounds);
            }
            SelectionSession::SelectionBox { area, .. } => remove_area(canvas, area),
        }
        true
    }
}

fn restore_frame(canvas: &mut Canvas, id: ItemId, rect: Rect) {
    if let Err(e) = canvas.scene.set_frame(id, rect) {
        log::warn!("Could not restore {id} after cancel: {e}");
    }
}

fn remove_area(canvas: &mut Canvas, area: Option<ItemId>) {
    if let Some(id) = area {
        if let Err(e) = canvas.remove_item(id) {
            log::debug!("Selection area already gone: {e}");
        }
    }
}

fn click_asset(canvas: &mut Canvas, kind: AssetKind, asset_id: &str, additive: bool) {
    let selected = canvas
        .selection
        .images
        .iter()
        .chain(canvas.selection.models.iter())
        .any(|a| a == asset_id);
    if additive {
        if !selected {
            canvas.select_asset(kind, asset_id);
        }
    } else if !canvas.selection.is_sole_asset(asset_id) {
        canvas.clear_selection();
        canvas.select_asset(kind, asset_id);
    }
}

/// Correlation id of the topmost image or model under `point`.
fn asset_under(canvas: &Canvas, point: Point, kind: AssetKind) -> Option<String> {
    let item_kind = match kind {
        AssetKind::Image => ItemKind::Image,
        AssetKind::Model3d => ItemKind::Model3d,
    };
    let hit = canvas.scene.hit_test(point, HitOptions::bounds(0.0), |item| {
        item.kind == item_kind && item.correlation.is_some()
    })?;
    canvas.scene.get(hit.item)?.correlation.clone()
}

/// The image or model whose resize handle is under `point`, with the handle's corner.
pub fn handle_at(canvas: &Canvas, point: Point) -> Option<(ItemId, Corner)> {
    let tol = canvas.tolerance(canvas.config.handle_tolerance);
    let hit = canvas.scene.hit_test(point, HitOptions::bounds(tol), |item| {
        matches!(item.kind, ItemKind::Helper(HelperKind::ResizeHandle(_)))
    })?;
    let handle = canvas.scene.get(hit.item)?;
    match handle.kind {
        ItemKind::Helper(HelperKind::ResizeHandle(corner)) => Some((handle.parent?, corner)),
        _ => None,
    }
}

/// Hover cursor for handles and selected images or models.
pub fn cursor_at(canvas: &Canvas, point: Point) -> Option<CursorStyle> {
    if let Some((_, corner)) = handle_at(canvas, point) {
        return Some(CursorStyle::for_corner(corner));
    }
    [AssetKind::Image, AssetKind::Model3d]
        .into_iter()
        .filter_map(|kind| asset_under(canvas, point, kind))
        .any(|id| canvas.selection.images.contains(&id) || canvas.selection.models.contains(&id))
        .then_some(CursorStyle::Move)
}

fn rects_intersect(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

fn rect_contains(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.x1 <= outer.x1 && inner.y0 >= outer.y0 && inner.y1 <= outer.y1
}

/// Items picked up by a selection rectangle.
///
/// Images and models are selected when their bounds intersect `rect`; paths
/// only when fully contained. Items on hidden layers, grid paths, placeholder
/// outlines and helpers are never picked.
pub fn select_in_rect(scene: &SceneGraph, rect: Rect) -> BoxSelection {
    let mut picked = BoxSelection::default();
    let mut ids = scene.reverse_z_order();
    ids.reverse();
    for id in ids {
        let Some(item) = scene.get(id) else {
            continue;
        };
        if !scene.is_layer_visible(item.layer) {
            continue;
        }
        let Some(bounds) = scene.bounds(id) else {
            continue;
        };
        match item.kind {
            ItemKind::Image | ItemKind::Model3d if rects_intersect(rect, bounds) => {
                if let Some(corr) = &item.correlation {
                    match item.kind {
                        ItemKind::Image => picked.images.push(corr.clone()),
                        _ => picked.models.push(corr.clone()),
                    }
                }
            }
            ItemKind::Drawing if rect_contains(rect, bounds) => {
                let on_grid = scene.layer_name_of(id) == Some(GRID_LAYER);
                if !on_grid && scene.placeholder_ancestor(id).is_none() {
                    picked.paths.push(id);
                }
            }
            _ => {}
        }
    }
    picked
}

/// Proportional resize anchored at the corner opposite `corner`.
///
/// The cursor offset from the anchor is projected onto the aspect-ratio
/// diagonal; the projection's horizontal extent becomes the new width,
/// floored at `min_width`.
pub fn resize_bounds(start: Rect, corner: Corner, cursor: Point, min_width: f64) -> Rect {
    let anchor = corner.opposite().of(start);
    let aspect = if start.height() > f64::EPSILON {
        start.width() / start.height()
    } else {
        1.0
    };
    let (sx, sy) = corner.signs();
    let diagonal = Vec2::new(sx, sy / aspect);
    let offset = cursor - anchor;
    let t = offset.dot(diagonal) / diagonal.hypot2();
    let width = t.max(min_width);
    let height = width / aspect;
    let far = Point::new(anchor.x + sx * width, anchor.y + sy * height);
    Rect::from_points(anchor, far)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::PathData;

    fn assert_rect_eq(a: Rect, b: Rect) {
        let close = |x: f64, y: f64| (x - y).abs() < 1e-9;
        assert!(
            close(a.x0, b.x0) && close(a.y0, b.y0) && close(a.x1, b.x1) && close(a.y1, b.y1),
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn test_resize_se_keeps_top_left() {
        let start = Rect::new(10.0, 20.0, 110.0, 70.0);
        let out = resize_bounds(start, Corner::BottomRight, Point::new(210.0, 120.0), 50.0);
        assert_rect_eq(out, Rect::new(10.0, 20.0, 210.0, 120.0));
        assert!((out.width() / out.height() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_resize_nw_keeps_bottom_right() {
        let start = Rect::new(0.0, 0.0, 100.0, 100.0);
        let out = resize_bounds(start, Corner::TopLeft, Point::new(-50.0, -50.0), 50.0);
        assert_rect_eq(out, Rect::new(-50.0, -50.0, 100.0, 100.0));
    }

    #[test]
    fn test_resize_floors_width() {
        let start = Rect::new(0.0, 0.0, 100.0, 50.0);
        let out = resize_bounds(start, Corner::BottomRight, Point::new(1.0, 1.0), 50.0);
        assert_rect_eq(out, Rect::new(0.0, 0.0, 50.0, 25.0));

        // Dragging past the anchor still floors instead of flipping.
        let out = resize_bounds(start, Corner::BottomRight, Point::new(-300.0, -300.0), 50.0);
        assert_rect_eq(out, Rect::new(0.0, 0.0, 50.0, 25.0));
    }

    #[test]
    fn test_box_selection_rules() {
        let mut canvas = Canvas::default();
        canvas
            .add_asset(AssetKind::Image, "inside", "a.png", Rect::new(10.0, 10.0, 30.0, 30.0))
            .unwrap();
        canvas
            .add_asset(AssetKind::Image, "overlap", "b.png", Rect::new(90.0, 90.0, 140.0, 140.0))
            .unwrap();
        let contained = canvas
            .add_path(PathData::rectangle(Rect::new(5.0, 5.0, 15.0, 15.0)))
            .unwrap();
        let crossing = canvas
            .add_path(PathData::rectangle(Rect::new(90.0, 90.0, 140.0, 140.0)))
            .unwrap();
        canvas
            .add_placeholder(crate::scene::PlaceholderKind::Image, Rect::new(20.0, 20.0, 40.0, 40.0))
            .unwrap();

        let picked = select_in_rect(&canvas.scene, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert_eq!(picked.images, vec!["inside".to_string(), "overlap".to_string()]);
        assert_eq!(picked.paths, vec![contained]);
        assert!(!picked.paths.contains(&crossing));
    }

    #[test]
    fn test_box_selection_skips_hidden_layers() {
        let mut canvas = Canvas::default();
        let id = canvas
            .add_path(PathData::rectangle(Rect::new(5.0, 5.0, 15.0, 15.0)))
            .unwrap();
        let layer = canvas.scene.get(id).unwrap().layer;
        canvas.scene.set_layer_visible(layer, false).unwrap();
        let picked = select_in_rect(&canvas.scene, Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!(picked.paths.is_empty());
    }

    #[test]
    fn test_click_image_then_drag() {
        let mut canvas = Canvas::default();
        let image = canvas
            .add_asset(AssetKind::Image, "img", "a.png", Rect::new(0.0, 0.0, 40.0, 40.0))
            .unwrap();
        let mut tool = SelectionTool::new();
        let outcome = tool.handle_selection_click(&mut canvas, Point::new(20.0, 20.0), false, true);
        assert_eq!(outcome, ClickOutcome::Image("img".into()));
        assert_eq!(tool.session_kind(), Some(SessionKind::Move));
        assert!(canvas.instances.get("img").unwrap().is_selected);

        assert!(tool.update(&mut canvas, Point::new(30.0, 25.0)));
        assert_eq!(canvas.scene.bounds(image), Some(Rect::new(10.0, 5.0, 50.0, 45.0)));
        assert_eq!(tool.finish(&mut canvas), Some(SessionKind::Move));
        assert!(!tool.is_active());
    }

    #[test]
    fn test_cancel_move_restores_bounds() {
        let mut canvas = Canvas::default();
        let image = canvas
            .add_asset(AssetKind::Image, "img", "a.png", Rect::new(0.0, 0.0, 40.0, 40.0))
            .unwrap();
        let mut tool = SelectionTool::new();
        tool.handle_selection_click(&mut canvas, Point::new(20.0, 20.0), false, true);
        tool.update(&mut canvas, Point::new(80.0, 80.0));
        assert!(tool.cancel(&mut canvas));
        assert_eq!(canvas.scene.bounds(image), Some(Rect::new(0.0, 0.0, 40.0, 40.0)));
    }

    #[test]
    fn test_background_click_starts_box() {
        let mut canvas = Canvas::default();
        canvas
            .add_asset(AssetKind::Image, "img", "a.png", Rect::new(10.0, 10.0, 30.0, 30.0))
            .unwrap();
        let mut tool = SelectionTool::new();
        let outcome = tool.handle_selection_click(&mut canvas, Point::new(-20.0, -20.0), false, true);
        assert_eq!(outcome, ClickOutcome::Background { box_started: true });
        tool.update(&mut canvas, Point::new(50.0, 50.0));
        assert_eq!(tool.finish(&mut canvas), Some(SessionKind::SelectionBox));
        assert_eq!(canvas.selection.images, vec!["img".to_string()]);
        // The selection area helper is gone.
        assert!(
            !canvas
                .scene
                .items()
                .any(|i| i.kind == ItemKind::Helper(HelperKind::SelectionArea))
        );
    }

    #[test]
    fn test_eraser_mode_suppresses_box() {
        let mut canvas = Canvas::default();
        let mut tool = SelectionTool::new();
        let outcome = tool.handle_selection_click(&mut canvas, Point::new(5.0, 5.0), false, false);
        assert_eq!(outcome, ClickOutcome::Background { box_started: false });
        assert!(!tool.is_active());
    }

    #[test]
    fn test_ctrl_click_toggles_path() {
        let mut canvas = Canvas::default();
        let a = canvas
            .add_path(PathData::rectangle(Rect::new(0.0, 0.0, 10.0, 10.0)))
            .unwrap();
        let b = canvas
            .add_path(PathData::rectangle(Rect::new(50.0, 0.0, 60.0, 10.0)))
            .unwrap();
        let mut tool = SelectionTool::new();
        tool.handle_selection_click(&mut canvas, Point::new(0.0, 5.0), false, true);
        tool.handle_selection_click(&mut canvas, Point::new(50.0, 5.0), true, true);
        assert_eq!(canvas.selection.path_ids(), vec![a, b]);

        tool.handle_selection_click(&mut canvas, Point::new(50.0, 5.0), true, true);
        assert_eq!(canvas.selection.path_ids(), vec![a]);
    }

    #[test]
    fn test_grid_paths_are_not_selectable() {
        let mut canvas = Canvas::default();
        let grid = canvas.scene.add_layer(GRID_LAYER);
        canvas
            .scene
            .insert(
                grid,
                ItemSpec::new(
                    ItemKind::Drawing,
                    Geometry::Path(PathData::polyline(vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)])),
                ),
            )
            .unwrap();
        let mut tool = SelectionTool::new();
        let outcome = tool.handle_selection_click(&mut canvas, Point::new(50.0, 0.0), false, true);
        assert_eq!(outcome, ClickOutcome::Background { box_started: true });
        assert!(canvas.selection.paths.is_empty());
    }

    #[test]
    fn test_handle_at_finds_corner() {
        let mut canvas = Canvas::default();
        let image = canvas
            .add_asset(AssetKind::Image, "img", "a.png", Rect::new(0.0, 0.0, 40.0, 40.0))
            .unwrap();
        canvas.select_asset(AssetKind::Image, "img");
        assert_eq!(handle_at(&canvas, Point::new(41.0, 39.0)), Some((image, Corner::BottomRight)));
        assert_eq!(
            cursor_at(&canvas, Point::new(41.0, 39.0)),
            Some(CursorStyle::NwseResize)
        );
        assert_eq!(cursor_at(&canvas, Point::new(20.0, 20.0)), Some(CursorStyle::Move));
    }
}
