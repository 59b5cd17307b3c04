//! Text selection, in-place editing, dragging and corner resize.
//!
//! While a text item is being edited its scene item is hidden (opacity 0)
//! and the typed content lives in a draft until editing stops. Saved
//! snapshots always carry the visible opacity, and a freshly created text
//! stays out of them until editing leaves it non-blank.

use crate::canvas::Canvas;
use crate::input::KeyInput;
use crate::scene::{Corner, HitOptions, ItemId, ItemKind};
use crate::session::{SessionError, SessionKind, SessionSlot, SessionTag};
use kurbo::Point;

#[derive(Debug, Clone)]
pub enum TextSession {
    Edit {
        item: ItemId,
        text_id: String,
        draft: Option<String>,
    },
    Drag {
        item: ItemId,
        start: Point,
        origin: Point,
    },
    Resize {
        item: ItemId,
        corner: Corner,
        anchor: Point,
        start: Point,
        start_size: f64,
        origin: Point,
    },
}

impl SessionTag for TextSession {
    fn kind(&self) -> SessionKind {
        match self {
            TextSession::Edit { .. } => SessionKind::TextEdit,
            TextSession::Drag { .. } => SessionKind::Move,
            TextSession::Resize { corner, .. } => SessionKind::Resize(*corner),
        }
    }
}

/// Result of a click routed to the text tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextClickOutcome {
    Selected(String),
    EditStarted(String),
    Created(String),
    ResizeStarted(String),
    DragStarted(String),
    /// Click landed on the text already being edited.
    KeptEditing(String),
    /// Native double-click on the text being edited: select all of it.
    RefocusSelectAll(String),
    Deselected,
    Ignored,
}

/// How editing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditStop {
    Kept(String),
    /// Blank text is removed from the scene.
    Deleted(String),
}

#[derive(Debug, Default)]
pub struct TextTool {
    session: SessionSlot<TextSession>,
    last_click: Option<(String, u64)>,
}

impl TextTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.session.get(), Some(TextSession::Edit { .. }))
    }

    /// True while a drag or resize gesture is open.
    pub fn gesture_active(&self) -> bool {
        matches!(
            self.session.get(),
            Some(TextSession::Drag { .. } | TextSession::Resize { .. })
        )
    }

    pub fn editing_item(&self) -> Option<ItemId> {
        match self.session.get() {
            Some(TextSession::Edit { item, .. }) => Some(*item),
            _ => None,
        }
    }

    /// Route a pointer-down. `text_mode` is true when the text tool is the
    /// active mode; in select mode clicks only select or start editing.
    pub fn handle_click(
        &mut self,
        canvas: &mut Canvas,
        point: Point,
        time_ms: u64,
        text_mode: bool,
    ) -> TextClickOutcome {
        let hit = text_at(canvas, point);

        if let Some(TextSession::Edit { item, text_id, .. }) = self.session.get() {
            if hit.as_ref().is_some_and(|(id, _)| id == item) {
                return TextClickOutcome::KeptEditing(text_id.clone());
            }
            self.stop_editing(canvas);
        }

        match hit {
            Some((item, text_id)) => {
                if self.register_click(&text_id, time_ms, canvas.config.double_click_ms) {
                    canvas.select_text(&text_id);
                    return match self.start_editing(canvas, item) {
                        Ok(()) => TextClickOutcome::EditStarted(text_id),
                        Err(e) => {
                            log::warn!("Could not edit {text_id}: {e}");
                            TextClickOutcome::Selected(text_id)
                        }
                    };
                }
                if text_mode && canvas.selection.texts.contains(&text_id) {
                    if let Some(outcome) = self.begin_gesture(canvas, item, &text_id, point) {
                        return outcome;
                    }
                }
                canvas.select_text(&text_id);
                TextClickOutcome::Selected(text_id)
            }
            None => {
                self.last_click = None;
                if text_mode {
                    self.create_text(canvas, point)
                } else if !canvas.selection.texts.is_empty() {
                    canvas.deselect_texts();
                    TextClickOutcome::Deselected
                } else {
                    TextClickOutcome::Ignored
                }
            }
        }
    }

    fn create_text(&mut self, canvas: &mut Canvas, point: Point) -> TextClickOutcome {
        let (item, text_id) = match canvas.add_text(point, "") {
            Ok(created) => created,
            Err(e) => {
                log::warn!("Could not create text: {e}");
                return TextClickOutcome::Ignored;
            }
        };
        if let Some(scene_item) = canvas.scene.get_mut(item) {
            scene_item.transient = true;
        }
        canvas.select_text(&text_id);
        if let Err(e) = self.start_editing(canvas, item) {
            log::warn!("Could not edit new text {text_id}: {e}");
        }
        TextClickOutcome::Created(text_id)
    }

    /// Corner handle starts a resize, anywhere else on the text starts a drag.
    fn begin_gesture(
        &mut self,
        canvas: &Canvas,
        item: ItemId,
        text_id: &str,
        point: Point,
    ) -> Option<TextClickOutcome> {
        let text = canvas.scene.get(item)?.text()?;
        let bounds = text.bounds();
        let tol = canvas.tolerance(canvas.config.handle_tolerance);
        let corner = Corner::ALL
            .into_iter()
            .find(|c| c.of(bounds).distance(point) <= tol);
        let (session, outcome) = match corner {
            Some(corner) => (
                TextSession::Resize {
                    item,
                    corner,
                    anchor: corner.opposite().of(bounds),
                    start: point,
                    start_size: text.font_size,
                    origin: text.position,
                },
                TextClickOutcome::ResizeStarted(text_id.to_string()),
            ),
            None => (
                TextSession::Drag {
                    item,
                    start: point,
                    origin: text.position,
                },
                TextClickOutcome::DragStarted(text_id.to_string()),
            ),
        };
        match self.session.open(session) {
            Ok(_) => Some(outcome),
            Err(e) => {
                log::warn!("Text gesture not started: {e}");
                None
            }
        }
    }

    /// Two clicks on the same text within `window_ms` form a double click.
    fn register_click(&mut self, text_id: &str, time_ms: u64, window_ms: u64) -> bool {
        let double = self
            .last_click
            .as_ref()
            .is_some_and(|(last, at)| last == text_id && time_ms.saturating_sub(*at) <= window_ms);
        self.last_click = if double {
            None
        } else {
            Some((text_id.to_string(), time_ms))
        };
        double
    }

    /// Native double-click event from the host.
    pub fn native_double_click(&mut self, canvas: &mut Canvas, point: Point) -> TextClickOutcome {
        let Some((item, text_id)) = text_at(canvas, point) else {
            return TextClickOutcome::Ignored;
        };
        if self.editing_item() == Some(item) {
            return TextClickOutcome::RefocusSelectAll(text_id);
        }
        if self.is_editing() {
            self.stop_editing(canvas);
        } else if let Some(closed) = self.session.close() {
            log::debug!("Dropping text {} gesture for double-click", closed.kind());
        }
        canvas.select_text(&text_id);
        match self.start_editing(canvas, item) {
            Ok(()) => TextClickOutcome::EditStarted(text_id),
            Err(e) => {
                log::warn!("Could not edit {text_id}: {e}");
                TextClickOutcome::Selected(text_id)
            }
        }
    }

    /// Hide the scene text and open an editing session on it.
    pub fn start_editing(&mut self, canvas: &mut Canvas, item: ItemId) -> Result<(), SessionError> {
        let Some(scene_item) = canvas.scene.get(item) else {
            return Ok(());
        };
        let Some(text_id) = scene_item.correlation.clone() else {
            log::warn!("Text {item} has no id, not editable");
            return Ok(());
        };
        self.session.open(TextSession::Edit {
            item,
            text_id,
            draft: None,
        })?;
        if let Some(scene_item) = canvas.scene.get_mut(item) {
            scene_item.hide_for_edit();
        }
        Ok(())
    }

    /// Replace the overlay draft. Returns false when not editing.
    pub fn set_draft(&mut self, text: impl Into<String>) -> bool {
        match self.session.get_mut() {
            Some(TextSession::Edit { draft, .. }) => {
                *draft = Some(text.into());
                true
            }
            _ => false,
        }
    }

    /// Commit the draft into the scene and show the text again.
    pub fn stop_editing(&mut self, canvas: &mut Canvas) -> Option<EditStop> {
        if !self.is_editing() {
            return None;
        }
        let Some(TextSession::Edit {
            item,
            text_id,
            draft,
        }) = self.session.close()
        else {
            return None;
        };

        let blank = match canvas.scene.get_mut(item) {
            Some(scene_item) => {
                scene_item.reveal();
                let blank = match scene_item.text_mut() {
                    Some(text) => {
                        if let Some(draft) = draft {
                            text.content = draft;
                        }
                        text.content.trim().is_empty()
                    }
                    None => false,
                };
                if !blank {
                    scene_item.transient = false;
                }
                blank
            }
            None => {
                log::debug!("Edited text {text_id} disappeared");
                return None;
            }
        };

        if blank {
            if let Err(e) = canvas.remove_item(item) {
                log::warn!("Could not remove blank text {text_id}: {e}");
            }
            return Some(EditStop::Deleted(text_id));
        }
        Some(EditStop::Kept(text_id))
    }

    /// Update an open drag or resize. Returns whether the scene changed.
    pub fn pointer_move(&mut self, canvas: &mut Canvas, point: Point) -> bool {
        let (min_size, max_size) = (canvas.config.min_font_size, canvas.config.max_font_size);
        let (item, changed) = match self.session.get() {
            Some(TextSession::Drag { item, start, origin }) => {
                let target = *origin + (point - *start);
                let changed = canvas
                    .scene
                    .get_mut(*item)
                    .and_then(|i| i.text_mut())
                    .map(|text| text.position = target)
                    .is_some();
                (*item, changed)
            }
            Some(TextSession::Resize {
                item,
                corner,
                anchor,
                start,
                start_size,
                ..
            }) => {
                let size = resize_font_size(*start_size, *anchor, *start, point, min_size, max_size);
                let changed = canvas
                    .scene
                    .get_mut(*item)
                    .and_then(|i| i.text_mut())
                    .map(|text| {
                        text.font_size = size;
                        let pinned = corner.opposite().of(text.bounds());
                        text.position += *anchor - pinned;
                    })
                    .is_some();
                (*item, changed)
            }
            _ => return false,
        };
        if !changed {
            log::warn!("Text {item} vanished during gesture");
            self.session.close();
        }
        changed
    }

    /// End a drag or resize. Editing sessions stay open.
    pub fn pointer_up(&mut self) -> Option<SessionKind> {
        if self.gesture_active() {
            self.session.close().map(|s| s.kind())
        } else {
            None
        }
    }

    /// Abort a drag or resize, restoring the text's position and size.
    pub fn cancel_gesture(&mut self, canvas: &mut Canvas) -> bool {
        if !self.gesture_active() {
            return false;
        }
        let (item, origin, size) = match self.session.close() {
            Some(TextSession::Drag { item, origin, .. }) => (item, origin, None),
            Some(TextSession::Resize {
                item,
                origin,
                start_size,
                ..
            }) => (item, origin, Some(start_size)),
            _ => return false,
        };
        if let Some(text) = canvas.scene.get_mut(item).and_then(|i| i.text_mut()) {
            text.position = origin;
            if let Some(size) = size {
                text.font_size = size;
            }
        }
        true
    }

    /// Keys go to the editing overlay while editing. Escape stops editing.
    pub fn handle_key(&mut self, canvas: &mut Canvas, key: &KeyInput) -> bool {
        if !self.is_editing() {
            return false;
        }
        if key.is("Escape") {
            self.stop_editing(canvas);
        }
        true
    }
}

/// Topmost text item under `point`, with its text id.
fn text_at(canvas: &Canvas, point: Point) -> Option<(ItemId, String)> {
    let hit = canvas
        .scene
        .hit_test(point, HitOptions::bounds(0.0), |item| item.kind == ItemKind::Text)?;
    let text_id = canvas.scene.get(hit.item)?.correlation.clone()?;
    Some((hit.item, text_id))
}

/// Font size after dragging a corner from `start` to `current`, scaled by
/// the change in distance from the fixed `anchor` corner.
pub fn resize_font_size(
    start_size: f64,
    anchor: Point,
    start: Point,
    current: Point,
    min_size: f64,
    max_size: f64,
) -> f64 {
    let start_dist = anchor.distance(start);
    if start_dist < f64::EPSILON {
        return start_size.clamp(min_size, max_size);
    }
    (start_size * anchor.distance(current) / start_dist).clamp(min_size, max_size)
}
