//! Pointer and keyboard routing for the canvas.
//!
//! The controller translates screen events to project space, dispatches them
//! to the subsystem that owns the gesture, and queues a history commit after
//! every pointer-up. At most one subsystem session is open at a time and all
//! of them are closed by the time a pointer-up returns.

use crate::canvas::Canvas;
use crate::events::EditorEvent;
use crate::input::{KeyInput, PointerInput};
use crate::path_edit::{PathClaim, PathEditor};
use crate::scene::{HitOptions, ItemId, ItemKind, PlaceholderKind};
use crate::selection::{self, ClickOutcome, CursorStyle, SelectionTool};
use crate::text_tool::{TextClickOutcome, TextTool};
use crate::tools::{DrawResult, DrawTool, ToolMode};
use kurbo::Point;

/// Which priority rule claimed a pointer-down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownOutcome {
    /// A placeholder was clicked and an upload was requested.
    PlaceholderUpload(ItemId),
    /// A resize handle of a selected image or model was grabbed.
    ResizeSession(ItemId),
    PathEdit(PathClaim),
    SelectionClick(ClickOutcome),
    SelectionBoxStart,
    Draw(Option<DrawResult>),
    Text(TextClickOutcome),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Handled,
    Deleted,
    Undo,
    Redo,
    Cancelled,
    Ignored,
}

/// A request for the history service to capture the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub label: String,
}

/// Routes input to the tool subsystems.
#[derive(Debug, Default)]
pub struct InteractionController {
    mode: ToolMode,
    eraser: bool,
    selection: SelectionTool,
    paths: PathEditor,
    text: TextTool,
    draw: DrawTool,
    cursor: CursorStyle,
    last_point: Point,
    needs_repaint: bool,
    commits: Vec<CommitRequest>,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ToolMode {
        self.mode
    }

    pub fn eraser(&self) -> bool {
        self.eraser
    }

    /// Eraser mode suppresses the selection box in select mode.
    pub fn set_eraser(&mut self, enabled: bool) {
        self.eraser = enabled;
    }

    pub fn cursor(&self) -> CursorStyle {
        self.cursor
    }

    pub fn text_tool(&self) -> &TextTool {
        &self.text
    }

    pub fn text_tool_mut(&mut self) -> &mut TextTool {
        &mut self.text
    }

    /// Switch tool mode, closing any open gesture first.
    pub fn set_mode(&mut self, canvas: &mut Canvas, mode: ToolMode) {
        if mode == self.mode {
            return;
        }
        if let Some(label) = self.finish_gestures(canvas, self.last_point) {
            self.request_commit(label);
        }
        if self.text.stop_editing(canvas).is_some() {
            self.request_commit("text-edit");
        }
        if let Some(result) = self.draw.settle_pending(canvas) {
            if result != DrawResult::Discarded {
                self.request_commit("line");
            }
        }
        log::debug!("Tool mode {} -> {}", self.mode, mode);
        self.mode = mode;
        self.cursor = match mode {
            ToolMode::Select => CursorStyle::Default,
            ToolMode::Text => CursorStyle::Text,
            _ => CursorStyle::Crosshair,
        };
        self.needs_repaint = true;
        canvas.events.emit(EditorEvent::ModeChanged(mode));
    }

    fn any_gesture_open(&self) -> bool {
        self.selection.is_active()
            || self.paths.is_active()
            || self.text.gesture_active()
            || self.draw.is_active()
    }

    pub fn pointer_down(&mut self, canvas: &mut Canvas, input: &PointerInput) -> DownOutcome {
        let point = canvas.camera.screen_to_world(input.position);
        if self.any_gesture_open() {
            log::warn!("Pointer-down while a gesture is open; finishing it first");
            self.pointer_up_at(canvas, self.last_point);
        }
        self.last_point = point;
        self.needs_repaint = true;

        match self.mode {
            ToolMode::Select => self.select_down(canvas, point, input),
            ToolMode::Text => DownOutcome::Text(self.text.handle_click(canvas, point, input.time_ms, true)),
            ToolMode::QuickImage => DownOutcome::Ignored,
            mode => {
                if self.text.stop_editing(canvas).is_some() {
                    self.request_commit("text-edit");
                }
                canvas.clear_selection();
                match self.draw.pointer_down(canvas, mode, point) {
                    Ok(result) => DownOutcome::Draw(result),
                    Err(e) => {
                        log::warn!("Drawing failed to start: {e}");
                        DownOutcome::Ignored
                    }
                }
            }
        }
    }

    /// Select-mode priority chain. Exactly one rule claims the press; the
    /// text tool then always sees the click as well.
    fn select_down(&mut self, canvas: &mut Canvas, point: Point, input: &PointerInput) -> DownOutcome {
        let outcome = if let Some((placeholder, kind)) = placeholder_at(canvas, point) {
            let bounds = canvas.scene.bounds(placeholder).unwrap_or_default();
            canvas.events.emit(EditorEvent::UploadRequested {
                placeholder,
                kind,
                bounds,
            });
            DownOutcome::PlaceholderUpload(placeholder)
        } else if let Some(target) = self.try_resize(canvas, point) {
            DownOutcome::ResizeSession(target)
        } else if let Some(claim) = self.paths.pointer_down(canvas, point) {
            DownOutcome::PathEdit(claim)
        } else {
            let allow_box = !self.eraser;
            match self
                .selection
                .handle_selection_click(canvas, point, input.modifiers.command(), allow_box)
            {
                ClickOutcome::Background { box_started: true } => DownOutcome::SelectionBoxStart,
                other => DownOutcome::SelectionClick(other),
            }
        };

        let text = self.text.handle_click(canvas, point, input.time_ms, false);
        log::trace!("Select-mode text click: {text:?}");
        outcome
    }

    fn try_resize(&mut self, canvas: &Canvas, point: Point) -> Option<ItemId> {
        let (target, corner) = selection::handle_at(canvas, point)?;
        match self.selection.begin_resize(canvas, target, corner) {
            Ok(()) if self.selection.is_active() => Some(target),
            Ok(()) => None,
            Err(e) => {
                log::warn!("Resize not started: {e}");
                None
            }
        }
    }

    /// Update the open gesture, or the hover cursor when none is open.
    pub fn pointer_move(&mut self, canvas: &mut Canvas, input: &PointerInput) -> bool {
        let point = canvas.camera.screen_to_world(input.position);
        self.last_point = point;
        let changed = if self.selection.is_active() {
            self.selection.update(canvas, point)
        } else if self.paths.is_active() {
            self.paths.pointer_move(canvas, point, input.modifiers.shift)
        } else if self.text.gesture_active() {
            self.text.pointer_move(canvas, point)
        } else if self.draw.is_active() || self.draw.pending_line().is_some() {
            self.draw.pointer_move(canvas, point)
        } else {
            self.cursor = self.hover_cursor(canvas, point);
            false
        };
        self.needs_repaint |= changed;
        changed
    }

    /// Close every gesture and queue a commit. Always commits, even if the
    /// gesture changed nothing; the history service drops no-op commits.
    pub fn pointer_up(&mut self, canvas: &mut Canvas, input: &PointerInput) -> CommitRequest {
        let point = canvas.camera.screen_to_world(input.position);
        self.pointer_up_at(canvas, point)
    }

    /// Leaving the canvas ends gestures exactly like a pointer-up.
    pub fn mouse_leave(&mut self, canvas: &mut Canvas, input: &PointerInput) -> CommitRequest {
        self.pointer_up(canvas, input)
    }

    fn pointer_up_at(&mut self, canvas: &mut Canvas, point: Point) -> CommitRequest {
        self.last_point = point;
        let label = self
            .finish_gestures(canvas, point)
            .unwrap_or_else(|| self.mode.as_str().to_string());
        self.needs_repaint = true;
        self.request_commit(label)
    }

    fn finish_gestures(&mut self, canvas: &mut Canvas, point: Point) -> Option<String> {
        let mut label = None;
        if let Some(kind) = self.selection.finish(canvas) {
            label = Some(kind.to_string());
        }
        if let Some(kind) = self.paths.pointer_up() {
            label = Some(kind.to_string());
        }
        if let Some(kind) = self.text.pointer_up() {
            label = Some(format!("text-{kind}"));
        }
        if let Some(result) = self.draw.pointer_up(canvas, point) {
            log::debug!("Drawing finished: {result:?}");
            label = Some(self.mode.as_str().to_string());
        }
        label
    }

    /// Native double-click, forwarded to the text tool.
    pub fn double_click(&mut self, canvas: &mut Canvas, input: &PointerInput) -> TextClickOutcome {
        let point = canvas.camera.screen_to_world(input.position);
        self.needs_repaint = true;
        self.text.native_double_click(canvas, point)
    }

    pub fn key_down(&mut self, canvas: &mut Canvas, key: &KeyInput) -> KeyOutcome {
        if self.text.is_editing() {
            let was_editing = self.text.editing_item();
            self.text.handle_key(canvas, key);
            if was_editing.is_some() && !self.text.is_editing() {
                self.needs_repaint = true;
                self.request_commit("text-edit");
            }
            return KeyOutcome::Handled;
        }

        if key.is("Escape") {
            return if self.cancel(canvas) {
                KeyOutcome::Cancelled
            } else {
                KeyOutcome::Ignored
            };
        }

        if key.is("Delete") || key.is("Backspace") {
            if key.text_input_focused {
                return KeyOutcome::Ignored;
            }
            if canvas.delete_selected() {
                self.needs_repaint = true;
                self.request_commit("delete");
                return KeyOutcome::Deleted;
            }
            return KeyOutcome::Ignored;
        }

        if key.modifiers.command() {
            let outcome = if key.is("z") && key.modifiers.shift {
                KeyOutcome::Redo
            } else if key.is("z") {
                KeyOutcome::Undo
            } else if key.is("y") {
                KeyOutcome::Redo
            } else {
                return KeyOutcome::Ignored;
            };
            self.reset_sessions(canvas);
            return outcome;
        }
        KeyOutcome::Ignored
    }

    /// Abort every open gesture, restoring what it changed.
    pub fn cancel(&mut self, canvas: &mut Canvas) -> bool {
        let mut cancelled = self.selection.cancel(canvas);
        cancelled |= self.paths.cancel(canvas);
        cancelled |= self.text.cancel_gesture(canvas);
        cancelled |= self.draw.cancel(canvas);
        if cancelled {
            self.needs_repaint = true;
        }
        cancelled
    }

    /// Close every session ahead of a history restore replacing the scene.
    /// Text editing is finished and committed; gestures are aborted.
    pub fn reset_sessions(&mut self, canvas: &mut Canvas) -> bool {
        let stopped = self.stop_text_editing(canvas);
        let cancelled = self.cancel(canvas);
        stopped || cancelled
    }

    /// Finish text editing with the overlay's final content.
    pub fn stop_text_editing(&mut self, canvas: &mut Canvas) -> bool {
        if self.text.stop_editing(canvas).is_some() {
            self.needs_repaint = true;
            self.request_commit("text-edit");
            return true;
        }
        false
    }

    fn request_commit(&mut self, label: impl Into<String>) -> CommitRequest {
        let request = CommitRequest {
            label: label.into(),
        };
        self.commits.push(request.clone());
        request
    }

    /// Drain queued commit requests.
    pub fn take_commit_requests(&mut self) -> Vec<CommitRequest> {
        std::mem::take(&mut self.commits)
    }

    /// Whether a redraw is due; resets the flag.
    pub fn take_repaint(&mut self) -> bool {
        std::mem::take(&mut self.needs_repaint)
    }

    fn hover_cursor(&self, canvas: &Canvas, point: Point) -> CursorStyle {
        match self.mode {
            ToolMode::Select => selection::cursor_at(canvas, point)
                .or_else(|| self.paths.cursor_hint(canvas, point))
                .unwrap_or_default(),
            ToolMode::Text => CursorStyle::Text,
            ToolMode::QuickImage => CursorStyle::Default,
            _ => CursorStyle::Crosshair,
        }
    }
}

/// Placeholder group under `point`, using a small hit tolerance.
fn placeholder_at(canvas: &Canvas, point: Point) -> Option<(ItemId, PlaceholderKind)> {
    let tol = canvas.tolerance(canvas.config.placeholder_tolerance);
    let hit = canvas.scene.hit_test(point, HitOptions::bounds(tol), |item| {
        matches!(item.kind, ItemKind::Placeholder(_))
    })?;
    match canvas.scene.get(hit.item)?.kind {
        ItemKind::Placeholder(kind) => Some((hit.item, kind)),
        _ => None,
    }
}
