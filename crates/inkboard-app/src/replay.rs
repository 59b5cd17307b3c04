//! Scripted session replay.
//!
//! A script is a JSON array of actions, each tagged by `"action"`:
//!
//! ```json
//! [
//!   { "action": "mode", "mode": "rect" },
//!   { "action": "down", "position": { "x": 0, "y": 0 } },
//!   { "action": "move", "position": { "x": 40, "y": 20 } },
//!   { "action": "up", "position": { "x": 40, "y": 20 } },
//!   { "action": "key", "key": "z", "modifiers": { "ctrl": true } }
//! ]
//! ```

use crate::AppError;
use inkboard_core::{
    AutoSaveManager, Canvas, EditorConfig, HistoryService, InteractionController, KeyInput,
    KeyOutcome, PointerInput, ProjectContent, ProjectStore, ToolMode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Mode { mode: ToolMode },
    Eraser { enabled: bool },
    Down(PointerInput),
    Move(PointerInput),
    Up(PointerInput),
    Leave(PointerInput),
    DoubleClick(PointerInput),
    Key(KeyInput),
    /// Commit outside any gesture, e.g. after a programmatic change.
    Commit { label: String },
    Undo,
    Redo,
    /// Replace the text being edited.
    Draft { text: String },
    StopEdit,
}

pub fn parse_script(json: &str) -> Result<Vec<Action>, AppError> {
    Ok(serde_json::from_str(json)?)
}

/// Drives one project through the controller, history service and auto-save.
pub struct Replay<S: ProjectStore> {
    canvas: Canvas,
    controller: InteractionController,
    history: HistoryService<S>,
    autosave: AutoSaveManager<S>,
    project: String,
}

impl<S: ProjectStore> Replay<S> {
    pub fn new(store: Arc<S>, config: EditorConfig, project: impl Into<String>) -> Self {
        let project = project.into();
        let history = HistoryService::new(store.clone(), config.history_limit);
        let mut autosave = AutoSaveManager::new(store, history.restore_flag());
        autosave.set_interval(config.autosave_interval());
        autosave.set_project(Some(project.clone()));
        Self {
            canvas: Canvas::new(config),
            controller: InteractionController::new(),
            history,
            autosave,
            project,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn history(&self) -> &HistoryService<S> {
        &self.history
    }

    pub fn autosave(&self) -> &AutoSaveManager<S> {
        &self.autosave
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Apply every action in order and return the final project content.
    pub async fn run(&mut self, actions: &[Action]) -> Result<ProjectContent, AppError> {
        self.history.initialize(&self.project, &self.canvas);
        for (index, action) in actions.iter().enumerate() {
            log::debug!("Action {index}: {action:?}");
            self.apply(action).await;
        }
        // Close out anything the script left open.
        self.controller.stop_text_editing(&mut self.canvas);
        self.drain_commits().await;
        Ok(self.canvas.export_content()?)
    }

    pub async fn apply(&mut self, action: &Action) {
        let canvas = &mut self.canvas;
        match action {
            Action::Mode { mode } => self.controller.set_mode(canvas, *mode),
            Action::Eraser { enabled } => self.controller.set_eraser(*enabled),
            Action::Down(input) => {
                let outcome = self.controller.pointer_down(canvas, input);
                log::debug!("Pointer down: {outcome:?}");
            }
            Action::Move(input) => {
                self.controller.pointer_move(canvas, input);
            }
            Action::Up(input) => {
                self.controller.pointer_up(canvas, input);
            }
            Action::Leave(input) => {
                self.controller.mouse_leave(canvas, input);
            }
            Action::DoubleClick(input) => {
                self.controller.double_click(canvas, input);
            }
            Action::Key(key) => match self.controller.key_down(canvas, key) {
                KeyOutcome::Undo => self.step(true).await,
                KeyOutcome::Redo => self.step(false).await,
                _ => {}
            },
            Action::Commit { label } => {
                self.drain_commits().await;
                if self
                    .history
                    .commit(&self.project, &mut self.canvas, label)
                    .await
                {
                    self.autosave.mark_dirty();
                }
            }
            Action::Undo => self.step(true).await,
            Action::Redo => self.step(false).await,
            Action::Draft { text } => {
                if !self.controller.text_tool_mut().set_draft(text.clone()) {
                    log::warn!("Draft ignored: no text is being edited");
                }
            }
            Action::StopEdit => {
                self.controller.stop_text_editing(canvas);
            }
        }
        self.drain_commits().await;
        match self.autosave.maybe_save(&self.canvas).await {
            Ok(true) => log::debug!("Auto-saved after {action:?}"),
            Ok(false) => {}
            Err(e) => log::warn!("Auto-save failed: {e}"),
        }
    }

    /// Undo (or redo) after closing every open session, so the restored
    /// scene is never edited through a stale gesture.
    async fn step(&mut self, undo: bool) {
        self.controller.reset_sessions(&mut self.canvas);
        self.drain_commits().await;
        let stepped = if undo {
            self.history.undo(&self.project, &mut self.canvas).await
        } else {
            self.history.redo(&self.project, &mut self.canvas).await
        };
        if !stepped {
            log::debug!("Nothing to {}", if undo { "undo" } else { "redo" });
        }
    }

    async fn drain_commits(&mut self) {
        for request in self.controller.take_commit_requests() {
            if self
                .history
                .commit(&self.project, &mut self.canvas, &request.label)
                .await
            {
                self.autosave.mark_dirty();
            }
        }
    }
}
