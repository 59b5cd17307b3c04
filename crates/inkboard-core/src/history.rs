//! Per-project undo/redo over whole-project snapshots.
//!
//! Each commit flushes the live project to the store, captures the result,
//! and pushes the previous present onto the past stack. Restores rebuild the
//! scene from a snapshot and write it back as the persisted content. A shared
//! [`RestoreFlag`] blocks commits and auto-saves while a restore runs.

use crate::canvas::Canvas;
use crate::events::EditorEvent;
use crate::scene::SceneError;
use crate::storage::{ProjectContent, ProjectStore, StorageError};
use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// Default number of past snapshots kept per project.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("A history restore is already running")]
    Busy,
}

/// A captured project state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    content: ProjectContent,
    version: u64,
    captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(content: ProjectContent, version: u64) -> Self {
        Self {
            content,
            version,
            captured_at: Utc::now(),
        }
    }

    pub fn content(&self) -> &ProjectContent {
        &self.content
    }

    /// Serialized scene, empty if the snapshot has none.
    pub fn scene(&self) -> &str {
        self.content.scene_json.as_deref().unwrap_or_default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// Past, present and future snapshots of one project.
#[derive(Debug, Clone, Default)]
pub struct HistoryStack {
    past: VecDeque<Snapshot>,
    present: Option<Snapshot>,
    future: Vec<Snapshot>,
}

impl HistoryStack {
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    pub fn present(&self) -> Option<&Snapshot> {
        self.present.as_ref()
    }
}

/// Shared "restore in progress" flag.
#[derive(Debug, Clone, Default)]
pub struct RestoreFlag(Rc<Cell<bool>>);

impl RestoreFlag {
    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    /// Raise the flag until the guard drops. `None` if it is already raised.
    pub fn enter(&self) -> Option<RestoreGuard> {
        if self.0.replace(true) {
            return None;
        }
        Some(RestoreGuard(self.0.clone()))
    }
}

/// Lowers the [`RestoreFlag`] on drop, on success and failure alike.
#[derive(Debug)]
pub struct RestoreGuard(Rc<Cell<bool>>);

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Undo,
    Redo,
}

/// Undo/redo service keyed by project id.
pub struct HistoryService<S: ProjectStore> {
    store: Arc<S>,
    stacks: HashMap<String, HistoryStack>,
    limit: usize,
    restoring: RestoreFlag,
}

impl<S: ProjectStore> HistoryService<S> {
    pub fn new(store: Arc<S>, limit: usize) -> Self {
        Self {
            store,
            stacks: HashMap::new(),
            limit,
            restoring: RestoreFlag::default(),
        }
    }

    /// Flag to share with the auto-saver.
    pub fn restore_flag(&self) -> RestoreFlag {
        self.restoring.clone()
    }

    pub fn stack(&self, project: &str) -> Option<&HistoryStack> {
        self.stacks.get(project)
    }

    pub fn can_undo(&self, project: &str) -> bool {
        self.stacks.get(project).is_some_and(|s| !s.past.is_empty())
    }

    pub fn can_redo(&self, project: &str) -> bool {
        self.stacks.get(project).is_some_and(|s| !s.future.is_empty())
    }

    /// Past depth of a project.
    pub fn depth(&self, project: &str) -> usize {
        self.stacks.get(project).map_or(0, |s| s.past.len())
    }

    /// Capture the opened project's state as the present, if none exists.
    pub fn initialize(&mut self, project: &str, canvas: &Canvas) -> bool {
        let stack = self.stacks.entry(project.to_string()).or_default();
        if stack.present.is_some() {
            return true;
        }
        match canvas.export_content() {
            Ok(content) => {
                stack.present = Some(Snapshot::new(content, canvas.content_version()));
                true
            }
            Err(e) => {
                log::warn!("Could not capture initial state of {project}: {e}");
                false
            }
        }
    }

    /// Drop a project's history.
    pub fn close_project(&mut self, project: &str) -> bool {
        self.stacks.remove(project).is_some()
    }

    /// Record the current state after a user action. Returns whether a new
    /// entry was pushed.
    pub async fn commit(&mut self, project: &str, canvas: &mut Canvas, label: &str) -> bool {
        if self.restoring.is_set() {
            log::debug!("Ignoring commit '{label}' during restore");
            return false;
        }
        match self.try_commit(project, canvas, label).await {
            Ok(pushed) => pushed,
            Err(e) => {
                log::warn!("Commit '{label}' failed: {e}");
                false
            }
        }
    }

    async fn try_commit(
        &mut self,
        project: &str,
        canvas: &mut Canvas,
        label: &str,
    ) -> Result<bool, HistoryError> {
        let content = canvas.export_content()?;
        self.store.save_immediately(project, &content).await?;
        // A restore may have started while the flush was pending.
        if self.restoring.is_set() {
            return Ok(false);
        }

        let limit = self.limit;
        let stack = self.stacks.entry(project.to_string()).or_default();
        let scene = content.scene_json.as_deref().unwrap_or_default();
        if stack.present.as_ref().is_some_and(|p| p.scene() == scene) {
            log::debug!("Commit '{label}' left the scene unchanged");
            return Ok(false);
        }

        let version = canvas.bump_version();
        if let Some(previous) = stack.present.replace(Snapshot::new(content, version)) {
            stack.past.push_back(previous);
            while stack.past.len() > limit {
                stack.past.pop_front();
            }
        }
        stack.future.clear();
        log::info!(
            "Committed '{label}' on {project} (v{version}, {} undo steps)",
            stack.past.len()
        );
        Ok(true)
    }

    pub async fn undo(&mut self, project: &str, canvas: &mut Canvas) -> bool {
        self.step(project, canvas, Direction::Undo).await
    }

    pub async fn redo(&mut self, project: &str, canvas: &mut Canvas) -> bool {
        self.step(project, canvas, Direction::Redo).await
    }

    async fn step(&mut self, project: &str, canvas: &mut Canvas, direction: Direction) -> bool {
        if self.restoring.is_set() {
            return false;
        }
        let Some(stack) = self.stacks.get_mut(project) else {
            return false;
        };
        let available = match direction {
            Direction::Undo => !stack.past.is_empty(),
            Direction::Redo => !stack.future.is_empty(),
        };
        if !available {
            return false;
        }
        if stack.present.is_none() {
            match canvas.export_content() {
                Ok(content) => {
                    stack.present = Some(Snapshot::new(content, canvas.content_version()))
                }
                Err(e) => {
                    log::warn!("Could not capture present state: {e}");
                    return false;
                }
            }
        }
        let target = match direction {
            Direction::Undo => stack.past.pop_back(),
            Direction::Redo => stack.future.pop(),
        };
        let Some(target) = target else {
            return false;
        };

        if let Err(e) = self.restore(project, canvas, &target).await {
            log::warn!("History restore failed: {e}");
            if let Some(stack) = self.stacks.get_mut(project) {
                match direction {
                    Direction::Undo => stack.past.push_back(target),
                    Direction::Redo => stack.future.push(target),
                }
            }
            return false;
        }

        let Some(stack) = self.stacks.get_mut(project) else {
            return false;
        };
        if let Some(previous) = stack.present.replace(target) {
            match direction {
                Direction::Undo => stack.future.push(previous),
                Direction::Redo => stack.past.push_back(previous),
            }
        }
        true
    }

    /// Install a snapshot into the canvas and the store under the restore flag.
    async fn restore(
        &self,
        project: &str,
        canvas: &mut Canvas,
        snapshot: &Snapshot,
    ) -> Result<(), HistoryError> {
        let _guard = self.restoring.enter().ok_or(HistoryError::Busy)?;
        canvas.install_content(snapshot.content())?;
        canvas.set_version(snapshot.version());
        if let Err(e) = self.store.write_content(project, snapshot.content()).await {
            log::warn!("Restored scene but could not persist it: {e}");
        }
        let assets = canvas.asset_snapshots();
        canvas.events.emit(EditorEvent::HistoryRestore { assets });
        log::info!("Restored {project} to v{}", snapshot.version());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::PathData;
    use crate::storage::MemoryStore;
    use kurbo::Rect;
    use pollster::block_on;
    use std::cell::RefCell;

    const PROJECT: &str = "project-1";

    fn service() -> (HistoryService<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (HistoryService::new(store.clone(), DEFAULT_HISTORY_LIMIT), store)
    }

    fn draw(canvas: &mut Canvas, x: f64) {
        canvas
            .add_path(PathData::rectangle(Rect::new(x, 0.0, x + 10.0, 10.0)))
            .unwrap();
    }

    #[test]
    fn test_undo_restores_byte_identical_scene() {
        let (mut history, store) = service();
        let mut canvas = Canvas::default();
        history.initialize(PROJECT, &canvas);

        draw(&mut canvas, 0.1);
        assert!(block_on(history.commit(PROJECT, &mut canvas, "draw")));
        let before = canvas.scene.to_json().unwrap();

        draw(&mut canvas, 33.3);
        assert!(block_on(history.commit(PROJECT, &mut canvas, "draw")));
        assert_ne!(canvas.scene.to_json().unwrap(), before);

        assert!(block_on(history.undo(PROJECT, &mut canvas)));
        assert_eq!(canvas.scene.to_json().unwrap(), before);
        assert_eq!(store.write_count(), 1);
        let persisted = block_on(store.load_content(PROJECT)).unwrap();
        assert_eq!(persisted.scene_json.as_deref(), Some(before.as_str()));

        assert!(block_on(history.redo(PROJECT, &mut canvas)));
        assert_eq!(canvas.scene.item_count(), 2);
    }

    #[test]
    fn test_unchanged_commit_is_skipped() {
        let (mut history, store) = service();
        let mut canvas = Canvas::default();
        history.initialize(PROJECT, &canvas);
        draw(&mut canvas, 0.0);
        assert!(block_on(history.commit(PROJECT, &mut canvas, "draw")));
        assert!(!block_on(history.commit(PROJECT, &mut canvas, "noop")));
        assert_eq!(history.depth(PROJECT), 1);
        // The flush still happened.
        assert_eq!(store.flush_count(), 2);
    }

    #[test]
    fn test_past_is_bounded() {
        let store = Arc::new(MemoryStore::new());
        let mut history = HistoryService::new(store, 5);
        let mut canvas = Canvas::default();
        history.initialize(PROJECT, &canvas);
        for i in 0..12 {
            draw(&mut canvas, i as f64 * 20.0);
            block_on(history.commit(PROJECT, &mut canvas, "draw"));
        }
        assert_eq!(history.depth(PROJECT), 5);
    }

    #[test]
    fn test_commit_clears_future() {
        let (mut history, _) = service();
        let mut canvas = Canvas::default();
        history.initialize(PROJECT, &canvas);
        draw(&mut canvas, 0.0);
        block_on(history.commit(PROJECT, &mut canvas, "draw"));
        assert!(block_on(history.undo(PROJECT, &mut canvas)));
        assert!(history.can_redo(PROJECT));
        draw(&mut canvas, 50.0);
        block_on(history.commit(PROJECT, &mut canvas, "draw"));
        assert!(!history.can_redo(PROJECT));
    }

    #[test]
    fn test_commit_ignored_while_restoring() {
        let (mut history, store) = service();
        let mut canvas = Canvas::default();
        history.initialize(PROJECT, &canvas);
        draw(&mut canvas, 0.0);
        let flag = history.restore_flag();
        let guard = flag.enter().unwrap();
        assert!(!block_on(history.commit(PROJECT, &mut canvas, "draw")));
        assert!(!block_on(history.undo(PROJECT, &mut canvas)));
        assert_eq!(store.flush_count(), 0);
        drop(guard);
        assert!(!flag.is_set());
        assert!(block_on(history.commit(PROJECT, &mut canvas, "draw")));
    }

    #[test]
    fn test_undo_without_history_is_noop() {
        let (mut history, _) = service();
        let mut canvas = Canvas::default();
        assert!(!block_on(history.undo(PROJECT, &mut canvas)));
        history.initialize(PROJECT, &canvas);
        assert!(!block_on(history.undo(PROJECT, &mut canvas)));
        assert!(!block_on(history.redo(PROJECT, &mut canvas)));
    }

    #[test]
    fn test_restore_emits_event_and_clears_flag() {
        let (mut history, _) = service();
        let mut canvas = Canvas::default();
        let restores = Rc::new(RefCell::new(0));
        let sink = restores.clone();
        canvas.events.subscribe(move |e| {
            if matches!(e, EditorEvent::HistoryRestore { .. }) {
                *sink.borrow_mut() += 1;
            }
        });
        history.initialize(PROJECT, &canvas);
        draw(&mut canvas, 0.0);
        block_on(history.commit(PROJECT, &mut canvas, "draw"));
        block_on(history.undo(PROJECT, &mut canvas));
        assert_eq!(*restores.borrow(), 1);
        assert!(!history.restore_flag().is_set());
        assert_eq!(canvas.scene.item_count(), 0);
    }

    #[test]
    fn test_projects_are_independent() {
        let (mut history, _) = service();
        let mut a = Canvas::default();
        let mut b = Canvas::default();
        history.initialize("a", &a);
        history.initialize("b", &b);
        draw(&mut a, 0.0);
        block_on(history.commit("a", &mut a, "draw"));
        assert!(history.can_undo("a"));
        assert!(!history.can_undo("b"));
        assert!(!block_on(history.undo("b", &mut b)));
        assert!(history.close_project("a"));
        assert!(!history.can_undo("a"));
    }
}
