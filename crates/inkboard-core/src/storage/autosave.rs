//! Periodic persistence of the live project.

use super::{ProjectContent, ProjectStore, StorageError, StorageResult};
use crate::canvas::Canvas;
use crate::history::RestoreFlag;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Saves the live project when it is dirty and the interval has elapsed.
/// Never saves while a history restore is in flight.
pub struct AutoSaveManager<S: ProjectStore> {
    store: Arc<S>,
    interval: Duration,
    last_save: Option<Instant>,
    dirty: bool,
    project: Option<String>,
    restoring: RestoreFlag,
}

impl<S: ProjectStore> AutoSaveManager<S> {
    pub fn new(store: Arc<S>, restoring: RestoreFlag) -> Self {
        Self {
            store,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_save: None,
            dirty: false,
            project: None,
            restoring,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_project(&mut self, project: Option<String>) {
        self.project = project;
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Dirty, interval elapsed, and no restore in progress.
    pub fn should_save(&self) -> bool {
        if !self.dirty || self.restoring.is_set() {
            return false;
        }
        match self.last_save {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Save the canvas if [`Self::should_save`]. Returns true if a save happened.
    pub async fn maybe_save(&mut self, canvas: &Canvas) -> StorageResult<bool> {
        if !self.should_save() {
            return Ok(false);
        }
        let content = canvas
            .export_content()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.save(&content).await
    }

    /// Save now. Skipped (returning false) while a restore is in flight.
    pub async fn save(&mut self, content: &ProjectContent) -> StorageResult<bool> {
        if self.restoring.is_set() {
            log::debug!("Skipping auto-save during history restore");
            return Ok(false);
        }
        let project = self
            .project
            .clone()
            .ok_or_else(|| StorageError::Other("No project open".to_string()))?;
        self.store.save_immediately(&project, content).await?;
        self.last_save = Some(Instant::now());
        self.dirty = false;
        log::debug!("Auto-saved project {project}");
        Ok(true)
    }

    /// Load a project and make it current.
    pub async fn load(&mut self, project: &str) -> StorageResult<ProjectContent> {
        let content = self.store.load_content(project).await?;
        self.project = Some(project.to_string());
        self.dirty = false;
        self.last_save = Some(Instant::now());
        Ok(content)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pollster::block_on;

    fn manager() -> AutoSaveManager<MemoryStore> {
        let mut manager = AutoSaveManager::new(Arc::new(MemoryStore::new()), RestoreFlag::default());
        manager.set_project(Some("p".into()));
        manager
    }

    #[test]
    fn test_dirty_flag() {
        let mut manager = manager();
        assert!(!manager.should_save());
        manager.mark_dirty();
        assert!(manager.should_save());
    }

    #[test]
    fn test_save_clears_dirty_and_respects_interval() {
        let mut manager = manager();
        manager.mark_dirty();
        let canvas = Canvas::default();
        assert!(block_on(manager.maybe_save(&canvas)).unwrap());
        assert!(!manager.is_dirty());
        assert_eq!(manager.store().flush_count(), 1);

        manager.mark_dirty();
        assert!(!manager.should_save());
        manager.set_interval(Duration::ZERO);
        assert!(manager.should_save());
    }

    #[test]
    fn test_no_save_during_restore() {
        let flag = RestoreFlag::default();
        let mut manager = AutoSaveManager::new(Arc::new(MemoryStore::new()), flag.clone());
        manager.set_project(Some("p".into()));
        manager.mark_dirty();

        let _guard = flag.enter().unwrap();
        assert!(!manager.should_save());
        assert!(!block_on(manager.save(&ProjectContent::new())).unwrap());
        assert_eq!(manager.store().flush_count(), 0);
        assert!(manager.is_dirty());
    }

    #[test]
    fn test_load_sets_project() {
        let store = Arc::new(MemoryStore::new());
        block_on(store.write_content("other", &ProjectContent::new())).unwrap();
        let mut manager = AutoSaveManager::new(store, RestoreFlag::default());
        block_on(manager.load("other")).unwrap();
        assert_eq!(manager.project(), Some("other"));
        assert!(!manager.is_dirty());
    }
}
