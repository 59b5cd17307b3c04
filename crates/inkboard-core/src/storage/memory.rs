//! In-memory project store.

use super::{BoxFuture, ProjectContent, ProjectStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory store for tests and the replay shell.
#[derive(Default)]
pub struct MemoryStore {
    projects: RwLock<HashMap<String, ProjectContent>>,
    flushes: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save_immediately` calls so far.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Number of `write_content` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn put(&self, project: String, content: ProjectContent) -> StorageResult<()> {
        let mut projects = self
            .projects
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        projects.insert(project, content);
        Ok(())
    }
}

impl ProjectStore for MemoryStore {
    fn save_immediately(
        &self,
        project: &str,
        content: &ProjectContent,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let project = project.to_string();
        let content = content.clone();
        Box::pin(async move {
            self.flushes.fetch_add(1, Ordering::Relaxed);
            self.put(project, content)
        })
    }

    fn write_content(
        &self,
        project: &str,
        content: &ProjectContent,
    ) -> BoxFuture<'_, StorageResult<()>> {
        let project = project.to_string();
        let content = content.clone();
        Box::pin(async move {
            self.writes.fetch_add(1, Ordering::Relaxed);
            self.put(project, content)
        })
    }

    fn load_content(&self, project: &str) -> BoxFuture<'_, StorageResult<ProjectContent>> {
        let project = project.to_string();
        Box::pin(async move {
            let projects = self
                .projects
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            projects
                .get(&project)
                .cloned()
                .ok_or(StorageError::NotFound(project))
        })
    }

    fn delete(&self, project: &str) -> BoxFuture<'_, StorageResult<()>> {
        let project = project.to_string();
        Box::pin(async move {
            let mut projects = self
                .projects
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            projects.remove(&project);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let projects = self
                .projects
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            let mut ids: Vec<String> = projects.keys().cloned().collect();
            ids.sort();
            Ok(ids)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;

    #[test]
    fn test_save_and_load() {
        let store = MemoryStore::new();
        let mut content = ProjectContent::new();
        content.active_layer_id = Some("l1".into());

        block_on(store.save_immediately("p", &content)).unwrap();
        let loaded = block_on(store.load_content("p")).unwrap();
        assert_eq!(loaded, content);
        assert_eq!(store.flush_count(), 1);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_not_found() {
        let store = MemoryStore::new();
        let result = block_on(store.load_content("missing"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_delete_and_list() {
        let store = MemoryStore::new();
        let content = ProjectContent::new();
        block_on(store.write_content("b", &content)).unwrap();
        block_on(store.write_content("a", &content)).unwrap();
        assert_eq!(block_on(store.list()).unwrap(), vec!["a".to_string(), "b".to_string()]);

        block_on(store.delete("a")).unwrap();
        assert_eq!(block_on(store.list()).unwrap(), vec!["b".to_string()]);
        assert_eq!(store.write_count(), 2);
    }
}
