//! File-based project store.

use super::{BoxFuture, ProjectContent, ProjectStore, StorageError, StorageResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Stores each project as `<id>.json` in a directory.
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    fn project_path(&self, id: &str) -> PathBuf {
        let safe_id: String = id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_id))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn write(&self, project: &str, content: &ProjectContent) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.project_path(project);
        let json = content.to_json();
        Box::pin(async move {
            let json = json.map_err(|e| StorageError::Serialization(e.to_string()))?;
            fs::write(&path, json)
                .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
        })
    }
}

impl ProjectStore for FileStore {
    fn save_immediately(
        &self,
        project: &str,
        content: &ProjectContent,
    ) -> BoxFuture<'_, StorageResult<()>> {
        self.write(project, content)
    }

    fn write_content(
        &self,
        project: &str,
        content: &ProjectContent,
    ) -> BoxFuture<'_, StorageResult<()>> {
        self.write(project, content)
    }

    fn load_content(&self, project: &str) -> BoxFuture<'_, StorageResult<ProjectContent>> {
        let path = self.project_path(project);
        let project = project.to_string();
        Box::pin(async move {
            if !path.exists() {
                return Err(StorageError::NotFound(project));
            }
            let json = fs::read_to_string(&path)
                .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
            ProjectContent::from_json(&json).map_err(|e| {
                StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
            })
        })
    }

    fn delete(&self, project: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.project_path(project);
        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        let base = self.base_path.clone();
        Box::pin(async move {
            let entries = fs::read_dir(&base)
                .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;
            let mut ids: Vec<String> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
                .collect();
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
    fn test_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("projects")).unwrap();
        let mut content = ProjectContent::new();
        content.scene_json = Some("{\"layers\":[]}".into());

        block_on(store.save_immediately("board 1", &content)).unwrap();
        assert!(store.base_path().join("board_1.json").exists());
        assert_eq!(block_on(store.load_content("board 1")).unwrap(), content);
        assert_eq!(block_on(store.list()).unwrap(), vec!["board_1".to_string()]);
    }

    #[test]
    fn test_missing_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        assert!(matches!(
            block_on(store.load_content("nope")),
            Err(StorageError::NotFound(_))
        ));
        block_on(store.write_content("p", &ProjectContent::new())).unwrap();
        block_on(store.delete("p")).unwrap();
        assert!(block_on(store.list()).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("bad.json"), "{").unwrap();
        assert!(matches!(
            block_on(store.load_content("bad")),
            Err(StorageError::Serialization(_))
        ));
    }
}
