//! Persisted project content and storage backends.

mod autosave;
mod file;
mod memory;

pub use autosave::{AutoSaveManager, DEFAULT_AUTOSAVE_INTERVAL_SECS};
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::assets::AssetSnapshots;
use crate::layer::LayerMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Project not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async storage operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Camera state saved with a project.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasView {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for CanvasView {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

/// Summary numbers recorded alongside the serialized scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMeta {
    pub paper_json_len: usize,
    pub layer_count: usize,
    pub item_count: usize,
    pub saved_at: DateTime<Utc>,
}

/// Everything persisted for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContent {
    #[serde(default)]
    pub layers: Vec<LayerMeta>,
    #[serde(default)]
    pub active_layer_id: Option<String>,
    #[serde(default)]
    pub canvas: CanvasView,
    /// Serialized scene graph.
    #[serde(rename = "paperJson", default)]
    pub scene_json: Option<String>,
    #[serde(default)]
    pub meta: Option<ContentMeta>,
    #[serde(default)]
    pub assets: Option<AssetSnapshots>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ProjectContent {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectContent {
    /// Empty content stamped with the current time.
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            active_layer_id: None,
            canvas: CanvasView::default(),
            scene_json: None,
            meta: None,
            assets: None,
            updated_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Persisted-state store for projects.
pub trait ProjectStore: Send + Sync {
    /// Flush pending edits of the live project.
    fn save_immediately(
        &self,
        project: &str,
        content: &ProjectContent,
    ) -> BoxFuture<'_, StorageResult<()>>;

    /// Overwrite the persisted content, as after an undo or redo.
    fn write_content(
        &self,
        project: &str,
        content: &ProjectContent,
    ) -> BoxFuture<'_, StorageResult<()>>;

    fn load_content(&self, project: &str) -> BoxFuture<'_, StorageResult<ProjectContent>>;

    fn delete(&self, project: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// All stored project ids.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;
}
