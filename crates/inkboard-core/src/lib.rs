//! Inkboard Core Library
//!
//! Interaction and editing engine for the Inkboard vector canvas: the scene
//! graph, tool subsystems, input routing and undo/redo over persisted
//! project snapshots.

pub mod assets;
pub mod camera;
pub mod canvas;
pub mod config;
pub mod controller;
pub mod events;
pub mod history;
pub mod input;
pub mod layer;
pub mod path_edit;
pub mod scene;
pub mod selection;
pub mod session;
pub mod storage;
pub mod text_tool;
pub mod tools;

pub use assets::{AssetKind, AssetSnapshots, InstanceRegistry};
pub use camera::Camera;
pub use canvas::Canvas;
pub use config::{ConfigError, EditorConfig};
pub use controller::{CommitRequest, DownOutcome, InteractionController, KeyOutcome};
pub use events::{EditorEvent, EventBus};
pub use history::{HistoryError, HistoryService, RestoreFlag};
pub use input::{KeyInput, Modifiers, PointerInput};
pub use layer::{LayerManager, LayerMeta, LayerRegistry, LayerStore};
pub use scene::{ItemId, ItemKind, SceneError, SceneGraph};
pub use selection::{ClickOutcome, CursorStyle, SelectionState};
pub use storage::{
    AutoSaveManager, FileStore, MemoryStore, ProjectContent, ProjectStore, StorageError,
};
pub use text_tool::TextClickOutcome;
pub use tools::ToolMode;
