//! Active layer resolution.
//!
//! Layer metadata is owned by a [`LayerRegistry`]; each registry entry maps to
//! a graph layer named `layer_{id}`. [`LayerManager::ensure_active_layer`]
//! always hands back a usable graph layer, falling back to a single ad-hoc
//! layer when the registry cannot provide one.

use crate::scene::{GRID_LAYER, GraphId, LayerId, SceneError, SceneGraph};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Name of the ad-hoc layer created when the registry fails.
pub const FALLBACK_LAYER: &str = "drawing";

/// Layer resolution errors.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("No layer registered with id {0}")]
    UnknownLayer(String),
    #[error("Registry has no graph layer for {0}")]
    MissingGraphLayer(String),
    #[error("Layer registry unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Persisted layer metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMeta {
    pub id: String,
    pub name: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// Graph layer name for a registry entry.
pub fn graph_layer_name(meta_id: &str) -> String {
    format!("layer_{meta_id}")
}

/// Registry id encoded in a graph layer name, if it follows the `layer_{id}` scheme.
pub fn meta_id_from_graph_name(name: &str) -> Option<&str> {
    name.strip_prefix("layer_")
}

/// External source of truth for layer metadata.
pub trait LayerRegistry {
    /// Id of the layer the registry considers active.
    fn active_layer_id(&self) -> Option<String>;

    /// Make sure some layer is active and exists in `graph`; returns its id.
    fn ensure_active_layer(&mut self, graph: &mut SceneGraph) -> Result<String, LayerError>;

    fn activate_layer(&mut self, id: &str) -> Result<(), LayerError>;

    /// Create a layer (and its graph layer). Returns the new id.
    fn create_layer(
        &mut self,
        graph: &mut SceneGraph,
        name: Option<&str>,
        activate: bool,
    ) -> Result<String, LayerError>;

    fn layers(&self) -> Vec<LayerMeta>;

    /// Replace all metadata, as when restoring persisted content.
    fn replace(&mut self, layers: Vec<LayerMeta>, active: Option<String>);
}

/// Default in-process registry.
#[derive(Debug, Clone, Default)]
pub struct LayerStore {
    metas: Vec<LayerMeta>,
    active: Option<String>,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn graph_layer(&self, graph: &mut SceneGraph, meta: &LayerMeta) -> LayerId {
        let name = graph_layer_name(&meta.id);
        match graph.layer_by_name(&name) {
            Some(id) => id,
            None => {
                let id = graph.add_layer(name);
                if let Err(e) = graph.set_layer_visible(id, meta.visible) {
                    log::warn!("Could not set visibility of {}: {e}", meta.id);
                }
                id
            }
        }
    }
}

impl LayerRegistry for LayerStore {
    fn active_layer_id(&self) -> Option<String> {
        self.active.clone()
    }

    fn ensure_active_layer(&mut self, graph: &mut SceneGraph) -> Result<String, LayerError> {
        let active = self
            .active
            .as_ref()
            .and_then(|id| self.metas.iter().find(|m| &m.id == id))
            .or_else(|| self.metas.first())
            .cloned();
        match active {
            Some(meta) => {
                self.graph_layer(graph, &meta);
                self.active = Some(meta.id.clone());
                Ok(meta.id)
            }
            None => self.create_layer(graph, None, true),
        }
    }

    fn activate_layer(&mut self, id: &str) -> Result<(), LayerError> {
        if !self.metas.iter().any(|m| m.id == id) {
            return Err(LayerError::UnknownLayer(id.to_string()));
        }
        self.active = Some(id.to_string());
        Ok(())
    }

    fn create_layer(
        &mut self,
        graph: &mut SceneGraph,
        name: Option<&str>,
        activate: bool,
    ) -> Result<String, LayerError> {
        let meta = LayerMeta {
            id: Uuid::new_v4().simple().to_string(),
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| format!("Layer {}", self.metas.len() + 1)),
            visible: true,
        };
        self.graph_layer(graph, &meta);
        let id = meta.id.clone();
        self.metas.push(meta);
        if activate {
            self.active = Some(id.clone());
        }
        Ok(id)
    }

    fn layers(&self) -> Vec<LayerMeta> {
        self.metas.clone()
    }

    fn replace(&mut self, layers: Vec<LayerMeta>, active: Option<String>) {
        self.active = active.filter(|id| layers.iter().any(|m| &m.id == id));
        self.metas = layers;
    }
}

/// A graph layer tagged with the graph instance that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerHandle {
    pub graph: GraphId,
    pub layer: LayerId,
}

impl LayerHandle {
    /// Whether the layer still belongs to `graph`. The identity check comes first.
    pub fn is_attached(&self, graph: &SceneGraph) -> bool {
        self.graph == graph.graph_id() && graph.layer(self.layer).is_some()
    }
}

/// Resolves the layer new items attach to.
pub struct LayerManager {
    registry: Box<dyn LayerRegistry>,
    fallback: Option<LayerHandle>,
}

impl std::fmt::Debug for LayerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerManager")
            .field("active", &self.registry.active_layer_id())
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new(Box::new(LayerStore::new()))
    }
}

impl LayerManager {
    pub fn new(registry: Box<dyn LayerRegistry>) -> Self {
        Self {
            registry,
            fallback: None,
        }
    }

    pub fn registry(&self) -> &dyn LayerRegistry {
        self.registry.as_ref()
    }

    pub fn registry_mut(&mut self) -> &mut dyn LayerRegistry {
        self.registry.as_mut()
    }

    /// Return a usable layer, activating it in `graph`.
    pub fn ensure_active_layer(&mut self, graph: &mut SceneGraph) -> LayerId {
        match self.resolve_registered(graph) {
            Ok(layer) => {
                if graph.activate_layer(layer).is_ok() {
                    return layer;
                }
                log::warn!("Registered layer {layer:?} vanished during activation");
            }
            Err(e) => log::warn!("Layer registry failed, using fallback layer: {e}"),
        }
        self.fallback_layer(graph)
    }

    fn resolve_registered(&mut self, graph: &mut SceneGraph) -> Result<LayerId, LayerError> {
        if let Some(meta_id) = self.registry.active_layer_id() {
            if let Some(layer) = graph.layer_by_name(&graph_layer_name(&meta_id)) {
                self.registry.activate_layer(&meta_id)?;
                return Ok(layer);
            }
        }
        let meta_id = self.registry.ensure_active_layer(graph)?;
        graph
            .layer_by_name(&graph_layer_name(&meta_id))
            .ok_or(LayerError::MissingGraphLayer(meta_id))
    }

    fn fallback_layer(&mut self, graph: &mut SceneGraph) -> LayerId {
        if let Some(handle) = self.fallback {
            if handle.is_attached(graph) {
                if let Err(e) = graph.activate_layer(handle.layer) {
                    log::warn!("Could not activate fallback layer: {e}");
                }
                return handle.layer;
            }
            log::debug!("Fallback layer detached, creating a new one");
        }
        let layer = match graph.layer_by_name(GRID_LAYER) {
            Some(grid) => graph
                .insert_layer_above(FALLBACK_LAYER, grid)
                .unwrap_or_else(|_| graph.add_layer(FALLBACK_LAYER)),
            None => graph.add_layer(FALLBACK_LAYER),
        };
        if let Err(e) = graph.activate_layer(layer) {
            log::warn!("Could not activate fallback layer: {e}");
        }
        self.fallback = Some(LayerHandle {
            graph: graph.graph_id(),
            layer,
        });
        layer
    }

    /// Create a registry layer and make it active.
    pub fn create_layer(
        &mut self,
        graph: &mut SceneGraph,
        name: Option<&str>,
        activate: bool,
    ) -> Result<String, LayerError> {
        let id = self.registry.create_layer(graph, name, activate)?;
        if activate {
            if let Some(layer) = graph.layer_by_name(&graph_layer_name(&id)) {
                graph.activate_layer(layer)?;
            }
        }
        Ok(id)
    }

    /// Mirror registry visibility flags onto graph layers.
    pub fn sync_visibility(&self, graph: &mut SceneGraph) {
        for meta in self.registry.layers() {
            if let Some(layer) = graph.layer_by_name(&graph_layer_name(&meta.id)) {
                if let Err(e) = graph.set_layer_visible(layer, meta.visible) {
                    log::warn!("Could not set visibility of {}: {e}", meta.id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Geometry, ItemKind, ItemSpec};

    struct BrokenRegistry;

    impl LayerRegistry for BrokenRegistry {
        fn active_layer_id(&self) -> Option<String> {
            None
        }
        fn ensure_active_layer(&mut self, _: &mut SceneGraph) -> Result<String, LayerError> {
            Err(LayerError::Unavailable("offline".into()))
        }
        fn activate_layer(&mut self, id: &str) -> Result<(), LayerError> {
            Err(LayerError::UnknownLayer(id.into()))
        }
        fn create_layer(
            &mut self,
            _: &mut SceneGraph,
            _: Option<&str>,
            _: bool,
        ) -> Result<String, LayerError> {
            Err(LayerError::Unavailable("offline".into()))
        }
        fn layers(&self) -> Vec<LayerMeta> {
            Vec::new()
        }
        fn replace(&mut self, _: Vec<LayerMeta>, _: Option<String>) {}
    }

    #[test]
    fn test_store_creates_first_layer() {
        let mut graph = SceneGraph::new();
        let mut manager = LayerManager::default();
        let layer = manager.ensure_active_layer(&mut graph);
        assert_eq!(graph.active_layer(), Some(layer));
        let meta_id = manager.registry().active_layer_id().unwrap();
        assert_eq!(graph.layer_by_name(&graph_layer_name(&meta_id)), Some(layer));

        // Stable across calls
        assert_eq!(manager.ensure_active_layer(&mut graph), layer);
        assert_eq!(graph.layers().len(), 1);
    }

    #[test]
    fn test_registry_layer_is_rematerialized_in_new_graph() {
        let mut graph = SceneGraph::new();
        let mut manager = LayerManager::default();
        manager.ensure_active_layer(&mut graph);
        let meta_id = manager.registry().active_layer_id().unwrap();

        let mut fresh = SceneGraph::new();
        let layer = manager.ensure_active_layer(&mut fresh);
        assert_eq!(fresh.layer_by_name(&graph_layer_name(&meta_id)), Some(layer));
    }

    #[test]
    fn test_fallback_sits_above_grid_and_is_reused() {
        let mut graph = SceneGraph::new();
        let grid = graph.add_layer(GRID_LAYER);
        graph.add_layer("overlay");
        let mut manager = LayerManager::new(Box::new(BrokenRegistry));

        let layer = manager.ensure_active_layer(&mut graph);
        assert_eq!(graph.layers()[0].id, grid);
        assert_eq!(graph.layers()[1].id, layer);
        assert_eq!(graph.active_layer(), Some(layer));

        assert_eq!(manager.ensure_active_layer(&mut graph), layer);
        assert_eq!(graph.layers().len(), 3);
    }

    #[test]
    fn test_fallback_detached_when_graph_replaced() {
        let mut graph = SceneGraph::new();
        let mut manager = LayerManager::new(Box::new(BrokenRegistry));
        let first = manager.ensure_active_layer(&mut graph);
        graph
            .insert(first, ItemSpec::new(ItemKind::Drawing, Geometry::Group))
            .unwrap();

        // Same layer ids exist in the rebuilt graph, but it is a different graph.
        let mut rebuilt = SceneGraph::from_json(&graph.to_json().unwrap()).unwrap();
        assert!(rebuilt.layer(first).is_some());
        let second = manager.ensure_active_layer(&mut rebuilt);
        assert_ne!(second, first);
        assert_eq!(rebuilt.layers().len(), 2);
    }

    #[test]
    fn test_fallback_after_layer_removed() {
        let mut graph = SceneGraph::new();
        let mut manager = LayerManager::new(Box::new(BrokenRegistry));
        let first = manager.ensure_active_layer(&mut graph);
        graph.remove_layer(first).unwrap();
        let second = manager.ensure_active_layer(&mut graph);
        assert_ne!(first, second);
        assert!(graph.layer(second).is_some());
    }

    #[test]
    fn test_replace_drops_unknown_active() {
        let mut store = LayerStore::new();
        store.replace(
            vec![LayerMeta {
                id: "a".into(),
                name: "A".into(),
                visible: true,
            }],
            Some("zzz".into()),
        );
        assert_eq!(store.active_layer_id(), None);
        let mut graph = SceneGraph::new();
        assert_eq!(store.ensure_active_layer(&mut graph).unwrap(), "a");
    }

    #[test]
    fn test_sync_visibility() {
        let mut graph = SceneGraph::new();
        let mut manager = LayerManager::default();
        let layer = manager.ensure_active_layer(&mut graph);
        let mut metas = manager.registry().layers();
        metas[0].visible = false;
        let active = manager.registry().active_layer_id();
        manager.registry_mut().replace(metas, active);
        manager.sync_visibility(&mut graph);
        assert!(!graph.is_layer_visible(layer));
    }
}
