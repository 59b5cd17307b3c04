//! Canvas state shared by every tool subsystem.

use crate::assets::{
    AssetInstance, AssetKind, AssetSnapshots, ImageAssetSnapshot, InstanceRegistry,
    ModelAssetSnapshot, TextAssetSnapshot,
};
use crate::camera::Camera;
use crate::config::EditorConfig;
use crate::events::{EditorEvent, EventBus};
use crate::layer::{LayerManager, LayerRegistry, meta_id_from_graph_name};
use crate::scene::{
    Geometry, ItemId, ItemKind, ItemSpec, ItemStyle, LayerId, PathData, PlaceholderKind,
    SceneError, SceneGraph, SceneItem, TextData,
};
use crate::selection::SelectionState;
use crate::storage::{CanvasView, ContentMeta, ProjectContent};
use chrono::Utc;
use kurbo::{Point, Rect, Vec2};
use uuid::Uuid;

/// Live editing state: scene, camera, selection and side records.
#[derive(Debug)]
pub struct Canvas {
    pub scene: SceneGraph,
    pub camera: Camera,
    pub selection: SelectionState,
    pub instances: InstanceRegistry,
    pub layers: LayerManager,
    pub events: EventBus,
    pub config: EditorConfig,
    /// Style applied to newly drawn paths.
    pub style: ItemStyle,
    version: u64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Canvas {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            scene: SceneGraph::new(),
            camera: Camera::new(),
            selection: SelectionState::default(),
            instances: InstanceRegistry::new(),
            layers: LayerManager::default(),
            events: EventBus::new(),
            config,
            style: ItemStyle::default(),
            version: 0,
        }
    }

    pub fn with_registry(config: EditorConfig, registry: Box<dyn LayerRegistry>) -> Self {
        Self {
            layers: LayerManager::new(registry),
            ..Self::new(config)
        }
    }

    /// Convert a screen-space tolerance to world units.
    pub fn tolerance(&self, screen_px: f64) -> f64 {
        screen_px / self.camera.zoom
    }

    pub fn content_version(&self) -> u64 {
        self.version
    }

    pub fn bump_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    pub fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    pub fn active_layer(&mut self) -> LayerId {
        self.layers.ensure_active_layer(&mut self.scene)
    }

    // --- item creation ------------------------------------------------------

    pub fn add_item(&mut self, spec: ItemSpec) -> Result<ItemId, SceneError> {
        let layer = self.active_layer();
        self.scene.insert(layer, spec)
    }

    pub fn add_path(&mut self, path: PathData) -> Result<ItemId, SceneError> {
        let spec = ItemSpec::new(ItemKind::Drawing, Geometry::Path(path)).with_style(self.style.clone());
        self.add_item(spec)
    }

    /// Add an image or model item and register its instance record.
    pub fn add_asset(
        &mut self,
        kind: AssetKind,
        asset_id: &str,
        source: &str,
        bounds: Rect,
    ) -> Result<ItemId, SceneError> {
        let layer = self.active_layer();
        self.insert_asset(layer, kind, asset_id, source, bounds)
    }

    fn insert_asset(
        &mut self,
        layer: LayerId,
        kind: AssetKind,
        asset_id: &str,
        source: &str,
        bounds: Rect,
    ) -> Result<ItemId, SceneError> {
        let item_kind = match kind {
            AssetKind::Image => ItemKind::Image,
            AssetKind::Model3d => ItemKind::Model3d,
        };
        let id = self.scene.insert(
            layer,
            ItemSpec::new(item_kind, Geometry::Frame(bounds)).with_correlation(asset_id),
        )?;
        let layer_id = self.layer_meta_id(id);
        self.instances.upsert(AssetInstance {
            id: asset_id.to_string(),
            kind,
            source: source.to_string(),
            layer_id,
            is_selected: false,
        });
        Ok(id)
    }

    /// Add a text item. Returns the item and its stable text id.
    pub fn add_text(&mut self, position: Point, content: &str) -> Result<(ItemId, String), SceneError> {
        let text_id = Uuid::new_v4().to_string();
        let spec = ItemSpec::new(ItemKind::Text, Geometry::Text(TextData::new(position, content)))
            .with_correlation(text_id.clone());
        let id = self.add_item(spec)?;
        Ok((id, text_id))
    }

    /// Add a placeholder group with a dashed outline child.
    pub fn add_placeholder(&mut self, kind: PlaceholderKind, bounds: Rect) -> Result<ItemId, SceneError> {
        let group = self.add_item(ItemSpec::new(ItemKind::Placeholder(kind), Geometry::Group))?;
        self.scene.insert_child(
            group,
            ItemSpec::new(ItemKind::Drawing, Geometry::Path(PathData::rectangle(bounds)))
                .with_style(ItemStyle::outline()),
        )?;
        Ok(group)
    }

    /// Replace an uploaded placeholder with the real image or model item.
    pub fn complete_upload(
        &mut self,
        placeholder: ItemId,
        asset_id: &str,
        source: &str,
    ) -> Result<ItemId, SceneError> {
        let item = self
            .scene
            .get(placeholder)
            .ok_or(SceneError::UnknownItem(placeholder))?;
        let (layer, kind) = match item.kind {
            ItemKind::Placeholder(PlaceholderKind::Image) => (item.layer, AssetKind::Image),
            ItemKind::Placeholder(PlaceholderKind::Model3d) => (item.layer, AssetKind::Model3d),
            _ => return Err(SceneError::WrongGeometry(placeholder, "placeholder")),
        };
        let bounds = self
            .scene
            .bounds(placeholder)
            .ok_or(SceneError::UnknownItem(placeholder))?;
        self.remove_item(placeholder)?;
        let id = self.insert_asset(layer, kind, asset_id, source, bounds)?;
        if kind == AssetKind::Image {
            self.events.emit(EditorEvent::CachedImageChanged {
                image_id: asset_id.to_string(),
            });
        }
        log::info!("Placeholder {placeholder} replaced by {} {asset_id}", kind_name(kind));
        Ok(id)
    }

    // --- removal ------------------------------------------------------------

    /// Remove an item and its subtree, evicting every removed id from the
    /// selection and the instance registry before returning.
    pub fn remove_item(&mut self, id: ItemId) -> Result<Vec<SceneItem>, SceneError> {
        let removed = self.scene.remove(id)?;
        let mut evicted = false;
        for item in &removed {
            evicted |= self.selection.evict(item.id, item.correlation.as_deref());
            if matches!(item.kind, ItemKind::Image | ItemKind::Model3d) {
                if let Some(corr) = &item.correlation {
                    self.instances.remove(corr);
                }
            }
        }
        if evicted {
            self.events.emit(EditorEvent::SelectionChanged);
        }
        Ok(removed)
    }

    /// Delete selected paths, images and models. Returns whether anything was removed.
    pub fn delete_selected(&mut self) -> bool {
        let mut deleted = false;

        for id in self.selection.path_ids() {
            match self.remove_item(id) {
                Ok(_) => deleted = true,
                Err(e) => log::warn!("Failed to delete path {id}: {e}"),
            }
        }

        for kind in [AssetKind::Image, AssetKind::Model3d] {
            let explicit = match kind {
                AssetKind::Image => self.selection.images.clone(),
                AssetKind::Model3d => self.selection.models.clone(),
            };
            let ids = if explicit.is_empty() {
                self.instances.flagged(kind)
            } else {
                explicit
            };
            for asset_id in ids {
                deleted |= self.delete_asset(&asset_id);
            }
        }

        deleted
    }

    fn delete_asset(&mut self, asset_id: &str) -> bool {
        match self.scene.find_by_correlation(asset_id) {
            Some(item) => match self.remove_item(item) {
                Ok(_) => true,
                Err(e) => {
                    log::warn!("Failed to delete asset {asset_id}: {e}");
                    false
                }
            },
            None => self.instances.remove(asset_id).is_some(),
        }
    }

    // --- selection ----------------------------------------------------------

    /// Clear every selection set, restoring highlights and removing helpers.
    pub fn clear_selection(&mut self) {
        if self.selection.is_empty() {
            return;
        }
        for id in self.selection.path_ids() {
            if let Some(item) = self.scene.get_mut(id) {
                item.unhighlight();
                item.full_selected = false;
            }
        }
        let assets: Vec<String> = self
            .selection
            .images
            .iter()
            .chain(self.selection.models.iter())
            .cloned()
            .collect();
        for asset_id in assets {
            if let Some(item) = self.scene.find_by_correlation(&asset_id) {
                self.scene.detach_helpers(item);
            }
        }
        self.instances.clear_selected();
        self.selection.clear();
        self.events.emit(EditorEvent::SelectionChanged);
    }

    /// Add an image or model to the selection and show its handles.
    pub fn select_asset(&mut self, kind: AssetKind, asset_id: &str) {
        let list = match kind {
            AssetKind::Image => &mut self.selection.images,
            AssetKind::Model3d => &mut self.selection.models,
        };
        if !list.iter().any(|i| i == asset_id) {
            list.push(asset_id.to_string());
        }
        self.instances.set_selected(asset_id, true);
        if let Some(item) = self.scene.find_by_correlation(asset_id) {
            if let Err(e) = self.scene.attach_selection_helpers(item) {
                log::warn!("Could not attach handles to {asset_id}: {e}");
            }
        }
        self.events.emit(EditorEvent::SelectionChanged);
    }

    /// Select a path with the +1 stroke highlight. An editable selection also
    /// shows all control points and becomes the path-editing target.
    pub fn select_path(&mut self, id: ItemId, editable: bool) {
        let Some(item) = self.scene.get_mut(id) else {
            return;
        };
        item.highlight();
        if editable {
            item.full_selected = true;
            self.selection.editable_path = Some(id);
        }
        if !self.selection.paths.contains(&id) {
            self.selection.paths.push(id);
        }
        self.events.emit(EditorEvent::SelectionChanged);
    }

    pub fn deselect_path(&mut self, id: ItemId) {
        if let Some(item) = self.scene.get_mut(id) {
            item.unhighlight();
            item.full_selected = false;
        }
        if self.selection.evict(id, None) {
            self.events.emit(EditorEvent::SelectionChanged);
        }
    }

    /// Select a text item, replacing any other text selection.
    pub fn select_text(&mut self, text_id: &str) {
        self.selection.texts.clear();
        self.selection.texts.push(text_id.to_string());
        self.events.emit(EditorEvent::SelectionChanged);
    }

    pub fn deselect_texts(&mut self) {
        if !self.selection.texts.is_empty() {
            self.selection.texts.clear();
            self.events.emit(EditorEvent::SelectionChanged);
        }
    }

    // --- persistence --------------------------------------------------------

    fn layer_meta_id(&self, item: ItemId) -> Option<String> {
        self.scene
            .layer_name_of(item)
            .and_then(meta_id_from_graph_name)
            .map(str::to_string)
    }

    /// Side records for every image, model and text item in the scene.
    pub fn asset_snapshots(&self) -> AssetSnapshots {
        let mut assets = AssetSnapshots::default();
        let mut items: Vec<&SceneItem> = self.scene.items().collect();
        items.sort_by_key(|i| i.id);
        for item in items {
            let (Some(corr), Some(bounds)) = (&item.correlation, self.scene.bounds(item.id)) else {
                continue;
            };
            let layer_id = self.layer_meta_id(item.id);
            let source = || {
                self.instances
                    .get(corr)
                    .map(|i| i.source.clone())
                    .unwrap_or_default()
            };
            match &item.geometry {
                Geometry::Frame(_) if item.kind == ItemKind::Image => {
                    assets.images.push(ImageAssetSnapshot {
                        id: corr.clone(),
                        source: source(),
                        bounds: bounds.into(),
                        layer_id,
                    })
                }
                Geometry::Frame(_) if item.kind == ItemKind::Model3d => {
                    assets.models.push(ModelAssetSnapshot {
                        id: corr.clone(),
                        source: source(),
                        bounds: bounds.into(),
                        layer_id,
                    })
                }
                Geometry::Text(text) => assets.texts.push(TextAssetSnapshot {
                    id: corr.clone(),
                    content: text.content.clone(),
                    font_size: text.font_size,
                    bounds: bounds.into(),
                    layer_id,
                }),
                _ => {}
            }
        }
        assets
    }

    /// Persistable form of the current state.
    pub fn export_content(&self) -> Result<ProjectContent, SceneError> {
        let scene_json = self.scene.to_json()?;
        let now = Utc::now();
        Ok(ProjectContent {
            layers: self.layers.registry().layers(),
            active_layer_id: self.layers.registry().active_layer_id(),
            canvas: CanvasView {
                zoom: self.camera.zoom,
                pan_x: self.camera.offset.x,
                pan_y: self.camera.offset.y,
            },
            meta: Some(ContentMeta {
                paper_json_len: scene_json.len(),
                layer_count: self.scene.layers().len(),
                item_count: self.scene.item_count(),
                saved_at: now,
            }),
            scene_json: Some(scene_json),
            assets: Some(self.asset_snapshots()),
            updated_at: now,
        })
    }

    /// Replace the live state with `content`. The new scene is fully built
    /// before anything is swapped, so a failure leaves the canvas untouched.
    pub fn install_content(&mut self, content: &ProjectContent) -> Result<(), SceneError> {
        let scene = match &content.scene_json {
            Some(json) => SceneGraph::from_json(json)?,
            None => SceneGraph::new(),
        };

        self.scene = scene;
        self.selection = SelectionState::default();
        self.layers
            .registry_mut()
            .replace(content.layers.clone(), content.active_layer_id.clone());
        self.layers.sync_visibility(&mut self.scene);
        self.camera
            .set_view(content.canvas.zoom, Vec2::new(content.canvas.pan_x, content.canvas.pan_y));

        self.instances.clear();
        if let Some(assets) = &content.assets {
            for image in &assets.images {
                self.instances.upsert(AssetInstance {
                    id: image.id.clone(),
                    kind: AssetKind::Image,
                    source: image.source.clone(),
                    layer_id: image.layer_id.clone(),
                    is_selected: false,
                });
            }
            for model in &assets.models {
                self.instances.upsert(AssetInstance {
                    id: model.id.clone(),
                    kind: AssetKind::Model3d,
                    source: model.source.clone(),
                    layer_id: model.layer_id.clone(),
                    is_selected: false,
                });
            }
        }
        Ok(())
    }
}

fn kind_name(kind: AssetKind) -> &'static str {
    match kind {
        AssetKind::Image => "image",
        AssetKind::Model3d => "3d-model",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_add_path_uses_active_layer() {
        let mut canvas = Canvas::default();
        let id = canvas
            .add_path(PathData::rectangle(Rect::new(0.0, 0.0, 10.0, 10.0)))
            .unwrap();
        let layer = canvas.scene.get(id).unwrap().layer;
        assert_eq!(canvas.scene.active_layer(), Some(layer));
        assert!(canvas.scene.layer_name_of(id).unwrap().starts_with("layer_"));
    }

    #[test]
    fn test_remove_evicts_selection() {
        let mut canvas = Canvas::default();
        let path = canvas
            .add_path(PathData::rectangle(Rect::new(0.0, 0.0, 10.0, 10.0)))
            .unwrap();
        let image = canvas
            .add_asset(AssetKind::Image, "img-1", "a.png", Rect::new(0.0, 0.0, 5.0, 5.0))
            .unwrap();
        canvas.select_path(path, true);
        canvas.select_asset(AssetKind::Image, "img-1");

        canvas.remove_item(path).unwrap();
        assert_eq!(canvas.selection.editable_path, None);
        assert!(canvas.selection.paths.is_empty());

        canvas.remove_item(image).unwrap();
        assert!(canvas.selection.images.is_empty());
        assert!(canvas.instances.get("img-1").is_none());
    }

    #[test]
    fn test_delete_selected_falls_back_to_flags() {
        let mut canvas = Canvas::default();
        canvas
            .add_asset(AssetKind::Image, "img-1", "a.png", Rect::new(0.0, 0.0, 5.0, 5.0))
            .unwrap();
        canvas.instances.set_selected("img-1", true);
        assert!(canvas.selection.images.is_empty());

        assert!(canvas.delete_selected());
        assert!(canvas.scene.find_by_correlation("img-1").is_none());
        assert!(!canvas.delete_selected());
    }

    #[test]
    fn test_clear_selection_restores_highlight() {
        let mut canvas = Canvas::default();
        let path = canvas
            .add_path(PathData::rectangle(Rect::new(0.0, 0.0, 10.0, 10.0)))
            .unwrap();
        let base = canvas.scene.get(path).unwrap().style.stroke_width;
        canvas.select_path(path, true);
        assert!((canvas.scene.get(path).unwrap().style.stroke_width - (base + 1.0)).abs() < f64::EPSILON);
        canvas.clear_selection();
        let item = canvas.scene.get(path).unwrap();
        assert!((item.style.stroke_width - base).abs() < f64::EPSILON);
        assert!(!item.full_selected);
    }

    #[test]
    fn test_complete_upload_replaces_placeholder() {
        let mut canvas = Canvas::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        canvas.events.subscribe(move |e| {
            if let EditorEvent::CachedImageChanged { image_id } = e {
                sink.borrow_mut().push(image_id.clone());
            }
        });
        let bounds = Rect::new(10.0, 10.0, 60.0, 40.0);
        let ph = canvas.add_placeholder(PlaceholderKind::Image, bounds).unwrap();
        let image = canvas.complete_upload(ph, "img-9", "https://x/img.png").unwrap();

        assert!(!canvas.scene.contains(ph));
        assert_eq!(canvas.scene.bounds(image), Some(bounds));
        assert_eq!(canvas.instances.get("img-9").unwrap().source, "https://x/img.png");
        assert_eq!(*seen.borrow(), vec!["img-9".to_string()]);
    }

    #[test]
    fn test_export_install_roundtrip() {
        let mut canvas = Canvas::default();
        canvas
            .add_asset(AssetKind::Model3d, "m-1", "robot.glb", Rect::new(0.0, 0.0, 30.0, 30.0))
            .unwrap();
        canvas.add_text(Point::new(5.0, 50.0), "hello").unwrap();
        canvas.camera.set_view(2.0, Vec2::new(3.0, 4.0));
        let content = canvas.export_content().unwrap();
        let assets = content.assets.clone().unwrap();
        assert_eq!(assets.models.len(), 1);
        assert_eq!(assets.texts.len(), 1);
        assert!(assets.models[0].layer_id.is_some());

        let mut other = Canvas::default();
        other.install_content(&content).unwrap();
        assert_eq!(other.scene.to_json().unwrap(), canvas.scene.to_json().unwrap());
        assert!((other.camera.zoom - 2.0).abs() < f64::EPSILON);
        assert_eq!(other.instances.get("m-1").unwrap().source, "robot.glb");
        assert_eq!(other.layers.registry().active_layer_id(), content.active_layer_id);
    }

    #[test]
    fn test_install_bad_content_leaves_canvas_untouched() {
        let mut canvas = Canvas::default();
        canvas
            .add_path(PathData::rectangle(Rect::new(0.0, 0.0, 10.0, 10.0)))
            .unwrap();
        let before = canvas.scene.to_json().unwrap();
        let mut content = canvas.export_content().unwrap();
        content.scene_json = Some("{not json".into());
        assert!(canvas.install_content(&content).is_err());
        assert_eq!(canvas.scene.to_json().unwrap(), before);
    }
}
