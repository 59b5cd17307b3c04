//! Arena-backed scene graph of layers and items.
//!
//! Items live in slots keyed by a stable [`ItemId`]. Parent/child links are
//! ids, never references, and a side index resolves an id to its slot in
//! constant time. Helper items (handles, borders, selection areas) are stored
//! in the same arena but are never serialized.

mod item;
mod path;
mod text;

pub use item::{
    Corner, Geometry, HelperKind, ItemId, ItemKind, ItemSpec, ItemStyle, LayerId, PlaceholderKind,
    SceneItem, SerializableColor,
};
pub use path::{PathCurve, PathData, point_to_polyline_dist, point_to_segment_dist};
pub use text::TextData;

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Name of the reserved background layer.
pub const GRID_LAYER: &str = "grid";
/// Side length of a resize handle in world units.
pub const HANDLE_SIZE: f64 = 8.0;

/// Scene graph errors.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),
    #[error("Unknown layer: {0:?}")]
    UnknownLayer(LayerId),
    #[error("Item {0} cannot own children")]
    InvalidParent(ItemId),
    #[error("Item {0} has no {1} geometry")]
    WrongGeometry(ItemId, &'static str),
    #[error("Inconsistent scene document: {0}")]
    Corrupt(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Identity of one live graph instance. A new identity is minted whenever a
/// graph is built from scratch or from a serialized document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphId(Uuid);

impl GraphId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// An ordered, named container of top-level items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLayer {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    /// Top-level items, back to front.
    pub items: Vec<ItemId>,
}

/// Which part of an item a hit landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitPart {
    Segment(usize),
    Stroke,
    Fill,
    Bounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub item: ItemId,
    pub part: HitPart,
}

/// What a hit test should consider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HitOptions {
    pub tolerance: f64,
    pub segments: bool,
    pub stroke: bool,
    pub fill: bool,
    pub bounds: bool,
}

impl HitOptions {
    pub fn stroke(tolerance: f64) -> Self {
        Self {
            tolerance,
            stroke: true,
            ..Self::default()
        }
    }

    pub fn bounds(tolerance: f64) -> Self {
        Self {
            tolerance,
            bounds: true,
            ..Self::default()
        }
    }

    pub fn with_fill(mut self) -> Self {
        self.fill = true;
        self
    }

    pub fn with_segments(mut self) -> Self {
        self.segments = true;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SceneDocument {
    active_layer: Option<LayerId>,
    layers: Vec<GraphLayer>,
    items: Vec<SceneItem>,
}

/// The live scene.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    graph_id: GraphId,
    layers: Vec<GraphLayer>,
    active_layer: Option<LayerId>,
    slots: Vec<Option<SceneItem>>,
    free: Vec<usize>,
    index: HashMap<ItemId, usize>,
    correlation_index: HashMap<String, ItemId>,
    next_item: u64,
    next_layer: u32,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            graph_id: GraphId::new(),
            layers: Vec::new(),
            active_layer: None,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            correlation_index: HashMap::new(),
            next_item: 1,
            next_layer: 1,
        }
    }

    pub fn graph_id(&self) -> GraphId {
        self.graph_id
    }

    // --- layers -------------------------------------------------------------

    /// Layers, bottom to top.
    pub fn layers(&self) -> &[GraphLayer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&GraphLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    fn layer_mut(&mut self, id: LayerId) -> Option<&mut GraphLayer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn layer_by_name(&self, name: &str) -> Option<LayerId> {
        self.layers.iter().find(|l| l.name == name).map(|l| l.id)
    }

    /// Append a layer on top of all others.
    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        let id = self.alloc_layer_id();
        self.layers.push(GraphLayer {
            id,
            name: name.into(),
            visible: true,
            items: Vec::new(),
        });
        id
    }

    /// Insert a layer directly above `below`.
    pub fn insert_layer_above(
        &mut self,
        name: impl Into<String>,
        below: LayerId,
    ) -> Result<LayerId, SceneError> {
        let pos = self
            .layers
            .iter()
            .position(|l| l.id == below)
            .ok_or(SceneError::UnknownLayer(below))?;
        let id = self.alloc_layer_id();
        self.layers.insert(
            pos + 1,
            GraphLayer {
                id,
                name: name.into(),
                visible: true,
                items: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Remove a layer and everything on it.
    pub fn remove_layer(&mut self, id: LayerId) -> Result<Vec<SceneItem>, SceneError> {
        let pos = self
            .layers
            .iter()
            .position(|l| l.id == id)
            .ok_or(SceneError::UnknownLayer(id))?;
        let layer = self.layers.remove(pos);
        let mut removed = Vec::new();
        for item in layer.items {
            self.remove_subtree(item, &mut removed);
        }
        if self.active_layer == Some(id) {
            self.active_layer = None;
        }
        Ok(removed)
    }

    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> Result<(), SceneError> {
        let layer = self.layer_mut(id).ok_or(SceneError::UnknownLayer(id))?;
        layer.visible = visible;
        Ok(())
    }

    /// Missing layers count as invisible.
    pub fn is_layer_visible(&self, id: LayerId) -> bool {
        self.layer(id).is_some_and(|l| l.visible)
    }

    pub fn activate_layer(&mut self, id: LayerId) -> Result<(), SceneError> {
        if self.layer(id).is_none() {
            return Err(SceneError::UnknownLayer(id));
        }
        self.active_layer = Some(id);
        Ok(())
    }

    pub fn active_layer(&self) -> Option<LayerId> {
        self.active_layer
    }

    fn alloc_layer_id(&mut self) -> LayerId {
        let id = LayerId(self.next_layer);
        self.next_layer += 1;
        id
    }

    // --- items --------------------------------------------------------------

    fn alloc_item_id(&mut self) -> ItemId {
        let id = ItemId(self.next_item);
        self.next_item += 1;
        id
    }

    fn store(&mut self, item: SceneItem) {
        let id = item.id;
        if let Some(corr) = &item.correlation {
            self.correlation_index.insert(corr.clone(), id);
        }
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(item);
                slot
            }
            None => {
                self.slots.push(Some(item));
                self.slots.len() - 1
            }
        };
        self.index.insert(id, slot);
    }

    fn build_item(&mut self, layer: LayerId, parent: Option<ItemId>, spec: ItemSpec) -> SceneItem {
        SceneItem {
            id: self.alloc_item_id(),
            kind: spec.kind,
            layer,
            parent,
            children: Vec::new(),
            correlation: spec.correlation,
            geometry: spec.geometry,
            style: spec.style,
            full_selected: false,
            highlight_base: None,
            edit_opacity: None,
            transient: false,
        }
    }

    /// Insert a top-level item on `layer`, above its existing items.
    pub fn insert(&mut self, layer: LayerId, spec: ItemSpec) -> Result<ItemId, SceneError> {
        if self.layer(layer).is_none() {
            return Err(SceneError::UnknownLayer(layer));
        }
        let item = self.build_item(layer, None, spec);
        let id = item.id;
        self.store(item);
        if let Some(l) = self.layer_mut(layer) {
            l.items.push(id);
        }
        Ok(id)
    }

    /// Insert an item as the last child of `parent`, on the parent's layer.
    pub fn insert_child(&mut self, parent: ItemId, spec: ItemSpec) -> Result<ItemId, SceneError> {
        let parent_item = self.get(parent).ok_or(SceneError::UnknownItem(parent))?;
        if parent_item.kind.is_helper() {
            return Err(SceneError::InvalidParent(parent));
        }
        let layer = parent_item.layer;
        let item = self.build_item(layer, Some(parent), spec);
        let id = item.id;
        self.store(item);
        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: ItemId) -> Option<&SceneItem> {
        self.index.get(&id).and_then(|&slot| self.slots[slot].as_ref())
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut SceneItem> {
        let slot = *self.index.get(&id)?;
        self.slots[slot].as_mut()
    }

    pub fn find_by_correlation(&self, correlation: &str) -> Option<ItemId> {
        self.correlation_index.get(correlation).copied()
    }

    pub fn items(&self) -> impl Iterator<Item = &SceneItem> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Number of persisted (non-helper) items.
    pub fn item_count(&self) -> usize {
        self.items().filter(|i| !i.kind.is_helper()).count()
    }

    /// Remove an item and its whole subtree. Returns every removed item.
    pub fn remove(&mut self, id: ItemId) -> Result<Vec<SceneItem>, SceneError> {
        let item = self.get(id).ok_or(SceneError::UnknownItem(id))?;
        let (parent, layer) = (item.parent, item.layer);
        match parent {
            Some(parent) => {
                if let Some(p) = self.get_mut(parent) {
                    p.children.retain(|&c| c != id);
                }
            }
            None => {
                if let Some(l) = self.layer_mut(layer) {
                    l.items.retain(|&c| c != id);
                }
            }
        }
        let mut removed = Vec::new();
        self.remove_subtree(id, &mut removed);
        Ok(removed)
    }

    fn remove_subtree(&mut self, id: ItemId, removed: &mut Vec<SceneItem>) {
        let Some(slot) = self.index.remove(&id) else {
            return;
        };
        let Some(item) = self.slots[slot].take() else {
            return;
        };
        self.free.push(slot);
        if let Some(corr) = &item.correlation {
            if self.correlation_index.get(corr) == Some(&id) {
                self.correlation_index.remove(corr);
            }
        }
        for &child in &item.children {
            self.remove_subtree(child, removed);
        }
        removed.push(item);
    }

    /// Ids of `id` and all its descendants, parent first.
    pub fn subtree(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(item) = self.get(next) {
                out.push(next);
                stack.extend(item.children.iter().rev());
            }
        }
        out
    }

    /// Bounds of an item. Groups use the union of their non-helper children.
    pub fn bounds(&self, id: ItemId) -> Option<Rect> {
        let item = self.get(id)?;
        match &item.geometry {
            Geometry::Path(path) => Some(path.bounds()),
            Geometry::Frame(rect) => Some(*rect),
            Geometry::Text(text) => Some(text.bounds()),
            Geometry::Group => item
                .children
                .iter()
                .filter(|&&c| self.get(c).is_some_and(|ci| !ci.kind.is_helper()))
                .filter_map(|&c| self.bounds(c))
                .reduce(|a, b| a.union(b)),
        }
    }

    /// Translate an item and all its descendants.
    pub fn translate(&mut self, id: ItemId, delta: Vec2) -> Result<(), SceneError> {
        if !self.contains(id) {
            return Err(SceneError::UnknownItem(id));
        }
        for node in self.subtree(id) {
            if let Some(item) = self.get_mut(node) {
                match &mut item.geometry {
                    Geometry::Path(path) => path.translate(delta),
                    Geometry::Frame(rect) => *rect = *rect + delta,
                    Geometry::Text(text) => text.translate(delta),
                    Geometry::Group => {}
                }
            }
        }
        Ok(())
    }

    /// Replace the frame of an image/model item and move its helpers along.
    pub fn set_frame(&mut self, id: ItemId, rect: Rect) -> Result<(), SceneError> {
        let item = self.get_mut(id).ok_or(SceneError::UnknownItem(id))?;
        match &mut item.geometry {
            Geometry::Frame(frame) => *frame = rect,
            _ => return Err(SceneError::WrongGeometry(id, "frame")),
        }
        self.sync_helpers(id);
        Ok(())
    }

    /// The layer name an item lives on.
    pub fn layer_name_of(&self, id: ItemId) -> Option<&str> {
        let item = self.get(id)?;
        self.layer(item.layer).map(|l| l.name.as_str())
    }

    /// Nearest ancestor (or self) that is a placeholder group.
    pub fn placeholder_ancestor(&self, id: ItemId) -> Option<ItemId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let item = self.get(current)?;
            if matches!(item.kind, ItemKind::Placeholder(_)) {
                return Some(current);
            }
            cursor = item.parent;
        }
        None
    }

    /// All items, topmost first: layers top to bottom, and within a layer the
    /// last drawn first with children ahead of their parent.
    pub fn reverse_z_order(&self) -> Vec<ItemId> {
        fn push_subtree(graph: &SceneGraph, id: ItemId, out: &mut Vec<ItemId>) {
            if let Some(item) = graph.get(id) {
                for &child in item.children.iter().rev() {
                    push_subtree(graph, child, out);
                }
                out.push(id);
            }
        }

        let mut out = Vec::with_capacity(self.index.len());
        for layer in self.layers.iter().rev() {
            for &id in layer.items.iter().rev() {
                push_subtree(self, id, &mut out);
            }
        }
        out
    }

    /// Topmost item on a visible layer that passes `filter` and lies under
    /// `point` according to `options`.
    pub fn hit_test(
        &self,
        point: Point,
        options: HitOptions,
        filter: impl Fn(&SceneItem) -> bool,
    ) -> Option<Hit> {
        self.reverse_z_order().into_iter().find_map(|id| {
            let item = self.get(id)?;
            if !self.is_layer_visible(item.layer) || !filter(item) {
                return None;
            }
            self.hit_item(item, point, options)
                .map(|part| Hit { item: id, part })
        })
    }

    fn hit_item(&self, item: &SceneItem, point: Point, options: HitOptions) -> Option<HitPart> {
        let tol = options.tolerance;
        match &item.geometry {
            Geometry::Path(path) => {
                if options.segments {
                    let tol_sq = tol * tol;
                    if let Some(i) = path
                        .segments
                        .iter()
                        .position(|p| (*p - point).hypot2() <= tol_sq)
                    {
                        return Some(HitPart::Segment(i));
                    }
                }
                if options.stroke
                    && path.stroke_distance(point) <= tol + item.style.stroke_width / 2.0
                {
                    return Some(HitPart::Stroke);
                }
                if options.fill && path.fill_contains(point) {
                    return Some(HitPart::Fill);
                }
                if options.bounds && path.bounds().inflate(tol, tol).contains(point) {
                    return Some(HitPart::Bounds);
                }
                None
            }
            Geometry::Frame(rect) => {
                if let ItemKind::Helper(HelperKind::ResizeHandle(_)) = item.kind {
                    let dist_sq = (rect.center() - point).hypot2();
                    return (dist_sq <= tol * tol).then_some(HitPart::Bounds);
                }
                ((options.bounds || options.fill) && rect.inflate(tol, tol).contains(point))
                    .then_some(HitPart::Bounds)
            }
            Geometry::Text(text) => ((options.bounds || options.fill)
                && text.bounds().inflate(tol, tol).contains(point))
            .then_some(HitPart::Bounds),
            Geometry::Group => {
                let bounds = self.bounds(item.id)?;
                (options.bounds && bounds.inflate(tol, tol).contains(point))
                    .then_some(HitPart::Bounds)
            }
        }
    }

    // --- helpers ------------------------------------------------------------

    /// Attach a border and four resize handles to an image or model item.
    pub fn attach_selection_helpers(&mut self, id: ItemId) -> Result<(), SceneError> {
        let bounds = self.bounds(id).ok_or(SceneError::UnknownItem(id))?;
        if self.helper_children(id).next().is_some() {
            self.sync_helpers(id);
            return Ok(());
        }
        self.insert_child(
            id,
            ItemSpec::new(
                ItemKind::Helper(HelperKind::SelectionBorder),
                Geometry::Frame(bounds),
            )
            .with_style(ItemStyle::outline()),
        )?;
        for corner in Corner::ALL {
            self.insert_child(
                id,
                ItemSpec::new(
                    ItemKind::Helper(HelperKind::ResizeHandle(corner)),
                    Geometry::Frame(handle_rect(corner.of(bounds))),
                )
                .with_style(ItemStyle::outline()),
            )?;
        }
        Ok(())
    }

    fn helper_children(&self, id: ItemId) -> impl Iterator<Item = ItemId> + '_ {
        self.get(id)
            .map(|item| item.children.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(|&c| self.get(c).is_some_and(|ci| ci.kind.is_helper()))
    }

    /// Remove every helper child of `id`.
    pub fn detach_helpers(&mut self, id: ItemId) {
        let helpers: Vec<ItemId> = self.helper_children(id).collect();
        for helper in helpers {
            if let Err(e) = self.remove(helper) {
                log::warn!("Could not detach helper {helper}: {e}");
            }
        }
    }

    /// Reposition helper children after the parent's bounds changed.
    pub fn sync_helpers(&mut self, id: ItemId) {
        let Some(bounds) = self.bounds(id) else {
            return;
        };
        let helpers: Vec<ItemId> = self.helper_children(id).collect();
        for helper in helpers {
            if let Some(item) = self.get_mut(helper) {
                match item.kind {
                    ItemKind::Helper(HelperKind::ResizeHandle(corner)) => {
                        item.geometry = Geometry::Frame(handle_rect(corner.of(bounds)));
                    }
                    ItemKind::Helper(HelperKind::SelectionBorder) => {
                        item.geometry = Geometry::Frame(bounds);
                    }
                    _ => {}
                }
            }
        }
    }

    // --- serialization ------------------------------------------------------

    /// Deterministic JSON form: items sorted by id, helpers and transient previews excluded.
    pub fn to_json(&self) -> Result<String, SceneError> {
        let mut items: Vec<SceneItem> = self
            .items()
            .filter(|i| self.is_saved(i))
            .map(|i| {
                let mut item = i.persisted();
                item.children
                    .retain(|&c| self.get(c).is_some_and(|ci| self.is_saved(ci)));
                item
            })
            .collect();
        items.sort_by_key(|i| i.id);
        let layers = self
            .layers
            .iter()
            .map(|l| GraphLayer {
                items: l
                    .items
                    .iter()
                    .copied()
                    .filter(|&id| self.get(id).is_some_and(|i| self.is_saved(i)))
                    .collect(),
                ..l.clone()
            })
            .collect();
        let doc = SceneDocument {
            active_layer: self.active_layer,
            layers,
            items,
        };
        Ok(serde_json::to_string(&doc)?)
    }

    fn is_saved(&self, item: &SceneItem) -> bool {
        if item.kind.is_helper() || item.transient {
            return false;
        }
        item.parent
            .and_then(|p| self.get(p))
            .is_none_or(|parent| self.is_saved(parent))
    }

    /// Build a fresh graph (with a new identity) from [`SceneGraph::to_json`] output.
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let doc: SceneDocument = serde_json::from_str(json)?;
        let mut graph = SceneGraph::new();
        graph.next_layer = doc.layers.iter().map(|l| l.id.0 + 1).max().unwrap_or(1);
        graph.next_item = doc.items.iter().map(|i| i.id.0 + 1).max().unwrap_or(1);
        for item in doc.items {
            if graph.contains(item.id) {
                return Err(SceneError::Corrupt(format!("duplicate {}", item.id)));
            }
            graph.store(item);
        }
        graph.layers = doc.layers;
        graph.active_layer = doc.active_layer.filter(|&id| graph.layer(id).is_some());
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> Result<(), SceneError> {
        for layer in &self.layers {
            for &id in &layer.items {
                let item = self
                    .get(id)
                    .ok_or_else(|| SceneError::Corrupt(format!("layer references missing {id}")))?;
                if item.parent.is_some() || item.layer != layer.id {
                    return Err(SceneError::Corrupt(format!("{id} misplaced on layer")));
                }
            }
        }
        for item in self.items() {
            for &child in &item.children {
                let c = self
                    .get(child)
                    .ok_or_else(|| SceneError::Corrupt(format!("{} has missing child", item.id)))?;
                if c.parent != Some(item.id) {
                    return Err(SceneError::Corrupt(format!("{child} has wrong parent")));
                }
            }
        }
        Ok(())
    }
}

fn handle_rect(center: Point) -> Rect {
    Rect::from_center_size(center, (HANDLE_SIZE, HANDLE_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_item(rect: Rect) -> ItemSpec {
        ItemSpec::new(ItemKind::Drawing, Geometry::Path(PathData::rectangle(rect)))
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut graph = SceneGraph::new();
        let layer = graph.add_layer("a");
        let id = graph
            .insert(layer, rect_item(Rect::new(0.0, 0.0, 10.0, 10.0)).with_correlation("r1"))
            .unwrap();
        assert!(graph.contains(id));
        assert_eq!(graph.find_by_correlation("r1"), Some(id));
        assert_eq!(graph.layer(layer).unwrap().items, vec![id]);
    }

    #[test]
    fn test_insert_on_missing_layer_fails() {
        let mut graph = SceneGraph::new();
        let result = graph.insert(LayerId(42), rect_item(Rect::ZERO));
        assert!(matches!(result, Err(SceneError::UnknownLayer(_))));
    }

    #[test]
    fn test_remove_is_recursive_and_reuses_slots() {
        let mut graph = SceneGraph::new();
        let layer = graph.add_layer("a");
        let group = graph
            .insert(layer, ItemSpec::new(ItemKind::Placeholder(PlaceholderKind::Image), Geometry::Group))
            .unwrap();
        let child = graph
            .insert_child(group, rect_item(Rect::new(0.0, 0.0, 5.0, 5.0)).with_correlation("c"))
            .unwrap();

        let removed = graph.remove(group).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!graph.contains(child));
        assert_eq!(graph.find_by_correlation("c"), None);
        assert!(graph.layer(layer).unwrap().items.is_empty());

        let again = graph.insert(layer, rect_item(Rect::ZERO)).unwrap();
        assert_ne!(again, group);
        assert_eq!(graph.slots.len(), 2);
    }

    #[test]
    fn test_group_bounds_ignore_helpers() {
        let mut graph = SceneGraph::new();
        let layer = graph.add_layer("a");
        let image = graph
            .insert(layer, ItemSpec::new(ItemKind::Image, Geometry::Frame(Rect::new(0.0, 0.0, 20.0, 20.0))))
            .unwrap();
        graph.attach_selection_helpers(image).unwrap();
        assert_eq!(graph.get(image).unwrap().children.len(), 5);
        assert_eq!(graph.bounds(image), Some(Rect::new(0.0, 0.0, 20.0, 20.0)));

        // Attaching twice does not duplicate helpers
        graph.attach_selection_helpers(image).unwrap();
        assert_eq!(graph.get(image).unwrap().children.len(), 5);

        graph.detach_helpers(image);
        assert!(graph.get(image).unwrap().children.is_empty());
    }

    #[test]
    fn test_reverse_z_order() {
        let mut graph = SceneGraph::new();
        let bottom = graph.add_layer("bottom");
        let top = graph.add_layer("top");
        let a = graph.insert(bottom, rect_item(Rect::ZERO)).unwrap();
        let b = graph.insert(bottom, rect_item(Rect::ZERO)).unwrap();
        let c = graph.insert(top, rect_item(Rect::ZERO)).unwrap();
        assert_eq!(graph.reverse_z_order(), vec![c, b, a]);
    }

    #[test]
    fn test_hit_test_skips_invisible_layers() {
        let mut graph = SceneGraph::new();
        let lower = graph.add_layer("lower");
        let upper = graph.add_layer("upper");
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let a = graph.insert(lower, rect_item(rect)).unwrap();
        let b = graph.insert(upper, rect_item(rect)).unwrap();

        let opts = HitOptions::stroke(2.0).with_fill();
        let hit = graph.hit_test(Point::new(5.0, 5.0), opts, |_| true).unwrap();
        assert_eq!(hit.item, b);
        assert_eq!(hit.part, HitPart::Fill);

        graph.set_layer_visible(upper, false).unwrap();
        let hit = graph.hit_test(Point::new(5.0, 5.0), opts, |_| true).unwrap();
        assert_eq!(hit.item, a);
    }

    #[test]
    fn test_hit_test_segments_first_by_index() {
        let mut graph = SceneGraph::new();
        let layer = graph.add_layer("a");
        let id = graph
            .insert(
                layer,
                ItemSpec::new(
                    ItemKind::Drawing,
                    Geometry::Path(PathData::polyline(vec![
                        Point::new(0.0, 0.0),
                        Point::new(3.0, 0.0),
                    ])),
                ),
            )
            .unwrap();
        let opts = HitOptions::stroke(5.0).with_segments();
        let hit = graph.hit_test(Point::new(2.0, 0.0), opts, |_| true).unwrap();
        assert_eq!(hit, Hit { item: id, part: HitPart::Segment(0) });
    }

    #[test]
    fn test_translate_moves_children() {
        let mut graph = SceneGraph::new();
        let layer = graph.add_layer("a");
        let group = graph
            .insert(layer, ItemSpec::new(ItemKind::Placeholder(PlaceholderKind::Model3d), Geometry::Group))
            .unwrap();
        graph.insert_child(group, rect_item(Rect::new(0.0, 0.0, 10.0, 10.0))).unwrap();
        graph.translate(group, Vec2::new(5.0, -5.0)).unwrap();
        assert_eq!(graph.bounds(group), Some(Rect::new(5.0, -5.0, 15.0, 5.0)));
    }

    #[test]
    fn test_placeholder_ancestor() {
        let mut graph = SceneGraph::new();
        let layer = graph.add_layer("a");
        let group = graph
            .insert(layer, ItemSpec::new(ItemKind::Placeholder(PlaceholderKind::Image), Geometry::Group))
            .unwrap();
        let child = graph.insert_child(group, rect_item(Rect::ZERO)).unwrap();
        let loose = graph.insert(layer, rect_item(Rect::ZERO)).unwrap();
        assert_eq!(graph.placeholder_ancestor(child), Some(group));
        assert_eq!(graph.placeholder_ancestor(loose), None);
    }

    #[test]
    fn test_json_excludes_helpers_and_roundtrips() {
        let mut graph = SceneGraph::new();
        let layer = graph.add_layer("layer_1");
        graph.activate_layer(layer).unwrap();
        let image = graph
            .insert(
                layer,
                ItemSpec::new(ItemKind::Image, Geometry::Frame(Rect::new(0.1, 0.2, 33.3, 44.4)))
                    .with_correlation("img"),
            )
            .unwrap();
        let path = graph.insert(layer, rect_item(Rect::new(1.0, 2.0, 3.0, 4.0))).unwrap();
        graph.get_mut(path).unwrap().highlight();
        let before = graph.to_json().unwrap();

        graph.attach_selection_helpers(image).unwrap();
        assert_eq!(graph.to_json().unwrap(), before);

        let restored = SceneGraph::from_json(&before).unwrap();
        assert_ne!(restored.graph_id(), graph.graph_id());
        assert_eq!(restored.to_json().unwrap(), before);
        assert_eq!(restored.find_by_correlation("img"), Some(image));
        assert!(
            (restored.get(path).unwrap().style.stroke_width - ItemStyle::default().stroke_width)
                .abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn test_json_excludes_transient_items() {
        let mut graph = SceneGraph::new();
        let layer = graph.add_layer("layer_1");
        let before = graph.to_json().unwrap();

        let preview = graph.insert(layer, rect_item(Rect::new(0.0, 0.0, 0.0, 0.0))).unwrap();
        graph.get_mut(preview).unwrap().transient = true;
        assert_eq!(graph.to_json().unwrap(), before);

        graph.get_mut(preview).unwrap().transient = false;
        let restored = SceneGraph::from_json(&graph.to_json().unwrap()).unwrap();
        assert!(restored.contains(preview));
    }

    #[test]
    fn test_from_json_rejects_dangling_layer_items() {
        let json = r#"{"active_layer":null,"layers":[{"id":1,"name":"a","visible":true,"items":[7]}],"items":[]}"#;
        assert!(matches!(SceneGraph::from_json(json), Err(SceneError::Corrupt(_))));
    }

    #[test]
    fn test_insert_layer_above() {
        let mut graph = SceneGraph::new();
        let grid = graph.add_layer(GRID_LAYER);
        let top = graph.add_layer("top");
        let mid = graph.insert_layer_above("mid", grid).unwrap();
        let order: Vec<LayerId> = graph.layers().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![grid, mid, top]);
    }
}
