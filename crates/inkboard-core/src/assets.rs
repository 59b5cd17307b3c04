//! Image and 3D-model instance records kept beside the scene graph.

use kurbo::Rect;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetKind {
    Image,
    #[serde(rename = "3d-model")]
    Model3d,
}

/// Side record for an image or model item. `id` is the item's correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetInstance {
    pub id: String,
    pub kind: AssetKind,
    pub source: String,
    pub layer_id: Option<String>,
    pub is_selected: bool,
}

/// Instance store with per-id delete and selection flags.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    instances: Vec<AssetInstance>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record with the same id.
    pub fn upsert(&mut self, instance: AssetInstance) {
        match self.instances.iter_mut().find(|i| i.id == instance.id) {
            Some(existing) => *existing = instance,
            None => self.instances.push(instance),
        }
    }

    pub fn get(&self, id: &str) -> Option<&AssetInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<AssetInstance> {
        let pos = self.instances.iter().position(|i| i.id == id)?;
        Some(self.instances.remove(pos))
    }

    pub fn of_kind(&self, kind: AssetKind) -> impl Iterator<Item = &AssetInstance> {
        self.instances.iter().filter(move |i| i.kind == kind)
    }

    pub fn set_selected(&mut self, id: &str, selected: bool) {
        if let Some(instance) = self.instances.iter_mut().find(|i| i.id == id) {
            instance.is_selected = selected;
        }
    }

    pub fn clear_selected(&mut self) {
        for instance in &mut self.instances {
            instance.is_selected = false;
        }
    }

    /// Ids flagged `is_selected`; used when no explicit selection list exists.
    pub fn flagged(&self, kind: AssetKind) -> Vec<String> {
        self.of_kind(kind)
            .filter(|i| i.is_selected)
            .map(|i| i.id.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.instances.clear();
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Plain bounds as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Rect> for AssetBounds {
    fn from(rect: Rect) -> Self {
        Self {
            x: rect.x0,
            y: rect.y0,
            width: rect.width(),
            height: rect.height(),
        }
    }
}

impl From<AssetBounds> for Rect {
    fn from(b: AssetBounds) -> Self {
        Rect::new(b.x, b.y, b.x + b.width, b.y + b.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAssetSnapshot {
    pub id: String,
    pub source: String,
    pub bounds: AssetBounds,
    pub layer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAssetSnapshot {
    pub id: String,
    pub source: String,
    pub bounds: AssetBounds,
    pub layer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAssetSnapshot {
    pub id: String,
    pub content: String,
    pub font_size: f64,
    pub bounds: AssetBounds,
    pub layer_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshots {
    #[serde(default)]
    pub images: Vec<ImageAssetSnapshot>,
    #[serde(default)]
    pub models: Vec<ModelAssetSnapshot>,
    #[serde(default)]
    pub texts: Vec<TextAssetSnapshot>,
}
