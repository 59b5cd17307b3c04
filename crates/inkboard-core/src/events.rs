//! Typed publish/subscribe channel owned by the canvas.

use crate::assets::AssetSnapshots;
use crate::scene::{ItemId, PlaceholderKind};
use crate::tools::ToolMode;
use kurbo::Rect;

/// Notifications for the surrounding UI.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    ModeChanged(ToolMode),
    /// Fired after a successful undo/redo so overlays can re-sync side records.
    HistoryRestore { assets: AssetSnapshots },
    /// A placeholder was clicked; the UI should open a file picker.
    UploadRequested {
        placeholder: ItemId,
        kind: PlaceholderKind,
        bounds: Rect,
    },
    CachedImageChanged { image_id: String },
    SelectionChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&EditorEvent)>;

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&EditorEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    /// Deliver to every listener in subscription order.
    pub fn emit(&mut self, event: EditorEvent) {
        log::debug!("Emitting {event:?}");
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
