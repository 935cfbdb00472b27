use crate::model::{ContentKind, TrackMeta};
use crate::player::{PlayingMode, PlayingStatus, PlayingType};
use crate::view::ViewType;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted by the stores, the navigator and the playback engine.
///
/// These replace the observable fields a UI would otherwise watch: renderers
/// subscribe and re-read whatever derived state they display.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A collection snapshot was replaced
    CollectionUpdated { kind: ContentKind, len: usize },
    /// Remote reconciliation failed; the cached collection is still shown
    ReconcileFailed { kind: ContentKind, message: String },
    /// The page changed and the list should scroll back to the top
    ScrollBack { kind: ContentKind },
    /// An item on the current page should be scrolled into view and highlighted
    HighlightItem { kind: ContentKind, index: usize },
    /// The backdrop should switch to the given view's artwork
    BackgroundChanged { view: ViewType },
    /// The visible view changed
    ViewChanged { from: ViewType, to: ViewType },
    /// A new track was loaded into the transport
    TrackChanged {
        playing_type: PlayingType,
        index: usize,
        track: TrackMeta,
    },
    StatusChanged { status: PlayingStatus },
    ModeChanged { mode: PlayingMode },
    VolumeChanged { volume: u8 },
    /// Played or total time changed (seconds)
    TimeUpdated { played: f64, total: f64 },
}

/// Broadcast hub shared by every component.
pub struct EventBus {
    event_tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a new event bus
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    /// Send an event to all current subscribers; dropped when nobody listens
    pub fn emit(&self, event: AppEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { event_tx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(AppEvent::ScrollBack {
            kind: ContentKind::Single,
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::ScrollBack {
                kind: ContentKind::Single
            }
        );
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        bus.emit(AppEvent::VolumeChanged { volume: 10 });
    }
}
