//! The audio transport seam.
//!
//! A transport is the thing that actually decodes and outputs audio. The engine drives it
//! through [`Transport`] and hears back through [`TransportEvents`], with every event
//! tagged by the load it belongs to.

use tokio::sync::mpsc;

/// Monotonic stamp of a `play()` request.
pub type LoadId = u64;

/// Lifecycle notifications from a transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportEventKind {
    /// Enough data is buffered to start
    Ready,
    /// Playback stalled waiting for data
    Waiting,
    /// Track duration in seconds
    DurationKnown(f64),
    /// Current position in seconds
    PositionUpdate(f64),
    /// The track finished
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportEvent {
    pub load_id: LoadId,
    pub kind: TransportEventKind,
}

/// Sending half handed to a transport when it is created.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEvents {
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self { tx }
    }

    /// Report `kind` for the load `load_id`. Returns false once the engine is gone.
    pub fn send(&self, load_id: LoadId, kind: TransportEventKind) -> bool {
        self.tx.send(TransportEvent { load_id, kind }).is_ok()
    }
}

/// Audio output controlled by the playback engine.
pub trait Transport: Send + Sync {
    fn set_source(&self, url: &str);

    /// Volume as a 0.0-1.0 gain.
    fn set_volume(&self, volume: f32);

    /// Start loading the current source; events for it must carry `load_id`.
    fn load(&self, load_id: LoadId);

    fn play(&self);

    fn pause(&self);

    fn seek(&self, seconds: f64);
}

/// Creates the transport on first playback.
pub trait TransportFactory: Send + Sync {
    fn create(&self, events: TransportEvents) -> Box<dyn Transport>;
}
