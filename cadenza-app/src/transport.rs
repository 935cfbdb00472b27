use cadenza_core::{LoadId, Transport, TransportEventKind, TransportEvents, TransportFactory};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Transport for running without an audio device.
///
/// Sources are accepted and reported ready as soon as they are loaded; nothing
/// is decoded.
pub struct HeadlessTransport {
    events: TransportEvents,
    load_id: AtomicU64,
}

impl HeadlessTransport {
    #[must_use]
    pub const fn new(events: TransportEvents) -> Self {
        Self {
            events,
            load_id: AtomicU64::new(0),
        }
    }
}

impl Transport for HeadlessTransport {
    fn set_source(&self, url: &str) {
        debug!("Source: {}", url);
    }

    fn set_volume(&self, volume: f32) {
        debug!("Volume: {:.2}", volume);
    }

    fn load(&self, load_id: LoadId) {
        self.load_id.store(load_id, Ordering::Relaxed);
        self.events.send(load_id, TransportEventKind::Ready);
    }

    fn play(&self) {
        debug!("Play (load {})", self.load_id.load(Ordering::Relaxed));
    }

    fn pause(&self) {
        debug!("Pause");
    }

    fn seek(&self, seconds: f64) {
        let load_id = self.load_id.load(Ordering::Relaxed);
        self.events
            .send(load_id, TransportEventKind::PositionUpdate(seconds));
    }
}

pub struct HeadlessFactory;

impl TransportFactory for HeadlessFactory {
    fn create(&self, events: TransportEvents) -> Box<dyn Transport> {
        Box::new(HeadlessTransport::new(events))
    }
}
