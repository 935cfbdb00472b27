use crate::config::PlaybackConfig;
use crate::error::{CoreError, Result};
use crate::events::{AppEvent, EventBus};
use crate::model::{ContentKind, Track, TrackMeta, VolInfo};
use crate::store::Catalog;
use crate::time::{format_time, progress_percent};
use crate::transport::{
    LoadId, Transport, TransportEvent, TransportEventKind, TransportEvents, TransportFactory,
};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "cadenza::player";

/// Which kind of content the active track belongs to.
pub type PlayingType = ContentKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayingStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
    /// Playing, but stalled waiting for data
    Fetching,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayingMode {
    #[default]
    Order,
    Shuffle,
    Loop,
}

impl PlayingMode {
    /// Order -> Shuffle -> Loop -> Order
    #[must_use]
    pub const fn cycle(self) -> Self {
        match self {
            Self::Order => Self::Shuffle,
            Self::Shuffle => Self::Loop,
            Self::Loop => Self::Order,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Content to switch to when starting playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayTarget {
    Volume { vol_id: u64 },
    Single,
    Article { article_index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaySelection {
    /// `None` keeps the current content and only moves the track index
    pub target: Option<PlayTarget>,
    pub index: usize,
}

/// Snapshot of the playback engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub playing_type: PlayingType,
    /// `None` means the first volume of the catalog
    pub vol_id: Option<u64>,
    pub article_index: usize,
    /// Track within the volume or article, or index into the singles collection
    pub track_index: usize,
    pub status: PlayingStatus,
    pub mode: PlayingMode,
    pub played_time: f64,
    pub total_time: f64,
    pub volume: u8,
    pub load_id: LoadId,
}

impl PlaybackState {
    #[must_use]
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            playing_type: PlayingType::Volume,
            vol_id: None,
            article_index: 0,
            track_index: 0,
            status: PlayingStatus::Stopped,
            mode: config.mode,
            played_time: 0.0,
            total_time: 0.0,
            volume: config.volume.min(100),
            load_id: 0,
        }
    }
}

/// Index of the track after `current` in a playlist of `len` tracks.
///
/// Shuffle keeps adding random steps in `1..=max_step` until it lands somewhere other
/// than `current`; a single-track playlist always yields 0. Order and Loop wrap around at
/// both ends. Returns `None` for an empty playlist.
#[must_use]
pub fn next_index<R: Rng>(
    current: usize,
    len: usize,
    mode: PlayingMode,
    direction: Direction,
    max_step: usize,
    rng: &mut R,
) -> Option<usize> {
    match len {
        0 => return None,
        1 => return Some(0),
        _ => {}
    }

    let index = match mode {
        PlayingMode::Shuffle => {
            let mut index = current;
            loop {
                index = (index + rng.random_range(1..=max_step.max(1))) % len;
                if index != current {
                    break index;
                }
            }
        }
        PlayingMode::Order | PlayingMode::Loop => match direction {
            Direction::Next => (current + 1) % len,
            Direction::Previous => current.checked_sub(1).map_or(len - 1, |i| i.min(len - 1)),
        },
    };
    Some(index)
}

/// Drives a lazily created transport and tracks what is playing.
pub struct PlaybackEngine {
    state: Mutex<PlaybackState>,
    /// Held from reading the state until the transport has the new source, so the last
    /// committed load is also the last one the transport sees
    load_lock: Mutex<()>,
    catalog: Catalog,
    factory: Arc<dyn TransportFactory>,
    transport: OnceLock<Arc<dyn Transport>>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    events: Arc<EventBus>,
    shuffle_max_step: usize,
    cancel_token: CancellationToken,
}

impl PlaybackEngine {
    /// Create a new playback engine
    ///
    /// # Arguments
    /// * `catalog` - Stores the playing track is resolved against
    /// * `factory` - Creates the transport on first playback
    /// * `events` - Bus for track, status, mode, volume and time events
    /// * `config` - Initial volume and mode, and the shuffle step bound
    /// * `cancel_token` - Optional external cancellation token that stops the event pump
    #[must_use]
    pub fn new(
        catalog: Catalog,
        factory: Arc<dyn TransportFactory>,
        events: Arc<EventBus>,
        config: &PlaybackConfig,
        cancel_token: Option<CancellationToken>,
    ) -> Arc<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Arc::new(Self {
            state: Mutex::new(PlaybackState::new(config)),
            load_lock: Mutex::new(()),
            catalog,
            factory,
            transport: OnceLock::new(),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
            events,
            shuffle_max_step: config.shuffle_max_step,
            cancel_token: cancel_token.unwrap_or_default(),
        })
    }

    /// Get a clone of the cancellation token
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Start pumping transport events in a background task
    #[must_use]
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        let rx = self.event_rx.lock().take();
        let Some(mut rx) = rx else {
            warn!(target: LOG_TARGET, "Transport event pump already started");
            return;
        };

        info!(target: LOG_TARGET, "Playback engine started");
        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: LOG_TARGET, "Playback engine shutting down");
                    break;
                }
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.handle_transport_event(event) {
                        warn!(target: LOG_TARGET, "Failed to handle {:?}: {}", event.kind, e);
                    }
                }
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state.lock().clone()
    }

    /// The track the state currently points at.
    #[must_use]
    pub fn playing_info(&self) -> Option<TrackMeta> {
        let state = self.state();
        self.resolve(&state)
    }

    /// Played ratio in percent.
    #[must_use]
    pub fn progress(&self) -> u8 {
        let state = self.state.lock();
        progress_percent(state.played_time, state.total_time)
    }

    #[must_use]
    pub fn formatted_played_time(&self) -> String {
        format_time(self.state.lock().played_time)
    }

    #[must_use]
    pub fn formatted_total_time(&self) -> String {
        format_time(self.state.lock().total_time)
    }

    /// Load and start a track.
    ///
    /// # Errors
    ///
    /// Returns `NothingToPlay` if the selection does not resolve to a track; the state is
    /// left untouched.
    pub fn play(&self, selection: PlaySelection) -> Result<()> {
        let _loading = self.load_lock.lock();
        self.load(selection)
    }

    /// Body of [`play`](Self::play); the caller holds `load_lock`.
    fn load(&self, selection: PlaySelection) -> Result<()> {
        let mut next = self.state();
        match selection.target {
            Some(PlayTarget::Volume { vol_id }) => {
                next.playing_type = PlayingType::Volume;
                next.vol_id = Some(vol_id);
            }
            Some(PlayTarget::Single) => next.playing_type = PlayingType::Single,
            Some(PlayTarget::Article { article_index }) => {
                next.playing_type = PlayingType::Article;
                next.article_index = article_index;
            }
            None => {}
        }
        next.track_index = selection.index;

        let track = self.resolve(&next).ok_or(CoreError::NothingToPlay {
            kind: next.playing_type,
        })?;

        let (load_id, volume) = {
            let mut state = self.state.lock();
            state.playing_type = next.playing_type;
            state.vol_id = next.vol_id;
            state.article_index = next.article_index;
            state.track_index = next.track_index;
            state.status = PlayingStatus::Playing;
            state.played_time = 0.0;
            state.total_time = 0.0;
            state.load_id += 1;
            (state.load_id, state.volume)
        };

        info!(
            target: LOG_TARGET,
            "Playing {} #{}: {} - {}",
            next.playing_type, next.track_index, track.artist, track.name
        );

        let transport = self.transport();
        transport.pause();
        transport.set_source(&track.url);
        transport.set_volume(f32::from(volume) / 100.0);
        transport.load(load_id);

        self.events.emit(AppEvent::TrackChanged {
            playing_type: next.playing_type,
            index: next.track_index,
            track,
        });
        self.events.emit(AppEvent::StatusChanged {
            status: PlayingStatus::Playing,
        });
        Ok(())
    }

    /// Play a track of the volume with `vol_id`.
    ///
    /// # Errors
    ///
    /// Returns `NothingToPlay` if there is no such volume or track.
    pub fn play_vol_track(&self, vol_id: u64, track_index: usize) -> Result<()> {
        self.play(PlaySelection {
            target: Some(PlayTarget::Volume { vol_id }),
            index: track_index,
        })
    }

    /// Pause when playing, resume otherwise. Does nothing before the first play.
    pub fn toggle(&self) {
        let Some(transport) = self.transport.get() else {
            return;
        };

        let status = {
            let mut state = self.state.lock();
            state.status = if state.status == PlayingStatus::Playing {
                PlayingStatus::Paused
            } else {
                PlayingStatus::Playing
            };
            state.status
        };

        if status == PlayingStatus::Paused {
            transport.pause();
        } else {
            transport.play();
        }
        self.events.emit(AppEvent::StatusChanged { status });
    }

    /// Move to the next or previous track according to the playing mode.
    ///
    /// Does nothing before the first play.
    ///
    /// # Errors
    ///
    /// Returns `NothingToPlay` if the current playlist is empty.
    pub fn control(&self, direction: Direction) -> Result<()> {
        if self.transport.get().is_none() {
            return Ok(());
        }

        let _loading = self.load_lock.lock();
        let state = self.state();
        let len = self.playlist_len(&state);
        let index = next_index(
            state.track_index,
            len,
            state.mode,
            direction,
            self.shuffle_max_step,
            &mut rand::rng(),
        )
        .ok_or(CoreError::NothingToPlay {
            kind: state.playing_type,
        })?;

        self.load(PlaySelection {
            target: None,
            index,
        })
    }

    /// Advance to the next playing mode and return it.
    pub fn set_mode(&self) -> PlayingMode {
        let mode = {
            let mut state = self.state.lock();
            state.mode = state.mode.cycle();
            state.mode
        };
        debug!(target: LOG_TARGET, "Playing mode: {:?}", mode);
        self.events.emit(AppEvent::ModeChanged { mode });
        mode
    }

    /// Seek to `ratio` percent of the track. Does nothing before the first play.
    pub fn seek(&self, ratio: f64) {
        let Some(transport) = self.transport.get() else {
            return;
        };
        if !ratio.is_finite() {
            return;
        }

        let total = self.state.lock().total_time;
        transport.seek(total * ratio.clamp(0.0, 100.0) / 100.0);
    }

    /// Set the volume in percent, clamped to 100.
    pub fn set_volume(&self, percent: u8) {
        let volume = percent.min(100);
        self.state.lock().volume = volume;

        if let Some(transport) = self.transport.get() {
            transport.set_volume(f32::from(volume) / 100.0);
        }
        self.events.emit(AppEvent::VolumeChanged { volume });
    }

    /// Apply a transport lifecycle event; events from superseded loads are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if auto-advancing after `Ended` fails.
    pub fn handle_transport_event(&self, event: TransportEvent) -> Result<()> {
        let mut state = self.state.lock();
        if event.load_id != state.load_id {
            debug!(
                target: LOG_TARGET,
                "Dropping {:?} from stale load {} (current {})",
                event.kind, event.load_id, state.load_id
            );
            return Ok(());
        }

        match event.kind {
            TransportEventKind::Ready => {
                if state.status == PlayingStatus::Paused {
                    return Ok(());
                }
                state.status = PlayingStatus::Playing;
                drop(state);

                if let Some(transport) = self.transport.get() {
                    transport.play();
                }
                self.events.emit(AppEvent::StatusChanged {
                    status: PlayingStatus::Playing,
                });
            }
            TransportEventKind::Waiting => {
                if state.status != PlayingStatus::Playing {
                    return Ok(());
                }
                state.status = PlayingStatus::Fetching;
                drop(state);

                self.events.emit(AppEvent::StatusChanged {
                    status: PlayingStatus::Fetching,
                });
            }
            TransportEventKind::DurationKnown(total) => {
                state.total_time = total;
                let played = state.played_time;
                drop(state);

                self.events.emit(AppEvent::TimeUpdated { played, total });
            }
            TransportEventKind::PositionUpdate(played) => {
                state.played_time = played;
                let total = state.total_time;
                drop(state);

                self.events.emit(AppEvent::TimeUpdated { played, total });
            }
            TransportEventKind::Ended => {
                drop(state);
                self.control(Direction::Next)?;
            }
        }
        Ok(())
    }

    fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(self.transport.get_or_init(|| {
            debug!(target: LOG_TARGET, "Creating transport");
            let events = TransportEvents::new(self.event_tx.clone());
            Arc::from(self.factory.create(events))
        }))
    }

    fn resolve(&self, state: &PlaybackState) -> Option<TrackMeta> {
        match state.playing_type {
            PlayingType::Volume => {
                let vol = self.playing_vol(state)?;
                vol.tracks.get(state.track_index).map(|t| t.meta().clone())
            }
            PlayingType::Single => self
                .catalog
                .singles
                .get(state.track_index)
                .map(|s| s.meta().clone()),
            PlayingType::Article => self
                .catalog
                .articles
                .get(state.article_index)?
                .tracks
                .get(state.track_index)
                .map(|t| t.meta().clone()),
        }
    }

    /// Number of tracks next/previous cycles through for the current content.
    fn playlist_len(&self, state: &PlaybackState) -> usize {
        match state.playing_type {
            PlayingType::Volume => self.playing_vol(state).map_or(0, |vol| vol.tracks.len()),
            PlayingType::Single => self.catalog.singles.len(),
            PlayingType::Article => self
                .catalog
                .articles
                .get(state.article_index)
                .map_or(0, |article| article.tracks.len()),
        }
    }

    fn playing_vol(&self, state: &PlaybackState) -> Option<VolInfo> {
        match state.vol_id {
            Some(id) => self.catalog.vols.find_by_id(id),
            None => self.catalog.vols.get(0),
        }
    }
}
