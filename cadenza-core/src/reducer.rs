//! Single-store playback model driven by explicit mutations.
//!
//! Older clients keep all of their state in one place and change it only by committing
//! a [`Mutation`]. It covers volumes and singles, "load more" index windows and a
//! string-keyed view stack, and shares shuffle and pagination rules with the
//! [`PlaybackEngine`](crate::player::PlaybackEngine).

use crate::config::CadenzaConfig;
use crate::error::{CoreError, Result};
use crate::model::{Content, ContentKind, Single, Track, TrackMeta, VolInfo};
use crate::pagination::Pagination;
use crate::player::{next_index, Direction, PlayingMode};
use crate::scheduler::Scheduler;
use crate::transport::{
    LoadId, Transport, TransportEvent, TransportEventKind, TransportEvents, TransportFactory,
};
use crate::view::{schedule_lowering, RaiseLedger, ViewSurface};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const LOG_TARGET: &str = "cadenza::reducer";

/// Growth step of the "load more" windows.
pub const LOAD_MORE_STEP: usize = 18;

const RAISED_STACK_ORDER: i32 = 2;
const LOWERED_STACK_ORDER: i32 = -2;

/// Views with this prefix all render into one shared surface.
const USER_SURFACE: &str = "user";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyCollection {
    Vols,
    Singles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyPlayType {
    Vol,
    Single,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyTarget {
    Vol(Arc<VolInfo>),
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Current,
    Total,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegacyData {
    Vols(Vec<VolInfo>),
    Singles(Vec<Single>),
}

/// Every state change the legacy store accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    UpdateData(LegacyData),
    ChangeView(String),
    ChangeViewVol(Arc<VolInfo>),
    ChangeVolType(String),
    LoadMoreVols { init: bool, max: usize },
    LoadMoreSingles { init: bool },
    TogglePage { collection: LegacyCollection, page: usize },
    NextPagination(LegacyCollection),
    PrevPagination(LegacyCollection),
    Play {
        target: Option<LegacyTarget>,
        index: usize,
    },
    Toggle,
    Control(Direction),
    ChangePlayMode,
    /// Seek to a percentage of the track
    ChangePlayRatio(f64),
    ChangePlayVolume(u8),
    UpdateTime { field: TimeField, value: f64 },
    Transport(TransportEvent),
}

/// A frozen collection with its "load more" index and pagination.
#[derive(Debug, Clone)]
pub struct LegacyList<T> {
    pub data: Arc<[T]>,
    /// How many items the "load more" list currently shows
    pub index: usize,
    pub pagination: Pagination,
}

impl<T> LegacyList<T> {
    fn new(page_scale: usize, window_scale: usize) -> Self {
        Self {
            data: Arc::from(Vec::new()),
            index: LOAD_MORE_STEP,
            pagination: Pagination::new(page_scale, window_scale),
        }
    }

    fn load_more(&mut self, init: bool, max: usize) {
        self.index = if init {
            LOAD_MORE_STEP
        } else {
            (self.index + LOAD_MORE_STEP).min(max)
        };
    }

    /// Items on the current page.
    #[must_use]
    pub fn display(&self) -> &[T] {
        &self.data[self.pagination.page_range(self.data.len())]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyView {
    pub current: String,
    pub previous: Option<String>,
    /// Volume shown by the info view
    pub vol: Option<Arc<VolInfo>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyPlay {
    pub playing_type: LegacyPlayType,
    pub vol: Option<Arc<VolInfo>>,
    pub index: usize,
    pub playing: bool,
    pub mode: PlayingMode,
    pub volume: u8,
    pub current_time: f64,
    pub total_time: f64,
    pub load_id: LoadId,
}

pub struct LegacyStore {
    vols: LegacyList<VolInfo>,
    singles: LegacyList<Single>,
    vol_type: String,
    view: LegacyView,
    play: LegacyPlay,
    factory: Arc<dyn TransportFactory>,
    transport: Option<Box<dyn Transport>>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    event_rx: mpsc::UnboundedReceiver<TransportEvent>,
    surfaces: Arc<dyn ViewSurface>,
    scheduler: Arc<dyn Scheduler>,
    ledger: Arc<Mutex<RaiseLedger>>,
    teardown_delay: Duration,
    shuffle_max_step: usize,
}

impl LegacyStore {
    #[must_use]
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        surfaces: Arc<dyn ViewSurface>,
        scheduler: Arc<dyn Scheduler>,
        config: &CadenzaConfig,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let window = config.catalog.pagination_window;

        Self {
            vols: LegacyList::new(config.catalog.vol_page_scale, window),
            singles: LegacyList::new(config.catalog.single_page_scale, window),
            vol_type: String::new(),
            view: LegacyView {
                current: ContentKind::Volume.as_str().to_string(),
                ..LegacyView::default()
            },
            play: LegacyPlay {
                playing_type: LegacyPlayType::Vol,
                vol: None,
                index: 0,
                playing: false,
                mode: config.playback.mode,
                volume: config.playback.volume.min(100),
                current_time: 0.0,
                total_time: 0.0,
                load_id: 0,
            },
            factory,
            transport: None,
            event_tx,
            event_rx,
            surfaces,
            scheduler,
            ledger: Arc::new(Mutex::new(RaiseLedger::default())),
            teardown_delay: config.view.teardown_delay(),
            shuffle_max_step: config.playback.shuffle_max_step,
        }
    }

    #[must_use]
    pub const fn vols(&self) -> &LegacyList<VolInfo> {
        &self.vols
    }

    #[must_use]
    pub const fn singles(&self) -> &LegacyList<Single> {
        &self.singles
    }

    #[must_use]
    pub fn vol_type(&self) -> &str {
        &self.vol_type
    }

    #[must_use]
    pub const fn view(&self) -> &LegacyView {
        &self.view
    }

    #[must_use]
    pub const fn play_state(&self) -> &LegacyPlay {
        &self.play
    }

    /// Track the play state points at.
    #[must_use]
    pub fn play_data(&self) -> Option<&TrackMeta> {
        match self.play.playing_type {
            LegacyPlayType::Vol => self
                .play
                .vol
                .as_ref()?
                .tracks
                .get(self.play.index)
                .map(Track::meta),
            LegacyPlayType::Single => self.singles.data.get(self.play.index).map(Track::meta),
        }
    }

    /// Length of the list next/previous moves through.
    #[must_use]
    pub fn play_list_len(&self) -> usize {
        match self.play.playing_type {
            LegacyPlayType::Vol => self.play.vol.as_ref().map_or(0, |vol| vol.tracks.len()),
            LegacyPlayType::Single => self.singles.data.len(),
        }
    }

    /// Apply one mutation.
    ///
    /// # Errors
    ///
    /// Returns `PageOutOfRange` for a bad page, and `NothingToPlay` when a play or
    /// control request does not resolve to a track.
    pub fn commit(&mut self, mutation: Mutation) -> Result<()> {
        match mutation {
            Mutation::UpdateData(LegacyData::Vols(vols)) => {
                freeze(&mut self.vols, vols);
            }
            Mutation::UpdateData(LegacyData::Singles(singles)) => {
                freeze(&mut self.singles, singles);
            }
            Mutation::ChangeView(view) => self.change_view(view),
            Mutation::ChangeViewVol(vol) => self.view.vol = Some(vol),
            Mutation::ChangeVolType(vol_type) => self.vol_type = vol_type,
            Mutation::LoadMoreVols { init, max } => self.vols.load_more(init, max),
            Mutation::LoadMoreSingles { init } => {
                let max = self.singles.data.len();
                self.singles.load_more(init, max);
            }
            Mutation::TogglePage { collection, page } => match collection {
                LegacyCollection::Vols => {
                    let len = self.vols.data.len();
                    self.vols.pagination.toggle_page(page, len)?;
                }
                LegacyCollection::Singles => {
                    let len = self.singles.data.len();
                    self.singles.pagination.toggle_page(page, len)?;
                }
            },
            Mutation::NextPagination(collection) => {
                let moved = match collection {
                    LegacyCollection::Vols => {
                        let len = self.vols.data.len();
                        self.vols.pagination.next_window(len)
                    }
                    LegacyCollection::Singles => {
                        let len = self.singles.data.len();
                        self.singles.pagination.next_window(len)
                    }
                };
                if !moved {
                    debug!(target: LOG_TARGET, "{collection:?} already on the last page window");
                }
            }
            Mutation::PrevPagination(collection) => {
                let moved = match collection {
                    LegacyCollection::Vols => self.vols.pagination.prev_window(),
                    LegacyCollection::Singles => self.singles.pagination.prev_window(),
                };
                if !moved {
                    debug!(target: LOG_TARGET, "{collection:?} already on the first page window");
                }
            }
            Mutation::Play { target, index } => self.play(target, index)?,
            Mutation::Toggle => self.toggle(),
            Mutation::Control(direction) => self.control(direction)?,
            Mutation::ChangePlayMode => self.play.mode = self.play.mode.cycle(),
            Mutation::ChangePlayRatio(ratio) => {
                if let Some(transport) = &self.transport {
                    if ratio.is_finite() {
                        transport.seek(self.play.total_time * ratio.clamp(0.0, 100.0) / 100.0);
                    }
                }
            }
            Mutation::ChangePlayVolume(volume) => {
                let volume = volume.min(100);
                if let Some(transport) = &self.transport {
                    transport.set_volume(f32::from(volume) / 100.0);
                }
                self.play.volume = volume;
            }
            Mutation::UpdateTime { field, value } => match field {
                TimeField::Current => self.play.current_time = value,
                TimeField::Total => self.play.total_time = value,
            },
            Mutation::Transport(event) => self.on_transport_event(event)?,
        }
        Ok(())
    }

    /// Commit every transport event received so far; returns how many were applied.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while auto-advancing.
    pub fn drain_transport_events(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.commit(Mutation::Transport(event))?;
            applied += 1;
        }
        Ok(applied)
    }

    fn change_view(&mut self, view: String) {
        if self.view.current == view {
            return;
        }
        let previous = std::mem::replace(&mut self.view.current, view);
        debug!(target: LOG_TARGET, "View {previous} -> {}", self.view.current);

        let entering_id = surface_id(&self.view.current).to_string();
        let exiting_id = surface_id(&previous).to_string();
        self.view.previous = Some(previous);

        let entering = self.surfaces.surface_by_id(&entering_id);
        let generation = {
            let mut ledger = self.ledger.lock();
            let generation = ledger.raise(&entering_id);
            if let Some(surface) = &entering {
                surface.set_stack_order(RAISED_STACK_ORDER);
            }
            generation
        };

        if exiting_id == entering_id {
            return;
        }
        if let Some(surface) = self.surfaces.surface_by_id(&exiting_id) {
            schedule_lowering(
                self.scheduler.as_ref(),
                &self.ledger,
                self.teardown_delay,
                exiting_id,
                surface,
                LOWERED_STACK_ORDER,
                generation,
            );
        }
    }

    fn play(&mut self, target: Option<LegacyTarget>, index: usize) -> Result<()> {
        let (playing_type, vol) = match target {
            Some(LegacyTarget::Vol(vol)) => (LegacyPlayType::Vol, Some(vol)),
            Some(LegacyTarget::Single) => (LegacyPlayType::Single, self.play.vol.clone()),
            None => (self.play.playing_type, self.play.vol.clone()),
        };

        let url = match playing_type {
            LegacyPlayType::Vol => vol
                .as_ref()
                .and_then(|vol| vol.tracks.get(index))
                .map(|track| track.meta().url.clone()),
            LegacyPlayType::Single => self.singles.data.get(index).map(|s| s.meta().url.clone()),
        };
        let url = url.ok_or(CoreError::NothingToPlay {
            kind: match playing_type {
                LegacyPlayType::Vol => VolInfo::KIND,
                LegacyPlayType::Single => Single::KIND,
            },
        })?;

        self.play.playing_type = playing_type;
        self.play.vol = vol;
        self.play.index = index;
        self.play.playing = true;
        self.play.load_id += 1;

        let load_id = self.play.load_id;
        let volume = f32::from(self.play.volume) / 100.0;
        let transport = self.transport();
        transport.pause();
        transport.set_source(&url);
        transport.set_volume(volume);
        transport.load(load_id);
        Ok(())
    }

    fn toggle(&mut self) {
        let Some(transport) = &self.transport else {
            return;
        };
        if self.play.playing {
            self.play.playing = false;
            transport.pause();
        } else {
            self.play.playing = true;
            transport.play();
        }
    }

    fn control(&mut self, direction: Direction) -> Result<()> {
        if self.transport.is_none() {
            return Ok(());
        }
        let index = next_index(
            self.play.index,
            self.play_list_len(),
            self.play.mode,
            direction,
            self.shuffle_max_step,
            &mut rand::rng(),
        )
        .ok_or(CoreError::NothingToPlay {
            kind: match self.play.playing_type {
                LegacyPlayType::Vol => VolInfo::KIND,
                LegacyPlayType::Single => Single::KIND,
            },
        })?;
        self.play(None, index)
    }

    fn on_transport_event(&mut self, event: TransportEvent) -> Result<()> {
        if event.load_id != self.play.load_id {
            debug!(
                target: LOG_TARGET,
                "Dropping {:?} from stale load {}", event.kind, event.load_id
            );
            return Ok(());
        }

        match event.kind {
            TransportEventKind::Ready => {
                match &self.transport {
                    Some(transport) if self.play.playing => transport.play(),
                    _ => {}
                }
            }
            TransportEventKind::Waiting => {}
            TransportEventKind::DurationKnown(total) => self.play.total_time = total,
            TransportEventKind::PositionUpdate(current) => self.play.current_time = current,
            TransportEventKind::Ended => self.control(Direction::Next)?,
        }
        Ok(())
    }

    fn transport(&mut self) -> &dyn Transport {
        let factory = &self.factory;
        let event_tx = &self.event_tx;
        let transport = self
            .transport
            .get_or_insert_with(|| factory.create(TransportEvents::new(event_tx.clone())));
        &**transport
    }
}

fn freeze<T>(list: &mut LegacyList<T>, data: Vec<T>) {
    list.data = Arc::from(data);
    list.pagination.clamp(list.data.len());
}

fn surface_id(view: &str) -> &str {
    if view.starts_with(USER_SURFACE) {
        USER_SURFACE
    } else {
        view
    }
}
