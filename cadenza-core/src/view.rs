//! View identifiers and the navigator that choreographs transitions between them.

use crate::config::ViewConfig;
use crate::error::{CoreError, Result};
use crate::events::{AppEvent, EventBus};
use crate::scheduler::Scheduler;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const LOG_TARGET: &str = "cadenza::view";

/// Every screen of the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewType {
    Playing,
    #[default]
    Vols,
    VolsType,
    VolInfo,
    Singles,
    SingleInfo,
    Articles,
    ArticleInfo,
    User,
}

impl ViewType {
    pub const ALL: [Self; 9] = [
        Self::Playing,
        Self::Vols,
        Self::VolsType,
        Self::VolInfo,
        Self::Singles,
        Self::SingleInfo,
        Self::Articles,
        Self::ArticleInfo,
        Self::User,
    ];

    /// Surface identifier of the view.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Vols => "vols",
            Self::VolsType => "vols-type",
            Self::VolInfo => "vol-info",
            Self::Singles => "singles",
            Self::SingleInfo => "single-info",
            Self::Articles => "articles",
            Self::ArticleInfo => "article-info",
            Self::User => "user",
        }
    }

    /// Reverse of [`ViewType::id`].
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|view| view.id() == id)
    }

    /// The info view reached from this collection view, if it is one.
    const fn detail(self) -> Option<Self> {
        match self {
            Self::Vols => Some(Self::VolInfo),
            Self::Singles => Some(Self::SingleInfo),
            Self::Articles => Some(Self::ArticleInfo),
            _ => None,
        }
    }
}

impl std::fmt::Display for ViewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Visibility classes toggled on view surfaces during a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionClass {
    Show,
    ShowWithCover,
}

impl TransitionClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::ShowWithCover => "show-with-cover",
        }
    }
}

/// A renderable view container.
pub trait Surface: Send + Sync {
    fn set_stack_order(&self, order: i32);

    fn add_class(&self, class: TransitionClass);

    fn remove_class(&self, class: TransitionClass);
}

/// Looks up the surface that renders a view.
pub trait ViewSurface: Send + Sync {
    fn query_surface(&self, view: ViewType) -> Option<Arc<dyn Surface>>;

    /// Look a surface up by its identifier.
    fn surface_by_id(&self, id: &str) -> Option<Arc<dyn Surface>> {
        ViewType::from_id(id).and_then(|view| self.query_surface(view))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    EnterDetail,
    ExitDetail,
    Lateral,
}

impl Transition {
    fn classify(from: ViewType, to: ViewType) -> Self {
        if from.detail() == Some(to) {
            Self::EnterDetail
        } else if to.detail() == Some(from) {
            Self::ExitDetail
        } else {
            Self::Lateral
        }
    }
}

/// Guards deferred teardown against surfaces raised again before it fires.
///
/// Keys are surface identifiers so several views may share one surface.
#[derive(Debug, Default)]
pub(crate) struct RaiseLedger {
    generation: u64,
    raised_at: HashMap<String, u64>,
}

impl RaiseLedger {
    /// Stamp a new generation and record `surface` as raised in it.
    pub(crate) fn raise(&mut self, surface: &str) -> u64 {
        self.generation += 1;
        self.raised_at.insert(surface.to_string(), self.generation);
        self.generation
    }

    /// Whether a lowering stamped at `generation` may still run on `surface`.
    pub(crate) fn may_lower(&self, surface: &str, generation: u64) -> bool {
        self.raised_at
            .get(surface)
            .map_or(true, |raised| *raised <= generation)
    }
}

/// Schedule `surface` to drop to `order`, unless it is raised again first.
///
/// The ledger stays locked across the stack-order write, as it does on the raise side,
/// so a raise can never land between the check and the write.
pub(crate) fn schedule_lowering(
    scheduler: &dyn Scheduler,
    ledger: &Arc<Mutex<RaiseLedger>>,
    delay: std::time::Duration,
    surface_id: String,
    surface: Arc<dyn Surface>,
    order: i32,
    generation: u64,
) {
    let ledger = Arc::clone(ledger);
    scheduler.schedule(
        delay,
        Box::new(move || {
            let ledger = ledger.lock();
            if ledger.may_lower(&surface_id, generation) {
                surface.set_stack_order(order);
            } else {
                debug!(
                    target: LOG_TARGET,
                    "Skipping teardown of {surface_id}: raised again since generation {generation}"
                );
            }
        }),
    );
}

struct NavState {
    current: ViewType,
    history: Vec<ViewType>,
}

/// Tracks the visible view and its back history, and drives surface transitions.
pub struct Navigator {
    state: Mutex<NavState>,
    ledger: Arc<Mutex<RaiseLedger>>,
    surfaces: Arc<dyn ViewSurface>,
    scheduler: Arc<dyn Scheduler>,
    events: Arc<EventBus>,
    config: ViewConfig,
}

impl Navigator {
    #[must_use]
    pub fn new(
        surfaces: Arc<dyn ViewSurface>,
        scheduler: Arc<dyn Scheduler>,
        events: Arc<EventBus>,
        config: ViewConfig,
    ) -> Self {
        Self {
            state: Mutex::new(NavState {
                current: ViewType::default(),
                history: Vec::new(),
            }),
            ledger: Arc::new(Mutex::new(RaiseLedger::default())),
            surfaces,
            scheduler,
            events,
            config,
        }
    }

    #[must_use]
    pub fn current_view(&self) -> ViewType {
        self.state.lock().current
    }

    /// Views reachable through [`Navigator::back_view`], oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ViewType> {
        self.state.lock().history.clone()
    }

    /// Switch to `target`; `is_back` suppresses the history push.
    pub fn change_view(&self, target: ViewType, is_back: bool) {
        let previous = {
            let mut state = self.state.lock();
            if state.current == target {
                return;
            }
            let previous = state.current;
            state.current = target;
            if !is_back {
                state.history.push(previous);
            }
            previous
        };

        debug!(target: LOG_TARGET, "View {previous} -> {target}");
        self.events.emit(AppEvent::ViewChanged {
            from: previous,
            to: target,
        });

        if previous == ViewType::Playing || target == ViewType::Playing {
            return;
        }
        self.choreograph(previous, target);
    }

    /// Return to the previous view.
    ///
    /// # Errors
    ///
    /// Returns `EmptyViewHistory` when there is nowhere to go back to.
    pub fn back_view(&self) -> Result<()> {
        let previous = self
            .state
            .lock()
            .history
            .pop()
            .ok_or(CoreError::EmptyViewHistory)?;
        self.change_view(previous, true);
        Ok(())
    }

    fn choreograph(&self, exiting: ViewType, entering: ViewType) {
        let (Some(exit_surface), Some(enter_surface)) = (
            self.surfaces.query_surface(exiting),
            self.surfaces.query_surface(entering),
        ) else {
            debug!(target: LOG_TARGET, "Surface missing for {exiting} or {entering}, skipping transition");
            return;
        };

        match Transition::classify(exiting, entering) {
            Transition::EnterDetail => {
                enter_surface.add_class(TransitionClass::ShowWithCover);
                exit_surface.remove_class(TransitionClass::Show);
            }
            Transition::ExitDetail => {
                enter_surface.add_class(TransitionClass::Show);
                exit_surface.remove_class(TransitionClass::ShowWithCover);
            }
            Transition::Lateral => {
                enter_surface.add_class(TransitionClass::Show);
                exit_surface.remove_class(TransitionClass::Show);
            }
        }

        let order = if entering == ViewType::VolsType {
            self.config.overlay_stack_order
        } else {
            self.config.raised_stack_order
        };
        let generation = {
            let mut ledger = self.ledger.lock();
            let generation = ledger.raise(entering.id());
            enter_surface.set_stack_order(order);
            generation
        };

        schedule_lowering(
            self.scheduler.as_ref(),
            &self.ledger,
            self.config.teardown_delay(),
            exiting.id().to_string(),
            exit_surface,
            self.config.background_stack_order,
            generation,
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Surface, TransitionClass, ViewSurface, ViewType};
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    #[derive(Default)]
    pub struct FakeSurface {
        pub order: Mutex<i32>,
        pub classes: Mutex<HashSet<TransitionClass>>,
    }

    impl FakeSurface {
        pub fn order(&self) -> i32 {
            *self.order.lock()
        }

        pub fn has(&self, class: TransitionClass) -> bool {
            self.classes.lock().contains(&class)
        }
    }

    impl Surface for FakeSurface {
        fn set_stack_order(&self, order: i32) {
            *self.order.lock() = order;
        }

        fn add_class(&self, class: TransitionClass) {
            self.classes.lock().insert(class);
        }

        fn remove_class(&self, class: TransitionClass) {
            self.classes.lock().remove(&class);
        }
    }

    /// One fake surface per view, except the ones left out.
    pub struct FakeSurfaces(pub HashMap<ViewType, Arc<FakeSurface>>);

    impl FakeSurfaces {
        pub fn all() -> Self {
            Self::without(&[])
        }

        pub fn without(missing: &[ViewType]) -> Self {
            Self(
                ViewType::ALL
                    .into_iter()
                    .filter(|view| !missing.contains(view))
                    .map(|view| (view, Arc::new(FakeSurface::default())))
                    .collect(),
            )
        }

        pub fn get(&self, view: ViewType) -> &FakeSurface {
            &self.0[&view]
        }
    }

    impl ViewSurface for FakeSurfaces {
        fn query_surface(&self, view: ViewType) -> Option<Arc<dyn Surface>> {
            self.0
                .get(&view)
                .map(|surface| Arc::clone(surface) as Arc<dyn Surface>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeSurfaces;
    use super::*;
    use crate::scheduler::testing::ManualScheduler;
    use std::time::Duration;

    fn navigator(surfaces: Arc<FakeSurfaces>) -> (Navigator, Arc<ManualScheduler>, Arc<EventBus>) {
        let scheduler = Arc::new(ManualScheduler::default());
        let events = EventBus::new();
        let navigator = Navigator::new(
            surfaces,
            scheduler.clone(),
            events.clone(),
            ViewConfig::default(),
        );
        (navigator, scheduler, events)
    }

    #[test]
    fn test_view_ids_round_trip() {
        for view in ViewType::ALL {
            assert_eq!(ViewType::from_id(view.id()), Some(view));
        }
        assert_eq!(ViewType::from_id("user-setting"), None);
    }

    #[test]
    fn test_change_then_back() {
        let (navigator, _, _) = navigator(Arc::new(FakeSurfaces::all()));
        assert_eq!(navigator.current_view(), ViewType::Vols);

        navigator.change_view(ViewType::Singles, false);
        assert_eq!(navigator.history(), vec![ViewType::Vols]);

        navigator.back_view().unwrap();
        assert_eq!(navigator.current_view(), ViewType::Vols);
        assert!(navigator.history().is_empty());

        assert!(matches!(
            navigator.back_view(),
            Err(CoreError::EmptyViewHistory)
        ));
        assert_eq!(navigator.current_view(), ViewType::Vols);
    }

    #[test]
    fn test_same_view_is_noop() {
        let (navigator, scheduler, events) = navigator(Arc::new(FakeSurfaces::all()));
        let mut rx = events.subscribe();

        navigator.change_view(ViewType::Vols, false);

        assert!(navigator.history().is_empty());
        assert!(scheduler.pending().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_change_view_emits_event() {
        let (navigator, _, events) = navigator(Arc::new(FakeSurfaces::all()));
        let mut rx = events.subscribe();

        navigator.change_view(ViewType::Articles, false);

        assert_eq!(
            rx.try_recv().unwrap(),
            AppEvent::ViewChanged {
                from: ViewType::Vols,
                to: ViewType::Articles
            }
        );
    }

    #[test]
    fn test_enter_detail_choreography() {
        let surfaces = Arc::new(FakeSurfaces::all());
        let (navigator, scheduler, _) = navigator(surfaces.clone());
        surfaces.get(ViewType::Vols).add_class(TransitionClass::Show);

        navigator.change_view(ViewType::VolInfo, false);

        let info = surfaces.get(ViewType::VolInfo);
        let vols = surfaces.get(ViewType::Vols);
        assert!(info.has(TransitionClass::ShowWithCover));
        assert!(!vols.has(TransitionClass::Show));
        assert_eq!(info.order(), 5);
        assert_eq!(scheduler.pending(), vec![Duration::from_millis(500)]);

        scheduler.run_all();
        assert_eq!(vols.order(), -1);
    }

    #[test]
    fn test_exit_detail_choreography() {
        let surfaces = Arc::new(FakeSurfaces::all());
        let (navigator, scheduler, _) = navigator(surfaces.clone());

        navigator.change_view(ViewType::Singles, false);
        navigator.change_view(ViewType::SingleInfo, false);
        scheduler.run_all();
        navigator.back_view().unwrap();
        assert_eq!(navigator.current_view(), ViewType::Singles);

        let info = surfaces.get(ViewType::SingleInfo);
        let singles = surfaces.get(ViewType::Singles);
        assert!(singles.has(TransitionClass::Show));
        assert!(!info.has(TransitionClass::ShowWithCover));
    }

    #[test]
    fn test_overlay_raised_higher() {
        let surfaces = Arc::new(FakeSurfaces::all());
        let (navigator, _, _) = navigator(surfaces.clone());

        navigator.change_view(ViewType::VolsType, false);

        assert_eq!(surfaces.get(ViewType::VolsType).order(), 20);
        assert!(surfaces.get(ViewType::VolsType).has(TransitionClass::Show));
    }

    #[test]
    fn test_playing_view_skips_choreography() {
        let surfaces = Arc::new(FakeSurfaces::all());
        let (navigator, scheduler, _) = navigator(surfaces.clone());

        navigator.change_view(ViewType::Playing, false);

        assert_eq!(navigator.current_view(), ViewType::Playing);
        assert_eq!(surfaces.get(ViewType::Playing).order(), 0);
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn test_missing_surface_skips_choreography() {
        let surfaces = Arc::new(FakeSurfaces::without(&[ViewType::User]));
        let (navigator, scheduler, _) = navigator(surfaces.clone());

        navigator.change_view(ViewType::User, false);

        assert_eq!(navigator.current_view(), ViewType::User);
        assert!(!surfaces.get(ViewType::Vols).has(TransitionClass::Show));
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn test_teardown_skipped_when_raised_again() {
        let surfaces = Arc::new(FakeSurfaces::all());
        let (navigator, scheduler, _) = navigator(surfaces.clone());

        // Vols -> Singles schedules Vols' teardown; coming straight back raises Vols again
        navigator.change_view(ViewType::Singles, false);
        navigator.back_view().unwrap();
        assert_eq!(surfaces.get(ViewType::Vols).order(), 5);

        scheduler.run_all();

        assert_eq!(surfaces.get(ViewType::Vols).order(), 5);
        assert_eq!(surfaces.get(ViewType::Singles).order(), -1);
    }

    /// Vols surface whose first background write blocks until released.
    struct GatedSurface {
        order: Mutex<i32>,
        entered: Mutex<Option<std::sync::mpsc::Sender<()>>>,
        release: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    }

    impl Surface for GatedSurface {
        fn set_stack_order(&self, order: i32) {
            if order < 0 {
                let release = self.release.lock().take();
                if let Some(release) = release {
                    let entered = self.entered.lock().take();
                    if let Some(entered) = entered {
                        let _ = entered.send(());
                    }
                    let _ = release.recv();
                }
            }
            *self.order.lock() = order;
        }

        fn add_class(&self, _class: TransitionClass) {}

        fn remove_class(&self, _class: TransitionClass) {}
    }

    struct GatedSurfaces {
        vols: Arc<GatedSurface>,
        others: FakeSurfaces,
    }

    impl ViewSurface for GatedSurfaces {
        fn query_surface(&self, view: ViewType) -> Option<Arc<dyn Surface>> {
            if view == ViewType::Vols {
                Some(Arc::clone(&self.vols) as Arc<dyn Surface>)
            } else {
                self.others.query_surface(view)
            }
        }
    }

    #[test]
    fn test_raise_during_teardown_write_wins() {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let vols = Arc::new(GatedSurface {
            order: Mutex::new(0),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(Some(release_rx)),
        });
        let surfaces = Arc::new(GatedSurfaces {
            vols: Arc::clone(&vols),
            others: FakeSurfaces::all(),
        });
        let scheduler = Arc::new(ManualScheduler::default());
        let navigator = Arc::new(Navigator::new(
            surfaces,
            scheduler.clone(),
            EventBus::new(),
            ViewConfig::default(),
        ));

        navigator.change_view(ViewType::Singles, false);
        let teardown = {
            let scheduler = Arc::clone(&scheduler);
            std::thread::spawn(move || scheduler.run_all())
        };
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        // Coming back while the Vols teardown is mid-write
        let back = {
            let navigator = Arc::clone(&navigator);
            std::thread::spawn(move || navigator.back_view())
        };
        std::thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        teardown.join().unwrap();
        back.join().unwrap().unwrap();

        assert_eq!(navigator.current_view(), ViewType::Vols);
        assert_eq!(*vols.order.lock(), 5);
    }
}
