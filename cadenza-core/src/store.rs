use crate::config::CadenzaConfig;
use crate::error::{CoreError, Result};
use crate::events::{AppEvent, EventBus};
use crate::gateway::ContentGateway;
use crate::model::{ArticleInfo, Content, ContentKind, Single, VolInfo};
use crate::pagination::Pagination;
use crate::scheduler::Scheduler;
use crate::view::Navigator;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const LOG_TARGET: &str = "cadenza::store";

struct StoreState<T> {
    items: Arc<[T]>,
    pagination: Pagination,
    /// Index into the displayed page
    selected_index: usize,
}

impl<T: Content> StoreState<T> {
    fn display_range(&self) -> Range<usize> {
        self.pagination.page_range(self.items.len())
    }

    fn selected_item(&self) -> Option<&T> {
        let page = &self.items[self.display_range()];
        let last = page.len().checked_sub(1)?;
        page.get(self.selected_index.min(last))
    }
}

/// One paged, selectable collection backed by a cache and a remote source.
///
/// The collection is an immutable snapshot: refreshing swaps the whole `Arc<[T]>`, so
/// snapshots handed out earlier stay valid.
pub struct ContentStore<T: Content> {
    state: RwLock<StoreState<T>>,
    gateway: Arc<dyn ContentGateway<T>>,
    navigator: Arc<Navigator>,
    scheduler: Arc<dyn Scheduler>,
    events: Arc<EventBus>,
    reconcile_delay: Duration,
    highlight_delay: Duration,
}

impl<T: Content> ContentStore<T> {
    #[must_use]
    pub fn new(
        gateway: Arc<dyn ContentGateway<T>>,
        navigator: Arc<Navigator>,
        scheduler: Arc<dyn Scheduler>,
        events: Arc<EventBus>,
        config: &CadenzaConfig,
    ) -> Arc<Self> {
        let page_scale = match T::KIND {
            ContentKind::Volume => config.catalog.vol_page_scale,
            ContentKind::Single => config.catalog.single_page_scale,
            ContentKind::Article => config.catalog.article_page_scale,
        };

        Arc::new(Self {
            state: RwLock::new(StoreState {
                items: Arc::from(Vec::new()),
                pagination: Pagination::new(page_scale, config.catalog.pagination_window),
                selected_index: 0,
            }),
            gateway,
            navigator,
            scheduler,
            events,
            reconcile_delay: config.catalog.reconcile_delay(),
            highlight_delay: config.view.highlight_delay(),
        })
    }

    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        T::KIND
    }

    /// Show the cached collection, then reconcile with the remote source in the
    /// background.
    ///
    /// The returned handle resolves to the outcome of that reconciliation.
    ///
    /// # Errors
    ///
    /// Returns an error if the local cache cannot be read.
    pub async fn init(self: &Arc<Self>) -> Result<JoinHandle<Result<()>>> {
        let cached = self.gateway.get_all().await?;
        info!(target: LOG_TARGET, "Loaded {} cached {}", cached.len(), T::KIND);
        self.replace(cached);

        let store = Arc::clone(self);
        Ok(tokio::spawn(async move {
            tokio::time::sleep(store.reconcile_delay).await;
            store.reconcile().await
        }))
    }

    /// Fetch everything newer than the cache, persist it and reload from the cache.
    ///
    /// The displayed collection only changes after a successful read-back.
    ///
    /// # Errors
    ///
    /// Returns the first gateway error; the current snapshot is kept.
    pub async fn reconcile(&self) -> Result<()> {
        match self.try_reconcile().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(target: LOG_TARGET, "Failed to reconcile {}: {}", T::KIND, e);
                self.events.emit(AppEvent::ReconcileFailed {
                    kind: T::KIND,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn try_reconcile(&self) -> Result<()> {
        let key = self.gateway.latest_key().await?;
        let delta = self.gateway.request_since(key).await?;
        if delta.is_empty() {
            debug!(target: LOG_TARGET, "No new {} since {:?}", T::KIND, key);
        } else {
            info!(target: LOG_TARGET, "Fetched {} new {}", delta.len(), T::KIND);
            self.gateway.persist(&delta).await?;
        }

        let all = self.gateway.get_all().await?;
        self.replace(all);
        Ok(())
    }

    /// Swap in a new snapshot, keeping the first occurrence of every id.
    fn replace(&self, items: Vec<T>) {
        let mut seen = HashSet::with_capacity(items.len());
        let items: Arc<[T]> = items
            .into_iter()
            .filter(|item| seen.insert(item.id()))
            .collect();
        let len = items.len();

        {
            let mut state = self.state.write();
            state.items = items;
            state.pagination.clamp(len);
            let page_len = state.display_range().len();
            state.selected_index = state.selected_index.min(page_len.saturating_sub(1));
        }

        self.events.emit(AppEvent::CollectionUpdated { kind: T::KIND, len });
    }

    /// The current snapshot.
    #[must_use]
    pub fn items(&self) -> Arc<[T]> {
        Arc::clone(&self.state.read().items)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item at an absolute index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.state.read().items.get(index).cloned()
    }

    #[must_use]
    pub fn find_by_id(&self, id: u64) -> Option<T> {
        self.state
            .read()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// Absolute index of the item with `id`.
    #[must_use]
    pub fn position_of(&self, id: u64) -> Option<usize> {
        self.state.read().items.iter().position(|item| item.id() == id)
    }

    /// Items on the current page.
    #[must_use]
    pub fn display_items(&self) -> Vec<T> {
        let state = self.state.read();
        state.items[state.display_range()].to_vec()
    }

    #[must_use]
    pub fn total_pages(&self) -> usize {
        let state = self.state.read();
        state.pagination.total_pages(state.items.len())
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.state.read().pagination.current_page()
    }

    /// Page numbers shown by the page selector.
    #[must_use]
    pub fn window_pages(&self) -> Range<usize> {
        let state = self.state.read();
        state.pagination.window_pages(state.items.len())
    }

    #[must_use]
    pub fn window_total(&self) -> usize {
        let state = self.state.read();
        state.pagination.window_total(state.items.len())
    }

    #[must_use]
    pub fn window_index(&self) -> usize {
        self.state.read().pagination.window_index()
    }

    #[must_use]
    pub fn selected_index(&self) -> usize {
        self.state.read().selected_index
    }

    /// The selected item; always present while the current page has items.
    #[must_use]
    pub fn selected_item(&self) -> Option<T> {
        self.state.read().selected_item().cloned()
    }

    /// Jump to `page` and scroll the list back to the top.
    ///
    /// # Errors
    ///
    /// Returns `PageOutOfRange` if the page does not exist.
    pub fn toggle_page(&self, page: usize) -> Result<()> {
        {
            let mut state = self.state.write();
            let len = state.items.len();
            state.pagination.toggle_page(page, len)?;
            let page_len = state.display_range().len();
            state.selected_index = state.selected_index.min(page_len.saturating_sub(1));
        }
        self.events.emit(AppEvent::ScrollBack { kind: T::KIND });
        Ok(())
    }

    /// Show the next window of page numbers; false when already on the last one.
    pub fn next_pagination(&self) -> bool {
        let mut state = self.state.write();
        let len = state.items.len();
        state.pagination.next_window(len)
    }

    /// Show the previous window of page numbers; false when already on the first one.
    pub fn prev_pagination(&self) -> bool {
        self.state.write().pagination.prev_window()
    }

    /// Select an item of the current page and open its info view.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfPage` if `index` is not on the displayed page.
    pub fn select(&self, index: usize) -> Result<()> {
        {
            let mut state = self.state.write();
            let len = state.display_range().len();
            if index >= len {
                return Err(CoreError::IndexOutOfPage { index, len });
            }
            state.selected_index = index;
        }

        self.navigator.change_view(T::KIND.info_view(), false);
        self.events.emit(AppEvent::BackgroundChanged {
            view: T::KIND.collection_view(),
        });
        Ok(())
    }

    /// Reveal the item with `id` in the collection view and highlight it shortly after.
    ///
    /// Does nothing if the item is already selected and its info view is showing.
    ///
    /// # Errors
    ///
    /// Returns `ContentNotFound` if no item has that id.
    pub fn select_by_id(&self, id: u64) -> Result<()> {
        let already_shown = self
            .state
            .read()
            .selected_item()
            .is_some_and(|item| item.id() == id);
        if already_shown && self.navigator.current_view() == T::KIND.info_view() {
            return Ok(());
        }

        let index = {
            let mut state = self.state.write();
            let position = state
                .items
                .iter()
                .position(|item| item.id() == id)
                .ok_or(CoreError::ContentNotFound { kind: T::KIND, id })?;
            state.pagination.reveal(position)
        };

        self.navigator.change_view(T::KIND.collection_view(), false);

        let events = Arc::clone(&self.events);
        self.scheduler.schedule(
            self.highlight_delay,
            Box::new(move || events.emit(AppEvent::HighlightItem { kind: T::KIND, index })),
        );
        Ok(())
    }
}

/// The three content stores the playback engine resolves tracks against.
#[derive(Clone)]
pub struct Catalog {
    pub vols: Arc<ContentStore<VolInfo>>,
    pub singles: Arc<ContentStore<Single>>,
    pub articles: Arc<ContentStore<ArticleInfo>>,
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewConfig;
    use crate::model::TrackMeta;
    use crate::scheduler::testing::ManualScheduler;
    use crate::view::testing::FakeSurfaces;
    use crate::view::ViewType;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn single(id: u64, date: i64) -> Single {
        Single {
            id,
            date,
            meta: TrackMeta {
                name: format!("single {id}"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Singles dated `n..=1`, newest first
    fn descending(n: i64) -> Vec<Single> {
        (1..=n).rev().map(|d| single(d.unsigned_abs(), d)).collect()
    }

    /// In-memory gateway: cache kept newest first, remote answers from a fixed list.
    #[derive(Default)]
    struct FakeGateway {
        cache: Mutex<Vec<Single>>,
        remote: Mutex<Vec<Single>>,
        offline: bool,
        requested: Mutex<Vec<Option<i64>>>,
    }

    #[async_trait]
    impl ContentGateway<Single> for FakeGateway {
        async fn get_all(&self) -> Result<Vec<Single>> {
            let mut all = self.cache.lock().clone();
            all.sort_by(|a, b| b.date.cmp(&a.date));
            Ok(all)
        }

        async fn latest_key(&self) -> Result<Option<i64>> {
            Ok(self.cache.lock().iter().map(|s| s.date).max())
        }

        async fn request_since(&self, key: Option<i64>) -> Result<Vec<Single>> {
            self.requested.lock().push(key);
            if self.offline {
                return Err(CoreError::Remote {
                    reason: "connection refused".to_string(),
                });
            }
            let floor = key.unwrap_or(i64::MIN);
            Ok(self
                .remote
                .lock()
                .iter()
                .filter(|s| s.date > floor)
                .cloned()
                .collect())
        }

        async fn persist(&self, delta: &[Single]) -> Result<()> {
            self.cache.lock().extend_from_slice(delta);
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<ContentStore<Single>>,
        gateway: Arc<FakeGateway>,
        navigator: Arc<Navigator>,
        scheduler: Arc<ManualScheduler>,
        events: Arc<EventBus>,
    }

    fn fixture(gateway: FakeGateway, page_scale: usize) -> Fixture {
        let mut config = CadenzaConfig::default();
        config.catalog.single_page_scale = page_scale;
        config.catalog.pagination_window = 2;

        let gateway = Arc::new(gateway);
        let scheduler = Arc::new(ManualScheduler::default());
        let events = EventBus::new();
        let navigator = Arc::new(Navigator::new(
            Arc::new(FakeSurfaces::all()),
            scheduler.clone(),
            events.clone(),
            ViewConfig::default(),
        ));
        let store = ContentStore::<Single>::new(
            gateway.clone(),
            navigator.clone(),
            scheduler.clone(),
            events.clone(),
            &config,
        );

        Fixture {
            store,
            gateway,
            navigator,
            scheduler,
            events,
        }
    }

    fn dates(items: &[Single]) -> Vec<i64> {
        items.iter().map(|s| s.date).collect()
    }

    #[tokio::test]
    async fn test_reconcile_merges_remote_delta() {
        let gateway = FakeGateway {
            cache: Mutex::new(vec![single(5, 5), single(3, 3), single(1, 1)]),
            remote: Mutex::new(vec![single(7, 7), single(6, 6), single(5, 5)]),
            ..Default::default()
        };
        let f = fixture(gateway, 2);

        let handle = f.store.init().await.unwrap();
        assert_eq!(dates(&f.store.items()), vec![5, 3, 1]);

        handle.await.unwrap().unwrap();

        assert_eq!(*f.gateway.requested.lock(), vec![Some(5)]);
        assert_eq!(dates(&f.store.items()), vec![7, 6, 5, 3, 1]);
        assert_eq!(dates(&f.store.display_items()), vec![7, 6]);
        assert_eq!(f.store.total_pages(), 3);
    }

    #[tokio::test]
    async fn test_empty_delta_skips_persist() {
        let gateway = FakeGateway {
            cache: Mutex::new(vec![single(5, 5)]),
            ..Default::default()
        };
        let f = fixture(gateway, 12);

        f.store.reconcile().await.unwrap();

        assert_eq!(f.gateway.cache.lock().len(), 1);
        assert_eq!(f.store.len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_failure_keeps_cache() {
        let gateway = FakeGateway {
            cache: Mutex::new(vec![single(2, 2), single(1, 1)]),
            offline: true,
            ..Default::default()
        };
        let f = fixture(gateway, 12);
        let mut rx = f.events.subscribe();

        let handle = f.store.init().await.unwrap();
        let result = handle.await.unwrap();

        assert!(matches!(result, Err(CoreError::Remote { .. })));
        assert_eq!(dates(&f.store.items()), vec![2, 1]);

        assert_eq!(
            rx.recv().await.unwrap(),
            AppEvent::CollectionUpdated {
                kind: ContentKind::Single,
                len: 2
            }
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            AppEvent::ReconcileFailed {
                kind: ContentKind::Single,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_first() {
        let f = fixture(FakeGateway::default(), 12);
        let mut dup = single(3, 3);
        dup.meta.name = "duplicate".to_string();

        f.store.replace(vec![single(3, 3), single(2, 2), dup]);

        assert_eq!(f.store.len(), 2);
        assert_eq!(f.store.find_by_id(3).unwrap().meta.name, "single 3");
    }

    #[tokio::test]
    async fn test_old_snapshot_survives_refresh() {
        let f = fixture(FakeGateway::default(), 12);
        f.store.replace(vec![single(1, 1)]);
        let before = f.store.items();

        f.store.replace(vec![single(2, 2), single(1, 1)]);

        assert_eq!(dates(&before), vec![1]);
        assert!(!Arc::ptr_eq(&before, &f.store.items()));
    }

    #[tokio::test]
    async fn test_toggle_page_bounds() {
        let f = fixture(FakeGateway::default(), 2);
        let mut rx = f.events.subscribe();
        assert!(f.store.toggle_page(0).is_ok());
        assert!(f.store.toggle_page(1).is_err());

        f.store.replace(descending(5));
        f.store.toggle_page(2).unwrap();

        assert_eq!(dates(&f.store.display_items()), vec![1]);
        assert!(matches!(
            f.store.toggle_page(3),
            Err(CoreError::PageOutOfRange { page: 3, total: 3 })
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            AppEvent::ScrollBack {
                kind: ContentKind::Single
            }
        );
    }

    #[tokio::test]
    async fn test_page_clamped_when_collection_shrinks() {
        let f = fixture(FakeGateway::default(), 2);
        f.store.replace(descending(6));
        f.store.toggle_page(2).unwrap();
        f.store.select(1).unwrap();

        f.store.replace(vec![single(9, 9)]);

        assert_eq!(f.store.current_page(), 0);
        assert_eq!(f.store.selected_index(), 0);
        assert_eq!(f.store.selected_item().unwrap().id, 9);
    }

    #[tokio::test]
    async fn test_pagination_window() {
        let f = fixture(FakeGateway::default(), 1);
        f.store.replace(descending(5));

        assert_eq!(f.store.window_total(), 3);
        assert_eq!(f.store.window_pages(), 0..2);
        assert!(!f.store.prev_pagination());
        assert!(f.store.next_pagination());
        assert!(f.store.next_pagination());
        assert!(!f.store.next_pagination());
        assert_eq!(f.store.window_pages(), 4..5);
    }

    #[tokio::test]
    async fn test_select_opens_info_view() {
        let f = fixture(FakeGateway::default(), 2);
        f.store.replace(vec![single(3, 3), single(2, 2), single(1, 1)]);
        let mut rx = f.events.subscribe();

        f.store.select(1).unwrap();

        assert_eq!(f.store.selected_item().unwrap().id, 2);
        assert_eq!(f.navigator.current_view(), ViewType::SingleInfo);
        assert!(matches!(rx.try_recv().unwrap(), AppEvent::ViewChanged { .. }));
        assert_eq!(
            rx.try_recv().unwrap(),
            AppEvent::BackgroundChanged {
                view: ViewType::Singles
            }
        );

        assert!(matches!(
            f.store.select(2),
            Err(CoreError::IndexOutOfPage { index: 2, len: 2 })
        ));
    }

    #[tokio::test]
    async fn test_select_by_id_reveals_page() {
        let f = fixture(FakeGateway::default(), 2);
        f.store.replace(vec![single(3, 3), single(2, 2), single(1, 1)]);
        f.navigator.change_view(ViewType::Playing, false);
        let mut rx = f.events.subscribe();

        f.store.select_by_id(1).unwrap();

        assert_eq!(f.store.current_page(), 1);
        assert_eq!(f.navigator.current_view(), ViewType::Singles);
        assert_eq!(f.scheduler.pending(), vec![Duration::from_millis(200)]);

        f.scheduler.run_all();
        assert!(matches!(rx.try_recv().unwrap(), AppEvent::ViewChanged { .. }));
        assert_eq!(
            rx.try_recv().unwrap(),
            AppEvent::HighlightItem {
                kind: ContentKind::Single,
                index: 0
            }
        );
    }

    #[tokio::test]
    async fn test_select_by_id_noop_when_already_shown() {
        let f = fixture(FakeGateway::default(), 2);
        f.store.replace(vec![single(3, 3), single(2, 2)]);
        f.store.select(0).unwrap();
        let history = f.navigator.history();

        f.store.select_by_id(3).unwrap();

        assert_eq!(f.navigator.history(), history);
        assert_eq!(f.navigator.current_view(), ViewType::SingleInfo);
    }

    #[tokio::test]
    async fn test_select_by_id_unknown() {
        let f = fixture(FakeGateway::default(), 2);
        assert!(matches!(
            f.store.select_by_id(42),
            Err(CoreError::ContentNotFound {
                kind: ContentKind::Single,
                id: 42
            })
        ));
    }
}
