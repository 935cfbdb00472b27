mod surface;
mod transport;

use crate::surface::DetachedSurface;
use crate::transport::HeadlessFactory;
use cadenza_core::{
    AppEvent, ArticleInfo, CadenzaConfig, Catalog, Content, ContentGateway, ContentStore,
    CoreError, EventBus, LocalCache, Navigator, PlaybackEngine, RemoteSource, Scheduler, Single,
    SplitGateway, TokioScheduler, VolInfo,
};
use cadenza_remote::HttpSource;
use cadenza_storage::SqliteCache;
use std::fs::File;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() {
    // Read logging.enabled before the full config load so the first errors are logged
    init_tracing(check_file_logging_enabled());

    let config = match CadenzaConfig::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            info!(
                "Created a configuration template at {}; review it and restart",
                path.display()
            );
            std::process::exit(0);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    // Shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();
    let ctrlc_token = cancel_token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C, shutting down gracefully...");
        ctrlc_token.cancel();
    }) {
        error!("Failed to set Ctrl+C handler: {}", e);
    }

    if let Err(e) = runtime.block_on(run(&config, cancel_token)) {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: &CadenzaConfig, cancel_token: CancellationToken) -> cadenza_core::Result<()> {
    let events = EventBus::new();
    tokio::spawn(log_app_events(Arc::clone(&events)));

    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current());
    let navigator = Arc::new(Navigator::new(
        Arc::new(DetachedSurface),
        Arc::clone(&scheduler),
        Arc::clone(&events),
        config.view.clone(),
    ));

    let cache = Arc::new(SqliteCache::new().await?);
    let remote = Arc::new(HttpSource::new(&config.remote)?);

    let catalog = Catalog {
        vols: ContentStore::<VolInfo>::new(
            gateway(&cache, &remote),
            Arc::clone(&navigator),
            Arc::clone(&scheduler),
            Arc::clone(&events),
            config,
        ),
        singles: ContentStore::<Single>::new(
            gateway(&cache, &remote),
            Arc::clone(&navigator),
            Arc::clone(&scheduler),
            Arc::clone(&events),
            config,
        ),
        articles: ContentStore::<ArticleInfo>::new(
            gateway(&cache, &remote),
            Arc::clone(&navigator),
            Arc::clone(&scheduler),
            Arc::clone(&events),
            config,
        ),
    };

    let engine = PlaybackEngine::new(
        catalog.clone(),
        Arc::new(HeadlessFactory),
        Arc::clone(&events),
        &config.playback,
        Some(cancel_token.clone()),
    );
    let engine_handle = Arc::clone(&engine).start();

    let syncs = [
        sync_store(&catalog.vols, &cache).await?,
        sync_store(&catalog.singles, &cache).await?,
        sync_store(&catalog.articles, &cache).await?,
    ];

    info!("Current view: {}", navigator.current_view());
    for vol in catalog.vols.display_items() {
        info!("Vol.{} {}", vol.vol, vol.title);
    }

    tokio::select! {
        () = cancel_token.cancelled() => {}
        () = wait_for_syncs(syncs) => {
            info!(
                "Catalog ready: {} vols, {} singles, {} articles",
                catalog.vols.len(),
                catalog.singles.len(),
                catalog.articles.len()
            );
            cancel_token.cancelled().await;
        }
    }

    if let Err(e) = engine_handle.await {
        error!("Playback engine task failed: {}", e);
    }

    if let Err(e) = cache.checkpoint().await {
        warn!("Failed to checkpoint catalog cache: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}

/// Wire one content kind to the shared cache and API client
fn gateway<T: Content>(
    cache: &Arc<SqliteCache>,
    remote: &Arc<HttpSource>,
) -> Arc<dyn ContentGateway<T>> {
    let local: Arc<dyn LocalCache<T>> = cache.clone();
    let remote: Arc<dyn RemoteSource<T>> = remote.clone();
    Arc::new(SplitGateway::new(local, remote))
}

/// Show the cached collection and start reconciling it in the background
async fn sync_store<T: Content>(
    store: &Arc<ContentStore<T>>,
    cache: &SqliteCache,
) -> cadenza_core::Result<JoinHandle<cadenza_core::Result<()>>> {
    match cache.last_cached_at(T::KIND).await {
        Ok(Some(at)) => info!("{} last cached at {}", T::KIND, at),
        Ok(None) => info!("No cached {} yet", T::KIND),
        Err(e) => warn!("Failed to read cache timestamp for {}: {}", T::KIND, e),
    }
    store.init().await
}

async fn wait_for_syncs(handles: [JoinHandle<cadenza_core::Result<()>>; 3]) {
    for handle in handles {
        match handle.await {
            // Reconcile failures are already reported through ReconcileFailed
            Ok(_) => {}
            Err(e) => error!("Catalog sync task failed: {}", e),
        }
    }
}

/// Log every application event to the console
async fn log_app_events(events: Arc<EventBus>) {
    let mut rx = events.subscribe();

    loop {
        match rx.recv().await {
            Ok(event) => match &event {
                AppEvent::CollectionUpdated { kind, len } => {
                    info!("{} updated: {} items", kind, len);
                }
                AppEvent::ReconcileFailed { kind, message } => {
                    warn!("Could not refresh {}: {}", kind, message);
                }
                AppEvent::ViewChanged { from, to } => {
                    info!("View: {} -> {}", from, to);
                }
                AppEvent::TrackChanged {
                    playing_type,
                    index,
                    track,
                } => {
                    info!(
                        "Now playing {} #{}: {} - {}",
                        playing_type, index, track.artist, track.name
                    );
                }
                AppEvent::StatusChanged { status } => {
                    info!("Playback status: {:?}", status);
                }
                AppEvent::ModeChanged { mode } => {
                    info!("Playing mode: {:?}", mode);
                }
                AppEvent::VolumeChanged { volume } => {
                    info!("Volume: {}%", volume);
                }
                AppEvent::ScrollBack { .. }
                | AppEvent::HighlightItem { .. }
                | AppEvent::BackgroundChanged { .. }
                | AppEvent::TimeUpdated { .. } => {
                    // Presentation-only
                }
            },
            Err(RecvError::Closed) => {
                info!("Event channel closed");
                break;
            }
            Err(RecvError::Lagged(n)) => {
                info!("Missed {} events", n);
            }
        }
    }
}

/// Check if file logging is enabled by reading the config file.
/// Returns `false` if config doesn't exist or can't be parsed.
fn check_file_logging_enabled() -> bool {
    #[derive(serde::Deserialize)]
    struct PartialConfig {
        #[serde(default)]
        logging: PartialLoggingConfig,
    }
    #[derive(serde::Deserialize, Default)]
    struct PartialLoggingConfig {
        #[serde(default)]
        enabled: bool,
    }

    let Ok(content) = std::fs::read_to_string(CadenzaConfig::config_path()) else {
        return false;
    };

    toml::from_str::<PartialConfig>(&content)
        .map(|c| c.logging.enabled)
        .unwrap_or(false)
}

/// Initialize tracing with console output and optional file logging
fn init_tracing(file_logging_enabled: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest_retry=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer();

    if file_logging_enabled {
        let log_path = cadenza_core::log_file_path();

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match File::create(&log_path) {
            Ok(file) => {
                let file_layer = tracing_subscriber::fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt_layer)
                    .with(file_layer)
                    .init();

                return;
            }
            Err(e) => {
                eprintln!("Failed to create log file at {}: {e}", log_path.display());
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
