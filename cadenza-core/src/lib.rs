pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod model;
pub mod pagination;
pub mod paths;
pub mod player;
pub mod reducer;
pub mod scheduler;
pub mod store;
pub mod time;
pub mod transport;
pub mod view;

pub use config::{
    CadenzaConfig, CatalogConfig, LoggingConfig, PlaybackConfig, RemoteConfig, ViewConfig,
    CONFIG_TEMPLATE,
};
pub use error::{CoreError, Result};
pub use events::{AppEvent, EventBus};
pub use gateway::{ContentGateway, LocalCache, RemoteSource, SplitGateway};
pub use model::{
    ArticleInfo, ArticleTrack, Content, ContentKind, Single, Track, TrackMeta, VolInfo, VolTrack,
};
pub use pagination::Pagination;
pub use paths::{
    catalog_cache_db_path, config_dir, config_path, log_file_path, CATALOG_CACHE_DB_FILE_NAME,
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, LOG_FILE_NAME,
};
pub use player::{
    next_index, Direction, PlaySelection, PlayTarget, PlaybackEngine, PlaybackState,
    PlayingMode, PlayingStatus, PlayingType,
};
pub use reducer::{LegacyStore, Mutation};
pub use scheduler::{Scheduler, TokioScheduler};
pub use store::{Catalog, ContentStore};
pub use time::{format_time, progress_percent};
pub use transport::{
    LoadId, Transport, TransportEvent, TransportEventKind, TransportEvents, TransportFactory,
};
pub use view::{Navigator, Surface, TransitionClass, ViewSurface, ViewType};
