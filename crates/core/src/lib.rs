pub mod config;
pub mod export;
pub mod orchestrator;
pub mod remote;
pub mod resolver;
pub mod sync;
pub mod testing;

pub use config::{
    group_by_source, load_series, load_series_from_str, load_settings, validate_series,
    validate_settings, ConfigError, SeriesConfig, Settings, SettingsOverrides, SourceGroups,
};
pub use export::{export_cover, export_metadata, status_code, ExportError, LocalDetails};
pub use orchestrator::{Orchestrator, RunReport, SeriesError, SeriesReport};
pub use remote::{
    wait_until_ready, Image, RemoteApi, RemoteChapter, RemoteError, RemoteSeries, RemoteSource,
    SuwayomiClient,
};
pub use resolver::{ResolveError, SeriesHandle, SeriesResolver};
pub use sync::{local_indices, ChapterSynchronizer, SyncError, SyncReport};
