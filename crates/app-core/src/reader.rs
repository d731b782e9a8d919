//! Reader facade
//!
//! Wires the local store, the HTTP corpus source, the connectivity monitor,
//! the sync engine, bookmarks and preferences behind one handle with an
//! explicit open/close lifecycle.

use corpus_client::{
    ApiClientConfig, ChapterCommentary, ChapterWithVerses, HttpRemoteSource, SourceError,
};
use networking::NetworkMonitor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use storage::models::{Chapter, ChapterQuery};
use storage::{
    CorpusStore, DatabaseConfig, DatabaseError, KvConfig, KvError, KvStore, PreferenceStore,
    SqliteCorpusStore,
};

use crate::audio::{AudioHostConfig, AudioTransport, PlaybackController};
use crate::bookmarks::{BookmarkError, BookmarkService};
use crate::sync::{SweepReport, SyncConfig, SyncEngine, SyncError};

/// Environment variable naming the data directory
pub const ENV_DATA_DIR: &str = "QURAN_READER_DATA_DIR";
/// Environment variable overriding the corpus API base URL
pub const ENV_API_URL: &str = "QURAN_READER_API_URL";
/// Environment variable overriding the audio host
pub const ENV_AUDIO_URL: &str = "QURAN_READER_AUDIO_URL";
/// Environment variable overriding the freshness window, in hours
pub const ENV_FRESHNESS_HOURS: &str = "QURAN_READER_FRESHNESS_HOURS";

const CORPUS_DB: &str = "corpus.db";
const PREFERENCES_DIR: &str = "preferences";

/// Errors that can occur while opening or using the reader
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data directory could not be prepared
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Corpus store failure
    #[error(transparent)]
    Storage(#[from] DatabaseError),

    /// Preference store failure
    #[error("Preferences error: {0}")]
    Preferences(#[from] KvError),

    /// Corpus client could not be created
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Sync or load failure
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Bookmark failure
    #[error(transparent)]
    Bookmark(#[from] BookmarkError),
}

/// Result type for reader operations
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Reader configuration
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Directory holding the corpus database and preferences
    pub data_dir: PathBuf,
    /// Corpus API client settings
    pub api: ApiClientConfig,
    /// Recitation host
    pub audio: AudioHostConfig,
    /// Freshness policy
    pub sync: SyncConfig,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".quran-reader"),
            api: ApiClientConfig::default(),
            audio: AudioHostConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl ReaderConfig {
    /// Create a configuration rooted at a data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    /// Defaults overridden by `QURAN_READER_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DATA_DIR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup(ENV_API_URL) {
            config.api.base_url = url;
        }
        if let Some(url) = lookup(ENV_AUDIO_URL) {
            config.audio.base_url = url;
        }
        if let Some(hours) = lookup(ENV_FRESHNESS_HOURS) {
            let hours: u64 = hours.trim().parse().map_err(|_| {
                ReaderError::Config(format!(
                    "{} must be a whole number of hours, got {:?}",
                    ENV_FRESHNESS_HOURS, hours
                ))
            })?;
            config = config.freshness_hours(hours)?;
        }

        Ok(config)
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the corpus API base URL
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api.base_url = url.into();
        self
    }

    /// Set the recitation host
    pub fn audio_url(mut self, url: impl Into<String>) -> Self {
        self.audio.base_url = url.into();
        self
    }

    /// Set the freshness window
    pub fn freshness_window(mut self, window: Duration) -> Self {
        self.sync.freshness_window = window;
        self
    }

    /// Set the freshness window in whole hours
    pub fn freshness_hours(self, hours: u64) -> Result<Self> {
        let seconds = hours.checked_mul(60 * 60).ok_or_else(|| {
            ReaderError::Config(format!("freshness window of {} hours is too large", hours))
        })?;
        Ok(self.freshness_window(Duration::from_secs(seconds)))
    }
}

/// An open reader
pub struct Reader {
    config: ReaderConfig,
    store: Arc<SqliteCorpusStore>,
    engine: SyncEngine,
    bookmarks: BookmarkService,
    preferences: PreferenceStore,
    monitor: NetworkMonitor,
}

impl Reader {
    /// Open the stores under the data directory with a fresh network monitor
    pub async fn open(config: ReaderConfig) -> Result<Self> {
        Self::open_with_monitor(config, NetworkMonitor::new()).await
    }

    /// Open with a caller-supplied network monitor
    pub async fn open_with_monitor(config: ReaderConfig, monitor: NetworkMonitor) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;
        tracing::info!("Opening reader data in {}", config.data_dir.display());

        let store = Arc::new(
            SqliteCorpusStore::open(DatabaseConfig::new(config.data_dir.join(CORPUS_DB))).await?,
        );
        let kv = KvStore::open(&KvConfig::new(config.data_dir.join(PREFERENCES_DIR)))?;
        let preferences = PreferenceStore::new(&kv)?;
        let source = Arc::new(HttpRemoteSource::new(config.api.clone())?);

        let engine = SyncEngine::new(
            store.clone(),
            source,
            Arc::new(monitor.clone()),
            config.sync.clone(),
        );
        let bookmarks = BookmarkService::new(store.clone());

        Ok(Self { config, store, engine, bookmarks, preferences, monitor })
    }

    /// Configuration the reader was opened with
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// The local corpus store, for direct queries and subscriptions
    pub fn store(&self) -> &Arc<SqliteCorpusStore> {
        &self.store
    }

    /// The sync engine
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Bookmarks
    pub fn bookmarks(&self) -> &BookmarkService {
        &self.bookmarks
    }

    /// Preferences
    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    /// Connectivity monitor shared with the engine
    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    /// User-initiated sync; any chapter that failed to refresh is an error
    pub async fn sync_now(&self) -> Result<SweepReport> {
        let report = self.engine.ensure_corpus_initialized().await?;
        for failure in &report.failures {
            tracing::error!("Chapter {} failed to update: {}", failure.chapter, failure.error);
        }
        Ok(report.into_result()?)
    }

    /// Cached chapters matching a query
    pub async fn chapters(&self, query: &ChapterQuery) -> Result<Vec<Chapter>> {
        Ok(self.store.chapters(query).await?)
    }

    /// Chapter and verses, refreshed when possible
    pub async fn load_chapter(&self, number: u32) -> Result<ChapterWithVerses> {
        Ok(self.engine.load_chapter(number).await?)
    }

    /// Chapter and commentary, refreshed when possible
    pub async fn load_commentary(&self, number: u32) -> Result<ChapterCommentary> {
        Ok(self.engine.load_commentary(number).await?)
    }

    /// A playback controller seeded with the saved narrator and volume
    pub fn playback(&self, transport: Arc<dyn AudioTransport>) -> Result<PlaybackController> {
        Ok(PlaybackController::new(
            transport,
            self.config.audio.clone(),
            self.preferences.narrator()?,
            self.preferences.volume()?,
        ))
    }

    /// Flush preferences and close the corpus store
    pub async fn close(self) -> Result<()> {
        self.preferences.flush()?;
        self.store.close().await;
        tracing::info!("Reader closed");
        Ok(())
    }
}
