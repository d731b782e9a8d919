//! Sync policy engine
//!
//! Decides when cached corpus data is fresh enough to serve and refreshes it
//! from the remote source when it is not. Read-triggered loads always fall
//! back to the cache; explicit sweeps report what failed.
//!
//! At most one refresh per (kind, chapter) is in flight at a time. Callers
//! that arrive while one is running await it and share its result.

use corpus_client::{
    check_commentary, ChapterCommentary, ChapterWithVerses, RemoteSource, SourceError,
};
use networking::Connectivity;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use storage::{CorpusStore, DatabaseError};
use tokio::sync::OnceCell;

/// Maximum age of a cached chapter before it is refreshed
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

const FIRST_RUN_OFFLINE: &str =
    "No data available. Please connect to the internet for first-time setup.";

/// Errors that can occur while syncing or loading corpus data
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// Transport failure or non-success response from the remote source
    #[error("Network error: {0}")]
    Network(String),

    /// The chapter is neither cached nor available remotely
    #[error("Chapter {0} not found")]
    NotFound(u32),

    /// First run attempted offline with an empty store
    #[error("{0}")]
    Initialization(String),

    /// Local store failure
    #[error("Storage error: {0}")]
    Storage(Arc<DatabaseError>),
}

impl From<SourceError> for SyncError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::NotFound(number) => SyncError::NotFound(number),
            SourceError::Network(message) => SyncError::Network(message),
            SourceError::InvalidResponse(message) => {
                SyncError::Network(format!("invalid response: {}", message))
            }
        }
    }
}

impl From<DatabaseError> for SyncError {
    fn from(error: DatabaseError) -> Self {
        SyncError::Storage(Arc::new(error))
    }
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum age of a cached chapter before a sweep refreshes it
    pub freshness_window: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { freshness_window: DEFAULT_FRESHNESS_WINDOW }
    }
}

impl SyncConfig {
    /// Create a configuration with the default window
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the freshness window
    pub fn freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.freshness_window.as_millis()).unwrap_or(i64::MAX)
    }
}

/// What a refresh call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fetched and replaced the cached records
    Refreshed,
    /// Offline; cached records left as they were
    Skipped,
}

/// A chapter whose refresh failed during a sweep
#[derive(Debug, Clone)]
pub struct RefreshFailure {
    /// Chapter number
    pub chapter: u32,
    /// Why the refresh failed
    pub error: SyncError,
}

/// Result of [`SyncEngine::ensure_corpus_initialized`]
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Chapters inserted by a first-run initialization
    pub initialized: usize,
    /// Stale chapters successfully refreshed, in sweep order
    pub refreshed: Vec<u32>,
    /// Stale chapters skipped because connectivity dropped mid-sweep
    pub skipped: Vec<u32>,
    /// Stale chapters whose refresh failed
    pub failures: Vec<RefreshFailure>,
    /// The sweep did nothing because the network was unavailable
    pub offline: bool,
}

impl SweepReport {
    /// Whether every attempted refresh succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn the first failure into an error, for callers that surface them
    pub fn into_result(self) -> Result<SweepReport> {
        match self.failures.first() {
            Some(failure) => Err(failure.error.clone()),
            None => Ok(self),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RefreshKind {
    Chapter,
    Commentary,
}

type FlightKey = (RefreshKind, u32);
type Flight = Arc<OnceCell<Result<RefreshOutcome>>>;

/// Cache freshness policy over a local store and a remote source
pub struct SyncEngine {
    store: Arc<dyn CorpusStore>,
    source: Arc<dyn RemoteSource>,
    connectivity: Arc<dyn Connectivity>,
    config: SyncConfig,
    in_flight: Mutex<HashMap<FlightKey, Flight>>,
}

impl SyncEngine {
    /// Create an engine over injected collaborators
    pub fn new(
        store: Arc<dyn CorpusStore>,
        source: Arc<dyn RemoteSource>,
        connectivity: Arc<dyn Connectivity>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            source,
            connectivity,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The local store this engine writes to
    pub fn store(&self) -> &Arc<dyn CorpusStore> {
        &self.store
    }

    /// Engine configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current connectivity signal
    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Populate an empty store, or refresh stale chapters of a populated one
    ///
    /// An empty store while offline fails with [`SyncError::Initialization`].
    /// First-run initialization stores the chapter list only; verses are
    /// loaded per chapter on demand. The stale sweep runs one chapter at a
    /// time in ascending order and continues past network failures, which
    /// are collected in the report. Store failures abort the sweep.
    pub async fn ensure_corpus_initialized(&self) -> Result<SweepReport> {
        let online = self.is_online();
        let mut report = SweepReport::default();

        if self.store.chapter_count().await? == 0 {
            if !online {
                tracing::warn!("Store is empty and the network is unavailable");
                return Err(SyncError::Initialization(FIRST_RUN_OFFLINE.to_string()));
            }

            tracing::info!("Initializing store with the chapter list");
            let chapters = self.source.fetch_chapter_list().await?;
            self.store.insert_chapters(&chapters).await?;
            report.initialized = chapters.len();
            tracing::info!("Initial data loaded ({} chapters)", chapters.len());
            return Ok(report);
        }

        if !online {
            tracing::debug!("Offline: cached chapters stand as they are");
            report.offline = true;
            return Ok(report);
        }

        let cutoff = chrono::Utc::now().timestamp_millis() - self.config.window_ms();
        let stale = self.store.stale_chapters(cutoff).await?;
        tracing::info!("Found {} chapters that need updating", stale.len());

        for chapter in stale {
            match self.refresh_chapter(chapter.number).await {
                Ok(RefreshOutcome::Refreshed) => report.refreshed.push(chapter.number),
                Ok(RefreshOutcome::Skipped) => report.skipped.push(chapter.number),
                Err(error @ SyncError::Storage(_)) => return Err(error),
                Err(error) => {
                    tracing::warn!("Failed to update chapter {}: {}", chapter.number, error);
                    report.failures.push(RefreshFailure { chapter: chapter.number, error });
                }
            }
        }

        tracing::info!(
            "Update sweep finished: {} refreshed, {} failed",
            report.refreshed.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Replace a chapter and its verses with a fresh copy
    ///
    /// No-op while offline. On fetch failure the cache is left untouched.
    pub async fn refresh_chapter(&self, number: u32) -> Result<RefreshOutcome> {
        if !self.is_online() {
            tracing::debug!("Offline: using cached data for chapter {}", number);
            return Ok(RefreshOutcome::Skipped);
        }

        self.single_flight((RefreshKind::Chapter, number), || self.replace_chapter(number))
            .await
    }

    /// Replace a chapter's commentary with a fresh copy
    ///
    /// Verses and the chapter record are not touched.
    pub async fn refresh_commentary(&self, number: u32) -> Result<RefreshOutcome> {
        if !self.is_online() {
            tracing::debug!("Offline: using cached commentary for chapter {}", number);
            return Ok(RefreshOutcome::Skipped);
        }

        self.single_flight((RefreshKind::Commentary, number), || self.replace_commentary(number))
            .await
    }

    /// Refresh if possible, then read the chapter and its verses from the store
    ///
    /// Refresh failures are logged and the cached copy is served.
    pub async fn load_chapter(&self, number: u32) -> Result<ChapterWithVerses> {
        if let Err(e) = self.refresh_chapter(number).await {
            tracing::warn!("Could not update chapter {}, using cached data: {}", number, e);
        }

        let chapter = self.store.chapter(number).await?.ok_or(SyncError::NotFound(number))?;
        let verses = self.store.verses(number).await?;
        Ok(ChapterWithVerses { chapter, verses })
    }

    /// Refresh if possible, then read the chapter and its commentary from the store
    pub async fn load_commentary(&self, number: u32) -> Result<ChapterCommentary> {
        if let Err(e) = self.refresh_commentary(number).await {
            tracing::warn!(
                "Could not update commentary for chapter {}, using cached data: {}",
                number,
                e
            );
        }

        let chapter = self.store.chapter(number).await?.ok_or(SyncError::NotFound(number))?;
        let entries = self.store.commentary(number).await?;
        Ok(ChapterCommentary { chapter, entries })
    }

    async fn replace_chapter(&self, number: u32) -> Result<RefreshOutcome> {
        tracing::info!("Updating chapter {}", number);
        let fetched = self.source.fetch_chapter(number).await?;

        // Verses are only deleted once a complete replacement is in hand
        self.store.upsert_chapter(&fetched.chapter).await?;
        self.store.delete_verses(number).await?;
        self.store.insert_verses(&fetched.verses).await?;

        tracing::info!("Updated chapter {} ({} verses)", number, fetched.verses.len());
        Ok(RefreshOutcome::Refreshed)
    }

    async fn replace_commentary(&self, number: u32) -> Result<RefreshOutcome> {
        tracing::info!("Updating commentary for chapter {}", number);
        let fetched = self.source.fetch_commentary(number).await?;
        check_commentary(number, &fetched.entries)?;

        // Entries are only deleted once a valid replacement is in hand
        self.store.delete_commentary(number).await?;
        self.store.insert_commentary(&fetched.entries).await?;

        tracing::info!(
            "Updated commentary for chapter {} ({} entries)",
            number,
            fetched.entries.len()
        );
        Ok(RefreshOutcome::Refreshed)
    }

    async fn single_flight<F, Fut>(&self, key: FlightKey, refresh: F) -> Result<RefreshOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RefreshOutcome>>,
    {
        let flight = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&key) {
                Some(flight) => {
                    tracing::debug!("Joining in-flight {:?} refresh of {}", key.0, key.1);
                    flight.clone()
                }
                None => {
                    let flight: Flight = Arc::new(OnceCell::new());
                    in_flight.insert(key, flight.clone());
                    flight
                }
            }
        };

        let result = flight.get_or_init(refresh).await.clone();

        let mut in_flight = self.in_flight.lock();
        if in_flight.get(&key).is_some_and(|current| Arc::ptr_eq(current, &flight)) {
            in_flight.remove(&key);
        }

        result
    }
}
