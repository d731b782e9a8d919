//! Bookmark management
//!
//! Bookmarks point at a whole chapter or at a single verse. There is at most
//! one bookmark per location: adding one where a bookmark already exists
//! returns the existing bookmark.

use std::sync::Arc;
use storage::models::{Bookmark, NewBookmark};
use storage::{CorpusStore, DatabaseError};
use tokio::sync::Mutex;

/// Errors that can occur during bookmark operations
#[derive(Debug, thiserror::Error)]
pub enum BookmarkError {
    /// Local store failure
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    /// No bookmark with this key
    #[error("Bookmark not found: {0}")]
    NotFound(i64),

    /// Chapter and verse numbers start at 1
    #[error("Invalid location: {0}")]
    InvalidLocation(String),
}

/// Result type for bookmark operations
pub type Result<T> = std::result::Result<T, BookmarkError>;

/// Bookmark service over the local store
pub struct BookmarkService {
    store: Arc<dyn CorpusStore>,
    /// Serializes check-then-insert so a location never gets two bookmarks
    write_lock: Mutex<()>,
}

impl BookmarkService {
    /// Create a new bookmark service
    pub fn new(store: Arc<dyn CorpusStore>) -> Self {
        Self { store, write_lock: Mutex::new(()) }
    }

    /// Save a location, or return the bookmark already saved there
    ///
    /// # Example
    /// ```no_run
    /// # use app_core::bookmarks::BookmarkService;
    /// # use storage::models::NewBookmark;
    /// # async fn example(service: BookmarkService) -> Result<(), Box<dyn std::error::Error>> {
    /// let bookmark = service.add_bookmark(NewBookmark::verse(2, 255, "Ayat Kursi")).await?;
    /// assert!(service.is_bookmarked(2, Some(255)).await?);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add_bookmark(&self, bookmark: NewBookmark) -> Result<Bookmark> {
        validate(&bookmark)?;

        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.bookmark_at(bookmark.chapter, bookmark.verse).await? {
            tracing::debug!("Location already bookmarked as {}", existing.id);
            return Ok(existing);
        }
        self.insert(&bookmark).await
    }

    /// All bookmarks, newest first
    pub async fn bookmarks(&self) -> Result<Vec<Bookmark>> {
        Ok(self.store.bookmarks().await?)
    }

    /// Delete a bookmark by key
    pub async fn remove_bookmark(&self, id: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.delete(id).await
    }

    /// The bookmark saved at exactly this location
    ///
    /// A whole-chapter bookmark (`verse: None`) does not cover its verses.
    pub async fn bookmark_at(&self, chapter: u32, verse: Option<u32>) -> Result<Option<Bookmark>> {
        let found = self.store.bookmarks_at(chapter, verse).await?;
        Ok(found.into_iter().find(|b| b.targets(chapter, verse)))
    }

    /// Whether this exact location is bookmarked
    pub async fn is_bookmarked(&self, chapter: u32, verse: Option<u32>) -> Result<bool> {
        Ok(self.bookmark_at(chapter, verse).await?.is_some())
    }

    /// Remove the bookmark at this location if there is one, otherwise add it
    ///
    /// Returns the new bookmark, or `None` if one was removed.
    pub async fn toggle_bookmark(&self, bookmark: NewBookmark) -> Result<Option<Bookmark>> {
        validate(&bookmark)?;

        let _guard = self.write_lock.lock().await;
        match self.bookmark_at(bookmark.chapter, bookmark.verse).await? {
            Some(existing) => {
                self.delete(existing.id).await?;
                Ok(None)
            }
            None => Ok(Some(self.insert(&bookmark).await?)),
        }
    }

    // Callers hold `write_lock`

    async fn insert(&self, bookmark: &NewBookmark) -> Result<Bookmark> {
        let created_at = chrono::Utc::now().timestamp_millis();
        let saved = self.store.insert_bookmark(bookmark, created_at).await?;
        tracing::info!(
            "Added bookmark {} for chapter {} verse {:?}",
            saved.id,
            saved.chapter,
            saved.verse
        );
        Ok(saved)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        if !self.store.delete_bookmark(id).await? {
            return Err(BookmarkError::NotFound(id));
        }
        tracing::info!("Removed bookmark {}", id);
        Ok(())
    }
}

fn validate(bookmark: &NewBookmark) -> Result<()> {
    if bookmark.chapter == 0 {
        return Err(BookmarkError::InvalidLocation("chapter 0".to_string()));
    }
    if bookmark.verse == Some(0) {
        return Err(BookmarkError::InvalidLocation(format!(
            "chapter {} verse 0",
            bookmark.chapter
        )));
    }
    Ok(())
}
