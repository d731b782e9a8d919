//! Remote corpus source
//!
//! [`RemoteSource`] is the seam the sync engine fetches through.
//! [`HttpRemoteSource`] implements it against the corpus API, validating the
//! payload shape before handing back cache-ready entities.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storage::models::{Chapter, CommentaryEntry, Verse};

use crate::http::{ApiClient, ApiClientConfig, ApiError};
use crate::wire::{Envelope, WireChapter, WireChapterDetail, WireCommentaryDetail};

/// Errors that can occur while fetching from the corpus
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Transport failure or non-success response
    #[error("Network error: {0}")]
    Network(String),

    /// The corpus reports the chapter does not exist
    #[error("Chapter {0} not found")]
    NotFound(u32),

    /// The response decoded but violates the corpus invariants
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl SourceError {
    fn from_api(error: ApiError, chapter: Option<u32>) -> Self {
        match chapter {
            Some(number) if error.is_not_found() => SourceError::NotFound(number),
            _ => SourceError::Network(error.to_string()),
        }
    }
}

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// A chapter together with its verses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterWithVerses {
    /// Chapter record
    pub chapter: Chapter,
    /// Verses in ascending order
    pub verses: Vec<Verse>,
}

/// A chapter together with its commentary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterCommentary {
    /// Chapter record
    pub chapter: Chapter,
    /// Commentary entries in ascending verse order
    pub entries: Vec<CommentaryEntry>,
}

/// Fetch-and-translate boundary to the remote corpus
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch every chapter, without verses
    async fn fetch_chapter_list(&self) -> Result<Vec<Chapter>>;

    /// Fetch one chapter with its verses, stamped with the fetch time
    async fn fetch_chapter(&self, number: u32) -> Result<ChapterWithVerses>;

    /// Fetch one chapter's commentary, stamped with the fetch time
    async fn fetch_commentary(&self, number: u32) -> Result<ChapterCommentary>;
}

/// [`RemoteSource`] over the corpus HTTP API
#[derive(Debug, Clone)]
pub struct HttpRemoteSource {
    client: ApiClient,
}

impl HttpRemoteSource {
    /// Create a source from client configuration
    pub fn new(config: ApiClientConfig) -> Result<Self> {
        let client = ApiClient::new(config).map_err(|e| SourceError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn check_chapter_number(requested: u32, returned: u32) -> Result<()> {
    if requested != returned {
        return Err(SourceError::InvalidResponse(format!(
            "requested chapter {} but received {}",
            requested, returned
        )));
    }
    Ok(())
}

/// Verses must be numbered 1..=verse_count with none missing
fn check_verses(chapter: &Chapter, verses: &[Verse]) -> Result<()> {
    if verses.len() != chapter.verse_count as usize {
        return Err(SourceError::InvalidResponse(format!(
            "chapter {} declares {} verses but {} were returned",
            chapter.number,
            chapter.verse_count,
            verses.len()
        )));
    }

    for (index, verse) in verses.iter().enumerate() {
        if verse.number as usize != index + 1 {
            return Err(SourceError::InvalidResponse(format!(
                "chapter {} verse at position {} is numbered {}",
                chapter.number,
                index + 1,
                verse.number
            )));
        }
    }

    Ok(())
}

/// Commentary must belong to `chapter` and cover each verse at most once,
/// numbered from 1, in ascending order
pub fn check_commentary(chapter: u32, entries: &[CommentaryEntry]) -> Result<()> {
    let mut previous = 0;
    for entry in entries {
        if entry.chapter != chapter {
            return Err(SourceError::InvalidResponse(format!(
                "commentary for chapter {} contains an entry for chapter {}",
                chapter, entry.chapter
            )));
        }
        if entry.verse <= previous {
            return Err(SourceError::InvalidResponse(format!(
                "chapter {} commentary has verse {} after verse {}",
                chapter, entry.verse, previous
            )));
        }
        previous = entry.verse;
    }
    Ok(())
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn fetch_chapter_list(&self) -> Result<Vec<Chapter>> {
        let envelope: Envelope<Vec<WireChapter>> = self
            .client
            .get("surat")
            .await
            .map_err(|e| SourceError::from_api(e, None))?;

        // List entries carry no refresh stamp: they have not been through a
        // full chapter refresh yet.
        let mut chapters: Vec<Chapter> =
            envelope.data.into_iter().map(|c| c.into_chapter(None)).collect();
        chapters.sort_by_key(|c| c.number);

        tracing::debug!("Fetched {} chapters", chapters.len());
        Ok(chapters)
    }

    async fn fetch_chapter(&self, number: u32) -> Result<ChapterWithVerses> {
        let envelope: Envelope<WireChapterDetail> = self
            .client
            .get(&format!("surat/{}", number))
            .await
            .map_err(|e| SourceError::from_api(e, Some(number)))?;

        let detail = envelope.data;
        check_chapter_number(number, detail.chapter.nomor)?;

        let chapter = detail.chapter.into_chapter(Some(now_millis()));
        let mut verses: Vec<Verse> =
            detail.ayat.into_iter().map(|v| v.into_verse(number)).collect();
        verses.sort_by_key(|v| v.number);
        check_verses(&chapter, &verses)?;

        tracing::debug!("Fetched chapter {} with {} verses", number, verses.len());
        Ok(ChapterWithVerses { chapter, verses })
    }

    async fn fetch_commentary(&self, number: u32) -> Result<ChapterCommentary> {
        let envelope: Envelope<WireCommentaryDetail> = self
            .client
            .get(&format!("tafsir/{}", number))
            .await
            .map_err(|e| SourceError::from_api(e, Some(number)))?;

        let detail = envelope.data;
        check_chapter_number(number, detail.chapter.nomor)?;

        let chapter = detail.chapter.into_chapter(Some(now_millis()));
        let mut entries: Vec<CommentaryEntry> =
            detail.tafsir.into_iter().map(|t| t.into_entry(number)).collect();
        entries.sort_by_key(|e| e.verse);
        check_commentary(number, &entries)?;

        tracing::debug!("Fetched {} commentary entries for chapter {}", entries.len(), number);
        Ok(ChapterCommentary { chapter, entries })
    }
}
