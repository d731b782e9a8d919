//! Local corpus store
//!
//! A keyed, queryable cache of the four corpus collections. Every operation
//! is local; mutations publish a [`StoreEvent`] once committed. No operation
//! spans more than one collection, so callers that touch several collections
//! (a chapter refresh, say) get no atomicity across them.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::database::{DatabaseConfig, DatabaseError, Migration, Result, SqliteDatabase};
use crate::events::{ChangeFeed, ChangeKind, Collection, CollectionSubscription, StoreEvent};
use crate::models::{
    AudioUrls, Bookmark, Chapter, ChapterQuery, CommentaryEntry, NewBookmark, Place, Verse,
};

const SCHEMA_V1: &str = "
CREATE TABLE chapters (
    number INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    name_latin TEXT NOT NULL,
    verse_count INTEGER NOT NULL,
    place TEXT NOT NULL,
    meaning TEXT NOT NULL,
    description TEXT NOT NULL,
    audio TEXT NOT NULL,
    last_updated INTEGER
);
CREATE INDEX idx_chapters_name_latin ON chapters (name_latin);
CREATE INDEX idx_chapters_place ON chapters (place);
CREATE TABLE verses (
    chapter INTEGER NOT NULL REFERENCES chapters (number),
    number INTEGER NOT NULL,
    text_arabic TEXT NOT NULL,
    text_latin TEXT NOT NULL,
    translation TEXT NOT NULL,
    audio TEXT NOT NULL,
    PRIMARY KEY (chapter, number)
);
CREATE TABLE commentary (
    chapter INTEGER NOT NULL,
    verse INTEGER NOT NULL,
    text TEXT NOT NULL,
    PRIMARY KEY (chapter, verse)
);
CREATE TABLE bookmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chapter INTEGER NOT NULL,
    verse INTEGER,
    created_at INTEGER NOT NULL,
    title TEXT NOT NULL
);
CREATE INDEX idx_bookmarks_location ON bookmarks (chapter, verse);
CREATE INDEX idx_bookmarks_created_at ON bookmarks (created_at)
";

fn migrations() -> Vec<Migration> {
    vec![Migration::new(1, "Corpus cache and bookmarks", SCHEMA_V1)]
}

/// Keyed collections backing the reader
///
/// Reads are ordered by primary key unless documented otherwise.
/// Bulk inserts with duplicate keys fail as a whole.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Look up a chapter by number
    async fn chapter(&self, number: u32) -> Result<Option<Chapter>>;

    /// List chapters matching a query
    async fn chapters(&self, query: &ChapterQuery) -> Result<Vec<Chapter>>;

    /// Number of cached chapters
    async fn chapter_count(&self) -> Result<u64>;

    /// Chapters never refreshed or last refreshed before `cutoff_ms`
    async fn stale_chapters(&self, cutoff_ms: i64) -> Result<Vec<Chapter>>;

    /// Insert chapters that are not cached yet
    async fn insert_chapters(&self, chapters: &[Chapter]) -> Result<()>;

    /// Insert or replace a chapter by number
    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<()>;

    /// Look up a single verse
    async fn verse(&self, chapter: u32, number: u32) -> Result<Option<Verse>>;

    /// All cached verses of a chapter
    async fn verses(&self, chapter: u32) -> Result<Vec<Verse>>;

    /// Insert verses
    async fn insert_verses(&self, verses: &[Verse]) -> Result<()>;

    /// Delete every verse of a chapter, returning how many were removed
    async fn delete_verses(&self, chapter: u32) -> Result<u64>;

    /// Look up the commentary for one verse
    async fn commentary_entry(&self, chapter: u32, verse: u32) -> Result<Option<CommentaryEntry>>;

    /// All cached commentary of a chapter
    async fn commentary(&self, chapter: u32) -> Result<Vec<CommentaryEntry>>;

    /// Insert commentary entries
    async fn insert_commentary(&self, entries: &[CommentaryEntry]) -> Result<()>;

    /// Delete every commentary entry of a chapter
    async fn delete_commentary(&self, chapter: u32) -> Result<u64>;

    /// Look up a bookmark by key
    async fn bookmark(&self, id: i64) -> Result<Option<Bookmark>>;

    /// All bookmarks, newest first
    async fn bookmarks(&self) -> Result<Vec<Bookmark>>;

    /// Bookmarks targeting exactly this location
    async fn bookmarks_at(&self, chapter: u32, verse: Option<u32>) -> Result<Vec<Bookmark>>;

    /// Insert a bookmark, assigning the next sequential key
    async fn insert_bookmark(&self, bookmark: &NewBookmark, created_at: i64) -> Result<Bookmark>;

    /// Delete a bookmark by key, returning whether it existed
    async fn delete_bookmark(&self, id: i64) -> Result<bool>;

    /// Observe committed mutations of one collection
    fn subscribe(&self, collection: Collection) -> CollectionSubscription;
}

/// SQLite implementation of [`CorpusStore`]
pub struct SqliteCorpusStore {
    db: SqliteDatabase,
    feed: ChangeFeed,
}

impl SqliteCorpusStore {
    /// Open the store at the configured path and bring its schema up to date
    pub async fn open(config: DatabaseConfig) -> Result<Self> {
        let db = SqliteDatabase::open(&config).await?;
        Self::from_database(db).await
    }

    /// Open a throwaway in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        let db = SqliteDatabase::in_memory().await?;
        Self::from_database(db).await
    }

    /// Wrap an already-open database, applying pending migrations
    pub async fn from_database(db: SqliteDatabase) -> Result<Self> {
        db.migrate(&migrations()).await?;
        Ok(Self { db, feed: ChangeFeed::default() })
    }

    /// The change feed mutations are published on
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Close the underlying database
    pub async fn close(&self) {
        self.db.close().await;
        tracing::debug!("Corpus store closed");
    }

    fn publish(&self, collection: Collection, change: ChangeKind, chapter: Option<u32>) {
        self.feed.publish(StoreEvent::new(collection, change, chapter));
    }
}

fn decode_audio(raw: &str) -> Result<AudioUrls> {
    Ok(serde_json::from_str(raw)?)
}

fn chapter_from_row(row: &SqliteRow) -> Result<Chapter> {
    let audio: String = row.try_get("audio")?;
    let place: String = row.try_get("place")?;

    Ok(Chapter {
        number: row.try_get("number")?,
        name: row.try_get("name")?,
        name_latin: row.try_get("name_latin")?,
        verse_count: row.try_get("verse_count")?,
        place: Place::parse(&place),
        meaning: row.try_get("meaning")?,
        description: row.try_get("description")?,
        audio: decode_audio(&audio)?,
        last_updated: row.try_get("last_updated")?,
    })
}

fn verse_from_row(row: &SqliteRow) -> Result<Verse> {
    let audio: String = row.try_get("audio")?;

    Ok(Verse {
        chapter: row.try_get("chapter")?,
        number: row.try_get("number")?,
        text_arabic: row.try_get("text_arabic")?,
        text_latin: row.try_get("text_latin")?,
        translation: row.try_get("translation")?,
        audio: decode_audio(&audio)?,
    })
}

fn commentary_from_row(row: &SqliteRow) -> Result<CommentaryEntry> {
    Ok(CommentaryEntry {
        chapter: row.try_get("chapter")?,
        verse: row.try_get("verse")?,
        text: row.try_get("text")?,
    })
}

fn bookmark_from_row(row: &SqliteRow) -> Result<Bookmark> {
    Ok(Bookmark {
        id: row.try_get("id")?,
        chapter: row.try_get("chapter")?,
        verse: row.try_get("verse")?,
        created_at: row.try_get("created_at")?,
        title: row.try_get("title")?,
    })
}

#[async_trait]
impl CorpusStore for SqliteCorpusStore {
    async fn chapter(&self, number: u32) -> Result<Option<Chapter>> {
        let row = sqlx::query("SELECT * FROM chapters WHERE number = ?")
            .bind(number)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(chapter_from_row).transpose()
    }

    async fn chapters(&self, query: &ChapterQuery) -> Result<Vec<Chapter>> {
        let rows = match &query.place {
            Some(place) => {
                sqlx::query("SELECT * FROM chapters WHERE LOWER(place) = LOWER(?) ORDER BY number")
                    .bind(place.tag())
                    .fetch_all(self.db.pool())
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM chapters ORDER BY number")
                    .fetch_all(self.db.pool())
                    .await?
            }
        };

        // Text matching happens here rather than in SQL so that case folding
        // covers non-ASCII names too.
        let mut chapters = Vec::with_capacity(rows.len());
        for row in &rows {
            let chapter = chapter_from_row(row)?;
            if query.matches(&chapter) {
                chapters.push(chapter);
            }
        }
        Ok(chapters)
    }

    async fn chapter_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chapters")
            .fetch_one(self.db.pool())
            .await?;

        u64::try_from(count).map_err(|_| DatabaseError::Corrupt(format!("chapter count {}", count)))
    }

    async fn stale_chapters(&self, cutoff_ms: i64) -> Result<Vec<Chapter>> {
        let rows = sqlx::query(
            "SELECT * FROM chapters
             WHERE last_updated IS NULL OR last_updated < ?
             ORDER BY number",
        )
        .bind(cutoff_ms)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(chapter_from_row).collect()
    }

    async fn insert_chapters(&self, chapters: &[Chapter]) -> Result<()> {
        if chapters.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.pool().begin().await?;
        for chapter in chapters {
            sqlx::query(
                "INSERT INTO chapters
                 (number, name, name_latin, verse_count, place, meaning, description, audio, last_updated)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(chapter.number)
            .bind(&chapter.name)
            .bind(&chapter.name_latin)
            .bind(chapter.verse_count)
            .bind(chapter.place.tag())
            .bind(&chapter.meaning)
            .bind(&chapter.description)
            .bind(serde_json::to_string(&chapter.audio)?)
            .bind(chapter.last_updated)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.publish(Collection::Chapters, ChangeKind::Inserted { count: chapters.len() }, None);
        Ok(())
    }

    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<()> {
        // ON CONFLICT rather than REPLACE: REPLACE deletes the old row first,
        // which the verses foreign key would reject.
        sqlx::query(
            "INSERT INTO chapters
             (number, name, name_latin, verse_count, place, meaning, description, audio, last_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (number) DO UPDATE SET
                name = excluded.name,
                name_latin = excluded.name_latin,
                verse_count = excluded.verse_count,
                place = excluded.place,
                meaning = excluded.meaning,
                description = excluded.description,
                audio = excluded.audio,
                last_updated = excluded.last_updated",
        )
        .bind(chapter.number)
        .bind(&chapter.name)
        .bind(&chapter.name_latin)
        .bind(chapter.verse_count)
        .bind(chapter.place.tag())
        .bind(&chapter.meaning)
        .bind(&chapter.description)
        .bind(serde_json::to_string(&chapter.audio)?)
        .bind(chapter.last_updated)
        .execute(self.db.pool())
        .await?;

        self.publish(Collection::Chapters, ChangeKind::Upserted, Some(chapter.number));
        Ok(())
    }

    async fn verse(&self, chapter: u32, number: u32) -> Result<Option<Verse>> {
        let row = sqlx::query("SELECT * FROM verses WHERE chapter = ? AND number = ?")
            .bind(chapter)
            .bind(number)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(verse_from_row).transpose()
    }

    async fn verses(&self, chapter: u32) -> Result<Vec<Verse>> {
        let rows = sqlx::query("SELECT * FROM verses WHERE chapter = ? ORDER BY number")
            .bind(chapter)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(verse_from_row).collect()
    }

    async fn insert_verses(&self, verses: &[Verse]) -> Result<()> {
        if verses.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.pool().begin().await?;
        for verse in verses {
            sqlx::query(
                "INSERT INTO verses (chapter, number, text_arabic, text_latin, translation, audio)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(verse.chapter)
            .bind(verse.number)
            .bind(&verse.text_arabic)
            .bind(&verse.text_latin)
            .bind(&verse.translation)
            .bind(serde_json::to_string(&verse.audio)?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        let chapter = verses.first().map(|v| v.chapter);
        self.publish(Collection::Verses, ChangeKind::Inserted { count: verses.len() }, chapter);
        Ok(())
    }

    async fn delete_verses(&self, chapter: u32) -> Result<u64> {
        let result = sqlx::query("DELETE FROM verses WHERE chapter = ?")
            .bind(chapter)
            .execute(self.db.pool())
            .await?;

        let count = result.rows_affected();
        self.publish(Collection::Verses, ChangeKind::Deleted { count }, Some(chapter));
        Ok(count)
    }

    async fn commentary_entry(&self, chapter: u32, verse: u32) -> Result<Option<CommentaryEntry>> {
        let row = sqlx::query("SELECT * FROM commentary WHERE chapter = ? AND verse = ?")
            .bind(chapter)
            .bind(verse)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(commentary_from_row).transpose()
    }

    async fn commentary(&self, chapter: u32) -> Result<Vec<CommentaryEntry>> {
        let rows = sqlx::query("SELECT * FROM commentary WHERE chapter = ? ORDER BY verse")
            .bind(chapter)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(commentary_from_row).collect()
    }

    async fn insert_commentary(&self, entries: &[CommentaryEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.pool().begin().await?;
        for entry in entries {
            sqlx::query("INSERT INTO commentary (chapter, verse, text) VALUES (?, ?, ?)")
                .bind(entry.chapter)
                .bind(entry.verse)
                .bind(&entry.text)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        let chapter = entries.first().map(|e| e.chapter);
        self.publish(Collection::Commentary, ChangeKind::Inserted { count: entries.len() }, chapter);
        Ok(())
    }

    async fn delete_commentary(&self, chapter: u32) -> Result<u64> {
        let result = sqlx::query("DELETE FROM commentary WHERE chapter = ?")
            .bind(chapter)
            .execute(self.db.pool())
            .await?;

        let count = result.rows_affected();
        self.publish(Collection::Commentary, ChangeKind::Deleted { count }, Some(chapter));
        Ok(count)
    }

    async fn bookmark(&self, id: i64) -> Result<Option<Bookmark>> {
        let row = sqlx::query("SELECT * FROM bookmarks WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(bookmark_from_row).transpose()
    }

    async fn bookmarks(&self) -> Result<Vec<Bookmark>> {
        let rows = sqlx::query("SELECT * FROM bookmarks ORDER BY created_at DESC, id DESC")
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(bookmark_from_row).collect()
    }

    async fn bookmarks_at(&self, chapter: u32, verse: Option<u32>) -> Result<Vec<Bookmark>> {
        let rows = sqlx::query("SELECT * FROM bookmarks WHERE chapter = ? AND verse IS ? ORDER BY id")
            .bind(chapter)
            .bind(verse)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(bookmark_from_row).collect()
    }

    async fn insert_bookmark(&self, bookmark: &NewBookmark, created_at: i64) -> Result<Bookmark> {
        let result = sqlx::query(
            "INSERT INTO bookmarks (chapter, verse, created_at, title) VALUES (?, ?, ?, ?)",
        )
        .bind(bookmark.chapter)
        .bind(bookmark.verse)
        .bind(created_at)
        .bind(&bookmark.title)
        .execute(self.db.pool())
        .await?;

        let saved = Bookmark {
            id: result.last_insert_rowid(),
            chapter: bookmark.chapter,
            verse: bookmark.verse,
            created_at,
            title: bookmark.title.clone(),
        };

        self.publish(Collection::Bookmarks, ChangeKind::Inserted { count: 1 }, Some(saved.chapter));
        Ok(saved)
    }

    async fn delete_bookmark(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        let count = result.rows_affected();
        if count > 0 {
            self.publish(Collection::Bookmarks, ChangeKind::Deleted { count }, None);
        }
        Ok(count > 0)
    }

    fn subscribe(&self, collection: Collection) -> CollectionSubscription {
        self.feed.subscribe(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Narrator;

    fn chapter(number: u32, name_latin: &str, place: Place, last_updated: Option<i64>) -> Chapter {
        let mut audio = AudioUrls::new();
        audio.insert(Narrator::MisyariRasyidAlAfasi, format!("{:03}.mp3", number));

        Chapter {
            number,
            name: format!("name-{}", number),
            name_latin: name_latin.to_string(),
            verse_count: 3,
            place,
            meaning: format!("meaning of {}", name_latin),
            description: String::new(),
            audio,
            last_updated,
        }
    }

    fn verses(chapter: u32, count: u32) -> Vec<Verse> {
        (1..=count)
            .map(|number| Verse {
                chapter,
                number,
                text_arabic: format!("arabic {}:{}", chapter, number),
                text_latin: format!("latin {}:{}", chapter, number),
                translation: format!("translation {}:{}", chapter, number),
                audio: AudioUrls::new(),
            })
            .collect()
    }

    async fn seeded_store() -> SqliteCorpusStore {
        let store = SqliteCorpusStore::in_memory().await.unwrap();
        store
            .insert_chapters(&[
                chapter(1, "Al-Fatihah", Place::Mecca, Some(1_000)),
                chapter(2, "Al-Baqarah", Place::Medina, None),
                chapter(3, "Ali 'Imran", Place::Medina, Some(5_000)),
            ])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_chapter_round_trip() {
        let store = seeded_store().await;

        let fetched = store.chapter(1).await.unwrap().unwrap();
        assert_eq!(fetched, chapter(1, "Al-Fatihah", Place::Mecca, Some(1_000)));
        assert!(store.chapter(99).await.unwrap().is_none());
        assert_eq!(store.chapter_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_chapter_insert_fails_whole_batch() {
        let store = SqliteCorpusStore::in_memory().await.unwrap();
        let result = store
            .insert_chapters(&[
                chapter(7, "Al-A'raf", Place::Mecca, None),
                chapter(7, "Al-A'raf", Place::Mecca, None),
            ])
            .await;

        assert!(result.is_err());
        assert_eq!(store.chapter_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_key() {
        let store = seeded_store().await;
        store.insert_verses(&verses(2, 3)).await.unwrap();

        let mut updated = chapter(2, "Al-Baqarah", Place::Medina, Some(9_000));
        updated.meaning = "The Cow".to_string();
        store.upsert_chapter(&updated).await.unwrap();

        assert_eq!(store.chapter(2).await.unwrap().unwrap(), updated);
        assert_eq!(store.chapter_count().await.unwrap(), 3);
        assert_eq!(store.verses(2).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_stale_chapters_ordered_by_number() {
        let store = seeded_store().await;

        let stale = store.stale_chapters(2_000).await.unwrap();
        let numbers: Vec<u32> = stale.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_chapter_queries() {
        let store = seeded_store().await;

        let medina = store.chapters(&ChapterQuery::all().place(Place::Medina)).await.unwrap();
        assert_eq!(medina.len(), 2);

        let search = store.chapters(&ChapterQuery::all().search("BAQARAH")).await.unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].number, 2);

        let by_number = store.chapters(&ChapterQuery::all().search("3")).await.unwrap();
        assert_eq!(by_number.len(), 1);
        assert_eq!(by_number[0].number, 3);

        let none = store
            .chapters(&ChapterQuery::all().place(Place::Mecca).search("imran"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_verse_delete_then_insert() {
        let store = seeded_store().await;
        store.insert_verses(&verses(1, 7)).await.unwrap();
        store.insert_verses(&verses(2, 3)).await.unwrap();

        assert_eq!(store.delete_verses(1).await.unwrap(), 7);
        assert!(store.verses(1).await.unwrap().is_empty());
        assert_eq!(store.verses(2).await.unwrap().len(), 3);

        store.insert_verses(&verses(1, 7)).await.unwrap();
        let reloaded = store.verses(1).await.unwrap();
        let numbers: Vec<u32> = reloaded.iter().map(|v| v.number).collect();
        assert_eq!(numbers, (1..=7).collect::<Vec<_>>());

        let single = store.verse(1, 4).await.unwrap().unwrap();
        assert_eq!(single.translation, "translation 1:4");
    }

    #[tokio::test]
    async fn test_verses_require_existing_chapter() {
        let store = seeded_store().await;
        assert!(store.insert_verses(&verses(50, 2)).await.is_err());
    }

    #[tokio::test]
    async fn test_commentary_scoped_per_chapter() {
        let store = seeded_store().await;
        let entries = |chapter: u32| {
            (1..=3)
                .map(|verse| CommentaryEntry { chapter, verse, text: format!("tafsir {}", verse) })
                .collect::<Vec<_>>()
        };

        store.insert_commentary(&entries(1)).await.unwrap();
        store.insert_commentary(&entries(2)).await.unwrap();

        assert_eq!(store.delete_commentary(1).await.unwrap(), 3);
        assert!(store.commentary(1).await.unwrap().is_empty());
        assert_eq!(store.commentary(2).await.unwrap().len(), 3);
        assert_eq!(store.commentary_entry(2, 2).await.unwrap().unwrap().text, "tafsir 2");
    }

    #[tokio::test]
    async fn test_bookmark_keys_are_sequential() {
        let store = SqliteCorpusStore::in_memory().await.unwrap();

        let first = store.insert_bookmark(&NewBookmark::chapter(1, "Opening"), 10).await.unwrap();
        let second = store.insert_bookmark(&NewBookmark::verse(2, 255, "Kursi"), 20).await.unwrap();
        assert!(second.id > first.id);

        let all = store.bookmarks().await.unwrap();
        assert_eq!(all, vec![second.clone(), first.clone()]);

        assert_eq!(store.bookmarks_at(2, Some(255)).await.unwrap(), vec![second.clone()]);
        assert!(store.bookmarks_at(2, None).await.unwrap().is_empty());
        assert_eq!(store.bookmarks_at(1, None).await.unwrap(), vec![first.clone()]);

        assert!(store.delete_bookmark(second.id).await.unwrap());
        assert!(!store.delete_bookmark(second.id).await.unwrap());
        assert!(store.bookmark(second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mutations_notify_subscribers() {
        let store = seeded_store().await;
        let mut verse_events = store.subscribe(Collection::Verses);
        let mut chapter_events = store.subscribe(Collection::Chapters);

        store.insert_verses(&verses(1, 2)).await.unwrap();
        store.delete_verses(1).await.unwrap();

        let inserted = verse_events.recv().await.unwrap();
        assert_eq!(inserted.change, ChangeKind::Inserted { count: 2 });
        assert_eq!(inserted.chapter, Some(1));

        let deleted = verse_events.recv().await.unwrap();
        assert_eq!(deleted.change, ChangeKind::Deleted { count: 2 });

        assert!(chapter_events.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::new(dir.path().join("corpus.db"));

        {
            let store = SqliteCorpusStore::open(config.clone()).await.unwrap();
            store
                .insert_chapters(&[chapter(1, "Al-Fatihah", Place::Mecca, None)])
                .await
                .unwrap();
            store.close().await;
        }

        let store = SqliteCorpusStore::open(config).await.unwrap();
        assert_eq!(store.chapter_count().await.unwrap(), 1);
    }
}
