//! Storage layer for Quran Reader
//!
//! This crate provides the cached corpus entities, the SQLite-backed local
//! store with change notifications, and the sled-backed preference store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod corpus;
pub mod database;
pub mod events;
pub mod kv;
pub mod models;
pub mod preferences;

pub use corpus::{CorpusStore, SqliteCorpusStore};
pub use database::{DatabaseConfig, DatabaseError, Migration, SqliteDatabase, SynchronousMode};
pub use events::{ChangeFeed, ChangeKind, Collection, CollectionSubscription, StoreEvent};
pub use kv::{KvConfig, KvError, KvScope, KvStore};
pub use models::{
    AudioUrls, Bookmark, Chapter, ChapterQuery, CommentaryEntry, Narrator, NewBookmark, Place,
    Verse,
};
pub use preferences::{ColorMode, PreferenceStore};
