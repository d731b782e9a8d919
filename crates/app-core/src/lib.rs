//! Core application logic for Quran Reader
//!
//! This crate contains the cache sync policy, bookmarks, audio playback
//! control and the reader facade that ties them to the stores.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audio;
pub mod bookmarks;
pub mod reader;
pub mod sync;

pub use audio::{
    format_time, AudioError, AudioHostConfig, AudioTransport, PlaybackController, PlaybackMode,
    PlaybackState,
};
pub use bookmarks::{BookmarkError, BookmarkService};
pub use reader::{Reader, ReaderConfig, ReaderError};
pub use sync::{RefreshFailure, RefreshOutcome, SweepReport, SyncConfig, SyncEngine, SyncError};
