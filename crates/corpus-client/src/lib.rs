//! Corpus API client
//!
//! This crate fetches chapter lists, chapters with their verses, and chapter
//! commentary from the remote corpus API and translates the wire shapes into
//! the entities cached by the `storage` crate. It neither retries nor caches.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod http;
pub mod source;
pub mod wire;

pub use http::{ApiClient, ApiClientConfig, ApiError};
pub use source::{
    check_commentary, ChapterCommentary, ChapterWithVerses, HttpRemoteSource, RemoteSource,
    SourceError,
};
