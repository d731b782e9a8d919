//! Corpus API wire format
//!
//! Every response is wrapped in an envelope whose `data` field holds the
//! payload. Field names follow the API (Indonesian, camelCase).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use storage::models::{AudioUrls, Chapter, CommentaryEntry, Narrator, Place, Verse};

/// Response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Status code echoed in the body
    #[serde(default)]
    pub code: u16,
    /// Status message
    #[serde(default)]
    pub message: String,
    /// Payload
    pub data: T,
}

/// Chapter summary as listed by `/surat`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChapter {
    /// Chapter number
    pub nomor: u32,
    /// Name in the original script
    pub nama: String,
    /// Transliterated name
    pub nama_latin: String,
    /// Verse count
    pub jumlah_ayat: u32,
    /// Place of revelation
    pub tempat_turun: String,
    /// Meaning of the name
    pub arti: String,
    /// Description
    #[serde(default)]
    pub deskripsi: String,
    /// Full-chapter audio keyed by narrator id
    #[serde(default)]
    pub audio_full: BTreeMap<String, String>,
}

/// Chapter with verses as returned by `/surat/{n}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireChapterDetail {
    /// Chapter fields
    #[serde(flatten)]
    pub chapter: WireChapter,
    /// Verses
    pub ayat: Vec<WireVerse>,
}

/// A verse
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireVerse {
    /// Verse number
    pub nomor_ayat: u32,
    /// Original-script text
    pub teks_arab: String,
    /// Transliteration
    pub teks_latin: String,
    /// Translation
    pub teks_indonesia: String,
    /// Per-verse audio keyed by narrator id
    #[serde(default)]
    pub audio: BTreeMap<String, String>,
}

/// Chapter with commentary as returned by `/tafsir/{n}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCommentaryDetail {
    /// Chapter fields
    #[serde(flatten)]
    pub chapter: WireChapter,
    /// Commentary entries
    pub tafsir: Vec<WireCommentary>,
}

/// A commentary entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCommentary {
    /// Verse number
    pub ayat: u32,
    /// Commentary text
    pub teks: String,
}

/// Keep the narrators we know about; unknown ids are dropped
fn audio_urls(raw: &BTreeMap<String, String>) -> AudioUrls {
    raw.iter()
        .filter_map(|(id, url)| Narrator::from_id(id).map(|n| (n, url.clone())))
        .collect()
}

impl WireChapter {
    /// Convert into a chapter record with the given refresh stamp
    pub fn into_chapter(self, last_updated: Option<i64>) -> Chapter {
        Chapter {
            number: self.nomor,
            audio: audio_urls(&self.audio_full),
            name: self.nama,
            name_latin: self.nama_latin,
            verse_count: self.jumlah_ayat,
            place: Place::parse(&self.tempat_turun),
            meaning: self.arti,
            description: self.deskripsi,
            last_updated,
        }
    }
}

impl WireVerse {
    /// Convert into a verse of `chapter`
    pub fn into_verse(self, chapter: u32) -> Verse {
        Verse {
            chapter,
            number: self.nomor_ayat,
            audio: audio_urls(&self.audio),
            text_arabic: self.teks_arab,
            text_latin: self.teks_latin,
            translation: self.teks_indonesia,
        }
    }
}

impl WireCommentary {
    /// Convert into a commentary entry of `chapter`
    pub fn into_entry(self, chapter: u32) -> CommentaryEntry {
        CommentaryEntry { chapter, verse: self.ayat, text: self.teks }
    }
}
