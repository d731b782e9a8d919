//! Corpus entities
//!
//! These are the shapes persisted by the local store. Chapters, verses and
//! commentary entries are sourced from the corpus API; bookmarks are created
//! locally.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Audio recitation URLs keyed by narrator
pub type AudioUrls = BTreeMap<Narrator, String>;

/// One of the fixed set of reciters the corpus provides audio for
///
/// # Examples
/// ```
/// use storage::models::Narrator;
///
/// let narrator = Narrator::from_id("03").unwrap();
/// assert_eq!(narrator.slug(), "Abdurrahman-as-Sudais");
/// assert_eq!(Narrator::default().id(), "05");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Narrator {
    /// Abdullah Al-Juhany
    #[serde(rename = "01")]
    AbdullahAlJuhany,
    /// Abdul Muhsin Al-Qasim
    #[serde(rename = "02")]
    AbdulMuhsinAlQasim,
    /// Abdurrahman as-Sudais
    #[serde(rename = "03")]
    AbdurrahmanAsSudais,
    /// Ibrahim Al-Dossari
    #[serde(rename = "04")]
    IbrahimAlDossari,
    /// Misyari Rasyid Al-Afasi
    #[default]
    #[serde(rename = "05")]
    MisyariRasyidAlAfasi,
}

impl Narrator {
    /// Every narrator, in identifier order
    pub const ALL: [Narrator; 5] = [
        Narrator::AbdullahAlJuhany,
        Narrator::AbdulMuhsinAlQasim,
        Narrator::AbdurrahmanAsSudais,
        Narrator::IbrahimAlDossari,
        Narrator::MisyariRasyidAlAfasi,
    ];

    /// Two-digit identifier used by the corpus API
    pub fn id(&self) -> &'static str {
        match self {
            Narrator::AbdullahAlJuhany => "01",
            Narrator::AbdulMuhsinAlQasim => "02",
            Narrator::AbdurrahmanAsSudais => "03",
            Narrator::IbrahimAlDossari => "04",
            Narrator::MisyariRasyidAlAfasi => "05",
        }
    }

    /// Look up a narrator by its API identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.id() == id)
    }

    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Narrator::AbdullahAlJuhany => "Abdullah Al-Juhany",
            Narrator::AbdulMuhsinAlQasim => "Abdul Muhsin Al-Qasim",
            Narrator::AbdurrahmanAsSudais => "Abdurrahman as-Sudais",
            Narrator::IbrahimAlDossari => "Ibrahim Al-Dossari",
            Narrator::MisyariRasyidAlAfasi => "Misyari Rasyid Al-Afasi",
        }
    }

    /// Directory name used by the audio host
    pub fn slug(&self) -> &'static str {
        match self {
            Narrator::AbdullahAlJuhany => "Abdullah-Al-Juhany",
            Narrator::AbdulMuhsinAlQasim => "Abdul-Muhsin-Al-Qasim",
            Narrator::AbdurrahmanAsSudais => "Abdurrahman-as-Sudais",
            Narrator::IbrahimAlDossari => "Ibrahim-Al-Dossari",
            Narrator::MisyariRasyidAlAfasi => "Misyari-Rasyid-Al-Afasi",
        }
    }
}

impl fmt::Display for Narrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Narrator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_id(s).ok_or_else(|| format!("unknown narrator id: {}", s))
    }
}

/// Place of revelation tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Place {
    /// Revealed in Mecca
    Mecca,
    /// Revealed in Medina
    Medina,
    /// Any tag the corpus reports that is not one of the above
    Other(String),
}

impl Place {
    /// Parse a tag as reported by the corpus (case-insensitive)
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "mekah" | "makkah" | "mecca" => Place::Mecca,
            "madinah" | "medina" => Place::Medina,
            _ => Place::Other(tag.trim().to_string()),
        }
    }

    /// Canonical tag as stored
    pub fn tag(&self) -> &str {
        match self {
            Place::Mecca => "Mekah",
            Place::Medina => "Madinah",
            Place::Other(tag) => tag,
        }
    }
}

impl From<String> for Place {
    fn from(tag: String) -> Self {
        Place::parse(&tag)
    }
}

impl From<Place> for String {
    fn from(place: Place) -> Self {
        place.tag().to_string()
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A numbered chapter of the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Chapter number (1..=N), the primary key
    pub number: u32,
    /// Name in the original script
    pub name: String,
    /// Transliterated name
    pub name_latin: String,
    /// Declared number of verses
    pub verse_count: u32,
    /// Place of revelation
    pub place: Place,
    /// Short meaning of the name
    pub meaning: String,
    /// Long description
    pub description: String,
    /// Full-chapter recitations
    #[serde(default)]
    pub audio: AudioUrls,
    /// Epoch milliseconds of the last refresh; `None` means never refreshed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

impl Chapter {
    /// Whether this record is due for a refresh at `now_ms`
    ///
    /// A chapter that was never refreshed is always stale.
    pub fn is_stale(&self, now_ms: i64, window_ms: i64) -> bool {
        match self.last_updated {
            Some(updated) => now_ms - updated > window_ms,
            None => true,
        }
    }
}

/// A single verse within a chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verse {
    /// Owning chapter number
    pub chapter: u32,
    /// Verse number within the chapter, starting at 1
    pub number: u32,
    /// Original-script text
    pub text_arabic: String,
    /// Transliteration
    pub text_latin: String,
    /// Translation
    pub translation: String,
    /// Per-verse recitations
    #[serde(default)]
    pub audio: AudioUrls,
}

/// Commentary attached to one verse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentaryEntry {
    /// Owning chapter number
    pub chapter: u32,
    /// Verse the commentary explains
    pub verse: u32,
    /// Commentary body
    pub text: String,
}

/// A saved location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    /// Store-assigned sequential key
    pub id: i64,
    /// Bookmarked chapter
    pub chapter: u32,
    /// Bookmarked verse; `None` targets the whole chapter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verse: Option<u32>,
    /// Epoch milliseconds of creation
    pub created_at: i64,
    /// Caller-chosen display title
    pub title: String,
}

impl Bookmark {
    /// Whether this bookmark targets exactly the given location
    pub fn targets(&self, chapter: u32, verse: Option<u32>) -> bool {
        self.chapter == chapter && self.verse == verse
    }
}

/// Parameters for creating a bookmark
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBookmark {
    /// Chapter to bookmark
    pub chapter: u32,
    /// Verse to bookmark, if any
    pub verse: Option<u32>,
    /// Display title
    pub title: String,
}

impl NewBookmark {
    /// Bookmark a whole chapter
    pub fn chapter(chapter: u32, title: impl Into<String>) -> Self {
        Self { chapter, verse: None, title: title.into() }
    }

    /// Bookmark a single verse
    pub fn verse(chapter: u32, verse: u32, title: impl Into<String>) -> Self {
        Self { chapter, verse: Some(verse), title: title.into() }
    }
}

/// Filter for listing chapters
///
/// Both criteria are optional; an empty query lists every chapter. Results
/// are always ordered by chapter number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterQuery {
    /// Only chapters revealed at this place
    pub place: Option<Place>,
    /// Transliterated-name or meaning substring, or an exact chapter number
    pub search: Option<String>,
}

impl ChapterQuery {
    /// Query matching every chapter
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a place of revelation
    pub fn place(mut self, place: Place) -> Self {
        self.place = Some(place);
        self
    }

    /// Restrict to a search term; blank terms are ignored
    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        let trimmed = term.trim();
        self.search = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
        self
    }

    /// Evaluate the query against a single chapter
    pub fn matches(&self, chapter: &Chapter) -> bool {
        if let Some(place) = &self.place {
            if !place.tag().eq_ignore_ascii_case(chapter.place.tag()) {
                return false;
            }
        }

        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                chapter.name_latin.to_lowercase().contains(&term)
                    || chapter.meaning.to_lowercase().contains(&term)
                    || chapter.number.to_string() == term
            }
            None => true,
        }
    }
}
