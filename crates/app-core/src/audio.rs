//! Audio recitation playback
//!
//! The playback transport itself is an external capability behind
//! [`AudioTransport`]. [`PlaybackController`] decides what to play: a full
//! chapter, or a single verse that advances to the next verse when it ends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use storage::models::{Chapter, Narrator};

/// Default audio host
pub const DEFAULT_AUDIO_BASE_URL: &str = "https://equran.nos.wjv-1.neo.id";

/// Errors that can occur during playback
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AudioError {
    /// The transport could not load or play the track
    #[error("Playback failed: {0}")]
    Transport(String),

    /// The verse does not exist in the chapter
    #[error("Verse {verse} is outside chapter {chapter} ({verse_count} verses)")]
    VerseOutOfRange {
        /// Chapter number
        chapter: u32,
        /// Requested verse
        verse: u32,
        /// Verses in the chapter
        verse_count: u32,
    },
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Where recitation files are hosted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHostConfig {
    /// Host base URL, without a trailing slash
    pub base_url: String,
}

impl Default for AudioHostConfig {
    fn default() -> Self {
        Self { base_url: DEFAULT_AUDIO_BASE_URL.to_string() }
    }
}

impl AudioHostConfig {
    /// Create a config for a host
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Full-chapter recitation, e.g. `.../audio-full/Misyari-Rasyid-Al-Afasi/001.mp3`
    pub fn chapter_url(&self, narrator: Narrator, chapter: u32) -> String {
        format!("{}/audio-full/{}/{:03}.mp3", self.base(), narrator.slug(), chapter)
    }

    /// Single-verse recitation, e.g. `.../audio-partial/Misyari-Rasyid-Al-Afasi/002255.mp3`
    pub fn verse_url(&self, narrator: Narrator, chapter: u32, verse: u32) -> String {
        format!(
            "{}/audio-partial/{}/{:03}{:03}.mp3",
            self.base(),
            narrator.slug(),
            chapter,
            verse
        )
    }
}

/// Playback capability: play a URL, report position and duration
#[async_trait]
pub trait AudioTransport: Send + Sync {
    /// Replace the current source
    async fn load(&self, url: &str) -> Result<()>;

    /// Start or resume playback
    async fn play(&self) -> Result<()>;

    /// Pause playback
    async fn pause(&self) -> Result<()>;

    /// Jump to a position in the current source
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Output volume in `0.0..=1.0`
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Current position
    fn position(&self) -> Duration;

    /// Length of the current source, once known
    fn duration(&self) -> Option<Duration>;
}

/// What is currently loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Nothing loaded
    #[default]
    Idle,
    /// A full-chapter recitation
    Chapter,
    /// A single verse
    Verse,
}

/// Observable playback state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// Whether audio is playing
    pub playing: bool,
    /// Loaded track
    pub url: Option<String>,
    /// Chapter of the loaded track
    pub chapter: Option<u32>,
    /// Verse of the loaded track in verse mode
    pub verse: Option<u32>,
    /// Verses in the loaded chapter
    pub verse_count: u32,
    /// What kind of track is loaded
    pub mode: PlaybackMode,
    /// Narrator used for the next track
    pub narrator: Narrator,
    /// Volume in `0.0..=1.0`
    pub volume: f32,
    /// Muted tracks play at volume zero
    pub muted: bool,
}

/// Playback state machine over an [`AudioTransport`]
pub struct PlaybackController {
    transport: Arc<dyn AudioTransport>,
    host: AudioHostConfig,
    state: PlaybackState,
}

impl PlaybackController {
    /// Create an idle controller
    pub fn new(
        transport: Arc<dyn AudioTransport>,
        host: AudioHostConfig,
        narrator: Narrator,
        volume: f32,
    ) -> Self {
        Self {
            transport,
            host,
            state: PlaybackState {
                playing: false,
                url: None,
                chapter: None,
                verse: None,
                verse_count: 0,
                mode: PlaybackMode::Idle,
                narrator,
                volume: volume.clamp(0.0, 1.0),
                muted: false,
            },
        }
    }

    /// Current state
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Narrator for subsequent tracks; the loaded track is not reloaded
    pub fn set_narrator(&mut self, narrator: Narrator) {
        self.state.narrator = narrator;
    }

    /// Play a whole chapter from the start
    pub async fn play_chapter(&mut self, chapter: &Chapter) -> Result<()> {
        let url = self.host.chapter_url(self.state.narrator, chapter.number);
        self.start(url, chapter, None, PlaybackMode::Chapter).await
    }

    /// Play a single verse; when it ends the next verse follows
    pub async fn play_verse(&mut self, chapter: &Chapter, verse: u32) -> Result<()> {
        if verse == 0 || verse > chapter.verse_count {
            return Err(AudioError::VerseOutOfRange {
                chapter: chapter.number,
                verse,
                verse_count: chapter.verse_count,
            });
        }

        let url = self.host.verse_url(self.state.narrator, chapter.number, verse);
        self.start(url, chapter, Some(verse), PlaybackMode::Verse).await
    }

    async fn start(
        &mut self,
        url: String,
        chapter: &Chapter,
        verse: Option<u32>,
        mode: PlaybackMode,
    ) -> Result<()> {
        tracing::debug!("Loading {}", url);
        self.state.url = Some(url.clone());
        self.state.chapter = Some(chapter.number);
        self.state.verse = verse;
        self.state.verse_count = chapter.verse_count;
        self.state.mode = mode;

        self.transport.load(&url).await?;
        self.transport.set_volume(self.effective_volume()).await?;
        self.resume().await
    }

    /// Resume the loaded track
    pub async fn resume(&mut self) -> Result<()> {
        match self.transport.play().await {
            Ok(()) => {
                self.state.playing = true;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error playing audio: {}", e);
                self.state.playing = false;
                Err(e)
            }
        }
    }

    /// Pause the loaded track
    pub async fn pause(&mut self) -> Result<()> {
        self.transport.pause().await?;
        self.state.playing = false;
        Ok(())
    }

    /// Play/pause control for a chapter page
    ///
    /// Starts the full chapter unless a track of this chapter is loaded.
    pub async fn toggle_play_pause(&mut self, chapter: &Chapter) -> Result<()> {
        if self.state.chapter != Some(chapter.number) || self.state.url.is_none() {
            return self.play_chapter(chapter).await;
        }

        if self.state.playing {
            self.pause().await
        } else {
            self.resume().await
        }
    }

    /// Stop and unload; the last chapter is remembered
    pub async fn stop(&mut self) -> Result<()> {
        self.transport.pause().await?;
        self.state.playing = false;
        self.state.url = None;
        self.state.verse = None;
        self.state.mode = PlaybackMode::Idle;
        Ok(())
    }

    /// Handle the transport reporting the end of the track
    ///
    /// In verse mode the next verse starts while one remains; otherwise
    /// playback stops. Returns the verse now playing, if any.
    pub async fn on_track_ended(&mut self) -> Result<Option<u32>> {
        if let (PlaybackMode::Verse, Some(chapter), Some(verse)) =
            (self.state.mode, self.state.chapter, self.state.verse)
        {
            if verse < self.state.verse_count {
                let next = verse + 1;
                let url = self.host.verse_url(self.state.narrator, chapter, next);
                tracing::debug!("Advancing to verse {} of chapter {}", next, chapter);

                self.state.url = Some(url.clone());
                self.state.verse = Some(next);
                self.transport.load(&url).await?;
                self.transport.set_volume(self.effective_volume()).await?;
                self.resume().await?;
                return Ok(Some(next));
            }
        }

        self.stop().await?;
        Ok(None)
    }

    /// Set the volume, clamped to `0.0..=1.0`
    pub async fn set_volume(&mut self, volume: f32) -> Result<f32> {
        self.state.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.transport.set_volume(self.effective_volume()).await?;
        Ok(self.state.volume)
    }

    /// Flip mute; the volume setting is kept. Returns whether now muted.
    pub async fn toggle_mute(&mut self) -> Result<bool> {
        self.state.muted = !self.state.muted;
        self.transport.set_volume(self.effective_volume()).await?;
        Ok(self.state.muted)
    }

    fn effective_volume(&self) -> f32 {
        if self.state.muted {
            0.0
        } else {
            self.state.volume
        }
    }

    /// Jump to a percentage of the track; ignored until the duration is known
    pub async fn seek_percent(&mut self, percent: f64) -> Result<()> {
        let Some(duration) = self.transport.duration() else {
            return Ok(());
        };

        let fraction = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) / 100.0 };
        self.transport.seek(duration.mul_f64(fraction)).await
    }

    /// Elapsed share of the track in percent
    pub fn progress(&self) -> Option<f64> {
        let duration = self.transport.duration()?;
        if duration.is_zero() {
            return None;
        }
        Some(self.transport.position().as_secs_f64() / duration.as_secs_f64() * 100.0)
    }
}

/// Render seconds as `m:ss`
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}
