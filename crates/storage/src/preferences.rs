//! Reader preferences
//!
//! Appearance and playback settings that survive restarts: color mode,
//! selected narrator and playback volume.

use serde::{Deserialize, Serialize};

use crate::kv::{KvScope, KvStore, Result};
use crate::models::Narrator;

const SCOPE: &str = "prefs";
const COLOR_MODE: &str = "color_mode";
const NARRATOR: &str = "narrator";
const VOLUME: &str = "volume";

/// Default playback volume
pub const DEFAULT_VOLUME: f32 = 0.8;

/// Color mode preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Follow system color scheme
    #[default]
    System,
    /// Always use light mode
    Light,
    /// Always use dark mode
    Dark,
}

impl ColorMode {
    /// Resolve to dark or light given the system signal
    pub fn is_dark(&self, system_prefers_dark: bool) -> bool {
        match self {
            ColorMode::System => system_prefers_dark,
            ColorMode::Light => false,
            ColorMode::Dark => true,
        }
    }
}

/// Persistent reader preferences backed by [`KvStore`]
///
/// # Examples
/// ```
/// use storage::{ColorMode, KvStore, PreferenceStore};
///
/// let prefs = PreferenceStore::new(&KvStore::temporary().unwrap()).unwrap();
/// assert_eq!(prefs.color_mode().unwrap(), ColorMode::System);
///
/// // An explicit toggle overrides the system signal from then on
/// prefs.toggle_dark_mode(false).unwrap();
/// assert!(prefs.is_dark_mode(false).unwrap());
/// ```
#[derive(Clone)]
pub struct PreferenceStore {
    kv: KvStore,
    scope: KvScope,
}

impl PreferenceStore {
    /// Open the preference scope of a key-value store
    pub fn new(kv: &KvStore) -> Result<Self> {
        Ok(Self { kv: kv.clone(), scope: kv.scope(SCOPE)? })
    }

    /// Stored color mode, `System` when never set
    pub fn color_mode(&self) -> Result<ColorMode> {
        self.scope.get_or(COLOR_MODE, ColorMode::default())
    }

    /// Set the color mode
    pub fn set_color_mode(&self, mode: ColorMode) -> Result<()> {
        tracing::debug!("Color mode set to {:?}", mode);
        self.scope.put(COLOR_MODE, &mode)
    }

    /// Whether the dark appearance is in effect
    pub fn is_dark_mode(&self, system_prefers_dark: bool) -> Result<bool> {
        Ok(self.color_mode()?.is_dark(system_prefers_dark))
    }

    /// Flip between light and dark, pinning an explicit choice
    ///
    /// Returns whether dark mode is now in effect.
    pub fn toggle_dark_mode(&self, system_prefers_dark: bool) -> Result<bool> {
        let dark = !self.is_dark_mode(system_prefers_dark)?;
        self.set_color_mode(if dark { ColorMode::Dark } else { ColorMode::Light })?;
        Ok(dark)
    }

    /// Selected narrator
    pub fn narrator(&self) -> Result<Narrator> {
        self.scope.get_or(NARRATOR, Narrator::default())
    }

    /// Select a narrator
    pub fn set_narrator(&self, narrator: Narrator) -> Result<()> {
        self.scope.put(NARRATOR, &narrator)
    }

    /// Playback volume in `0.0..=1.0`
    pub fn volume(&self) -> Result<f32> {
        self.scope.get_or(VOLUME, DEFAULT_VOLUME)
    }

    /// Set playback volume, clamped to `0.0..=1.0`
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.scope.put(VOLUME, &volume.clamp(0.0, 1.0))
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.kv.flush()?;
        Ok(())
    }
}
