//! Narration settings and voice catalog
//!
//! Holds the rate/pitch/voice parameters the user can change between
//! sentences. Knows nothing about timing or the engine's call sequence;
//! the controller snapshots these values onto each speech request.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rate bounds accepted by speech engines
pub const MIN_RATE: f32 = 0.1;
pub const MAX_RATE: f32 = 4.0;

/// A voice as reported by the platform engine. Read-only to us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub name: String,
    pub language: String,
}

impl VoiceDescriptor {
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
        }
    }
}

/// Validated narration parameters plus the enumerated voice catalog.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    rate: f32,
    pitch: f32,
    voice: Option<VoiceDescriptor>,
    language: String,
    /// None until the platform has reported a non-empty catalog.
    /// Once populated it is never replaced.
    voices: Option<Vec<VoiceDescriptor>>,
}

impl SettingsStore {
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            voice: None,
            language: default_language.into(),
            voices: None,
        }
    }

    /// Store the platform's voice catalog. Platforms may report an empty
    /// list until their voices finish loading, so an empty list is a no-op
    /// and the caller re-invokes on a catalog-changed notification.
    ///
    /// Returns true whenever a non-empty catalog was offered, even if the
    /// stored catalog and selection were left untouched — callers use this
    /// to refresh a voice list display without losing the selection.
    pub fn populate_voices(&mut self, platform_voices: Vec<VoiceDescriptor>) -> bool {
        if platform_voices.is_empty() {
            return false;
        }

        if self.voices.as_ref().map_or(true, |v| v.is_empty()) {
            // Default is the first English voice it can find
            let default = platform_voices
                .iter()
                .find(|v| v.language.starts_with("en"))
                .unwrap_or(&platform_voices[0])
                .clone();
            debug!("Voice catalog populated: {} voices, default '{}'", platform_voices.len(), default.name);
            self.language = default.language.clone();
            self.voice = Some(default);
            self.voices = Some(platform_voices);
        }

        true
    }

    /// Select a voice by exact name. Unknown names silently fall back to
    /// the catalog's first entry; callers are expected to pass names drawn
    /// from the populated catalog. Returns None only while the catalog is
    /// empty.
    pub fn set_voice(&mut self, name: &str) -> Option<&VoiceDescriptor> {
        let voices = self.voices.as_ref()?;
        let selected = voices
            .iter()
            .find(|v| v.name == name)
            .or_else(|| voices.first())?
            .clone();

        self.language = selected.language.clone();
        self.voice = Some(selected);
        self.voice.as_ref()
    }

    /// Set the speaking rate, clamped to the supported range. Not-a-number
    /// input is ignored and the previous rate retained.
    pub fn set_rate(&mut self, rate: f32) {
        if rate.is_nan() {
            return;
        }
        self.rate = rate.clamp(MIN_RATE, MAX_RATE);
    }

    /// Set the rate from user-supplied text (e.g. a slider or CLI value).
    /// Non-numeric input is ignored and the previous rate retained.
    pub fn set_rate_text(&mut self, rate: &str) {
        if let Ok(value) = rate.trim().parse::<f32>() {
            self.set_rate(value);
        }
    }

    /// Pitch is passed through unvalidated; engines clamp or ignore
    /// out-of-range values themselves.
    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
    }

    /// Readiness gate: true once the platform has ever reported voices.
    pub fn is_initiated(&self) -> bool {
        self.voices.is_some()
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn voice(&self) -> Option<&VoiceDescriptor> {
        self.voice.as_ref()
    }

    /// Language tag of the selected voice, or the configured default.
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn voices(&self) -> &[VoiceDescriptor] {
        self.voices.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<VoiceDescriptor> {
        vec![
            VoiceDescriptor::new("A", "en-US"),
            VoiceDescriptor::new("B", "fr-FR"),
        ]
    }

    #[test]
    fn test_default_voice_prefers_english() {
        let mut store = SettingsStore::new("en");
        assert!(store.populate_voices(vec![
            VoiceDescriptor::new("B", "fr-FR"),
            VoiceDescriptor::new("A", "en-US"),
        ]));
        assert_eq!(store.voice().unwrap().name, "A");
        assert_eq!(store.language(), "en-US");
    }

    #[test]
    fn test_default_voice_falls_back_to_first() {
        let mut store = SettingsStore::new("en");
        store.populate_voices(vec![
            VoiceDescriptor::new("B", "fr-FR"),
            VoiceDescriptor::new("C", "de-DE"),
        ]);
        assert_eq!(store.voice().unwrap().name, "B");
    }

    #[test]
    fn test_populate_empty_is_noop() {
        let mut store = SettingsStore::new("en");
        assert!(!store.populate_voices(Vec::new()));
        assert!(!store.is_initiated());
        assert!(store.voice().is_none());
    }

    #[test]
    fn test_populate_never_replaces_catalog() {
        let mut store = SettingsStore::new("en");
        store.populate_voices(catalog());
        store.set_voice("B");

        // Re-population reports voices but keeps catalog and selection
        assert!(store.populate_voices(vec![VoiceDescriptor::new("Z", "zh-CN")]));
        assert_eq!(store.voices().len(), 2);
        assert_eq!(store.voice().unwrap().name, "B");
    }

    #[test]
    fn test_set_voice_exact_match() {
        let mut store = SettingsStore::new("en");
        store.populate_voices(catalog());
        let selected = store.set_voice("B").unwrap().clone();
        assert_eq!(selected.name, "B");
        assert_eq!(store.language(), "fr-FR");
    }

    #[test]
    fn test_set_voice_unknown_falls_back_to_first() {
        let mut store = SettingsStore::new("en");
        store.populate_voices(catalog());
        let selected = store.set_voice("no-such-voice").unwrap();
        assert_eq!(selected.name, "A");
    }

    #[test]
    fn test_set_voice_without_catalog() {
        let mut store = SettingsStore::new("en");
        assert!(store.set_voice("A").is_none());
    }

    #[test]
    fn test_rate_clamping() {
        let mut store = SettingsStore::new("en");
        store.set_rate(10.0);
        assert_eq!(store.rate(), 4.0);
        store.set_rate(0.0);
        assert_eq!(store.rate(), 0.1);
        store.set_rate(2.5);
        assert_eq!(store.rate(), 2.5);
    }

    #[test]
    fn test_rate_from_text() {
        let mut store = SettingsStore::new("en");
        store.set_rate_text("3.5");
        assert_eq!(store.rate(), 3.5);

        // Non-numeric input retains the previous value
        store.set_rate_text("x");
        assert_eq!(store.rate(), 3.5);
        store.set_rate_text("NaN");
        assert_eq!(store.rate(), 3.5);

        store.set_rate_text("10");
        assert_eq!(store.rate(), 4.0);
    }

    #[test]
    fn test_pitch_is_unvalidated() {
        let mut store = SettingsStore::new("en");
        store.set_pitch(-3.0);
        assert_eq!(store.pitch(), -3.0);
    }

    #[test]
    fn test_is_initiated() {
        let mut store = SettingsStore::new("en");
        assert!(!store.is_initiated());
        store.populate_voices(catalog());
        assert!(store.is_initiated());
    }
}
