//! Voice presets
//!
//! Static mapping from a user-facing preset name to voice search terms and
//! prosody. Selection matches terms against the platform voice list.

use super::speech::{VoiceInfo, VoiceSelection};

/// Preset used when the configured id is unknown
pub const DEFAULT_PRESET: &str = "Cosmic";

/// Voice gender of a preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceGender {
    Female,
    Male,
}

/// A named voice configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoicePreset {
    /// Preset identifier shown in settings
    pub id: &'static str,

    /// Voice gender
    pub gender: VoiceGender,

    /// Search terms matched against voice names and languages, in priority order
    pub terms: &'static [&'static str],

    /// Pitch multiplier
    pub pitch: f32,

    /// Rate multiplier
    pub rate: f32,
}

const PRESETS: &[VoicePreset] = &[
    VoicePreset {
        id: "Cosmic",
        gender: VoiceGender::Female,
        terms: &["google us english", "samantha", "en-us", "female"],
        pitch: 1.0,
        rate: 1.0,
    },
    VoicePreset {
        id: "Nebula",
        gender: VoiceGender::Female,
        terms: &["google uk english female", "zira", "en-gb", "female"],
        pitch: 1.1,
        rate: 1.0,
    },
    VoicePreset {
        id: "Star",
        gender: VoiceGender::Female,
        terms: &["google au english", "karen", "en-au", "female"],
        pitch: 1.15,
        rate: 1.05,
    },
    VoicePreset {
        id: "Nova",
        gender: VoiceGender::Female,
        terms: &["google us english", "samantha", "en-us"],
        pitch: 1.25,
        rate: 1.0,
    },
    VoicePreset {
        id: "Galaxy",
        gender: VoiceGender::Female,
        terms: &["irish", "moira", "tessa", "en-ie"],
        pitch: 0.95,
        rate: 0.95,
    },
    VoicePreset {
        id: "Void",
        gender: VoiceGender::Male,
        terms: &["google uk english male", "daniel", "en-gb", "male"],
        pitch: 0.9,
        rate: 0.9,
    },
    VoicePreset {
        id: "Pulsar",
        gender: VoiceGender::Male,
        terms: &["google us english", "david", "en-us", "male"],
        pitch: 1.0,
        rate: 1.0,
    },
    VoicePreset {
        id: "Orbit",
        gender: VoiceGender::Male,
        terms: &["google in english", "rishi", "en-in", "male"],
        pitch: 1.0,
        rate: 1.1,
    },
    VoicePreset {
        id: "Quantum",
        gender: VoiceGender::Male,
        terms: &["microsoft mark", "google uk english male", "male"],
        pitch: 0.8,
        rate: 0.95,
    },
    VoicePreset {
        id: "Atlas",
        gender: VoiceGender::Male,
        terms: &["google us english", "male"],
        pitch: 0.7,
        rate: 0.9,
    },
];

impl VoicePreset {
    /// All known presets
    #[must_use]
    pub const fn all() -> &'static [Self] {
        PRESETS
    }

    /// Look up a preset by id, falling back to [`DEFAULT_PRESET`]
    #[must_use]
    pub fn find(id: Option<&str>) -> &'static Self {
        id.and_then(|id| PRESETS.iter().find(|p| p.id.eq_ignore_ascii_case(id)))
            .unwrap_or(&PRESETS[0])
    }

    /// Pick a voice from `available`
    ///
    /// The first term that matches any voice name or language wins. Without a
    /// match the first available voice is used; with no voices at all the
    /// platform default is left in place.
    #[must_use]
    pub fn select(&self, available: &[VoiceInfo]) -> VoiceSelection {
        let matched = self.terms.iter().find_map(|term| {
            available.iter().find(|v| {
                v.name.to_lowercase().contains(term) || v.lang.to_lowercase().contains(term)
            })
        });

        VoiceSelection {
            voice: matched.or_else(|| available.first()).cloned(),
            pitch: self.pitch,
            rate: self.rate,
        }
    }
}
