use serde::{Deserialize, Serialize};
use std::fmt;

/// The ambient soundscape a scene asks for.
///
/// Story data names presets with free-form strings; anything unrecognized
/// (or absent from a scene that still wants a bed) falls back to `Dark`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AmbientPreset {
    Rain,
    Factory,
    Tension,
    Heartbeat,
    Silence,
    Dark,
}

impl AmbientPreset {
    /// Resolve a story tag to a preset. Never fails.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "rain" => Self::Rain,
            "factory" => Self::Factory,
            "tension" => Self::Tension,
            "heart" | "heartbeat" => Self::Heartbeat,
            "silence" => Self::Silence,
            _ => Self::Dark,
        }
    }

    /// Returns the canonical tag string for this preset.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Rain => "rain",
            Self::Factory => "factory",
            Self::Tension => "tension",
            Self::Heartbeat => "heartbeat",
            Self::Silence => "silence",
            Self::Dark => "dark",
        }
    }
}

impl From<String> for AmbientPreset {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<AmbientPreset> for String {
    fn from(preset: AmbientPreset) -> Self {
        preset.tag().to_string()
    }
}

impl fmt::Display for AmbientPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A short procedural cue fired by a discrete event.
///
/// Unlike ambient presets there is no fallback: an unknown effect tag in
/// story data is a load error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Effect {
    Page,
    Choice,
    Save,
    Chapter,
    Resonance,
}

impl Effect {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "page" => Some(Self::Page),
            "choice" => Some(Self::Choice),
            "save" => Some(Self::Save),
            "chapter" => Some(Self::Chapter),
            "resonance" => Some(Self::Resonance),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Choice => "choice",
            Self::Save => "save",
            Self::Chapter => "chapter",
            Self::Resonance => "resonance",
        }
    }
}

impl TryFrom<String> for Effect {
    type Error = String;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        Self::from_tag(&tag).ok_or_else(|| format!("unknown effect tag '{}'", tag))
    }
}

impl From<Effect> for String {
    fn from(effect: Effect) -> Self {
        effect.tag().to_string()
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
