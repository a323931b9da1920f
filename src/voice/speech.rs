//! Speech capability traits
//!
//! Recognition and synthesis are platform collaborators. The core only sees
//! these two traits; everything platform-specific lives behind them.

use std::time::Instant;

use async_trait::async_trait;

use crate::Result;

/// A single recognition result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Recognized text (interim or final)
    pub text: String,

    /// Monotonic arrival sequence number
    pub seq: u64,

    /// Arrival time
    pub at: Instant,

    /// Whether the recognizer finalized this text
    pub is_final: bool,
}

impl Utterance {
    /// Create an utterance stamped with the current instant
    #[must_use]
    pub fn new(text: impl Into<String>, seq: u64, is_final: bool) -> Self {
        Self {
            text: text.into(),
            seq,
            at: Instant::now(),
            is_final,
        }
    }
}

/// Recognizer failure classes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerError {
    /// Microphone or recognition service access refused (terminal)
    PermissionDenied,
    /// Network trouble talking to the recognition service
    Network(String),
    /// Recognizer heard nothing before its own timeout
    NoSpeech,
    /// Any other platform error
    Other(String),
}

impl RecognizerError {
    /// Whether this error ends listening for good
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

/// Events a recognizer pushes into its event channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerEvent {
    /// Audio capture started
    Started,
    /// Recognizer stopped on its own or after `stop()`
    Ended,
    /// Transcript changed
    Result(Utterance),
    /// Recognizer reported an error
    Error(RecognizerError),
}

/// Continuous speech-to-text capability
///
/// Implementations push [`RecognizerEvent`]s into a channel handed to them at
/// construction. `start` and `stop` must return quickly.
pub trait Recognizer: Send + Sync {
    /// Begin producing transcript events
    ///
    /// # Errors
    ///
    /// Returns error if the recognizer cannot be started right now
    fn start(&self, continuous: bool) -> Result<()>;

    /// Stop producing transcript events
    ///
    /// # Errors
    ///
    /// Returns error if the platform refuses to stop
    fn stop(&self) -> Result<()>;
}

/// A platform voice available for synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Human-readable voice name (e.g. "Google UK English Female")
    pub name: String,

    /// BCP 47 language tag (e.g. "en-GB")
    pub lang: String,
}

impl VoiceInfo {
    /// Create a voice description
    #[must_use]
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }
}

/// Voice parameters handed to the synthesizer for one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSelection {
    /// Chosen platform voice, if any voice is available
    pub voice: Option<VoiceInfo>,

    /// Pitch multiplier
    pub pitch: f32,

    /// Rate multiplier
    pub rate: f32,
}

/// Text-to-speech capability
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Voices currently available (may be empty while the platform loads them)
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Speak `text`, resolving when playback finishes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    async fn speak(&self, text: &str, voice: &VoiceSelection) -> Result<()>;

    /// Stop any utterance in progress
    fn cancel(&self);
}
