//! Voice processing module
//!
//! Speech capability traits, the I/O adapter that wraps them, wake word
//! detection, echo suppression and voice presets.

pub mod adapter;
pub mod console;
mod echo;
mod presets;
mod speech;
mod wake_word;

pub use adapter::{
    AdapterSignal, DEFAULT_RESTART_DELAY, ListenOutcome, SpeechAdapter, SpeechCompletion,
    SpeechOutcome, strip_markup,
};
pub use echo::{EchoSuppressor, RejectReason, Verdict, normalize};
pub use presets::{DEFAULT_PRESET, VoiceGender, VoicePreset};
pub use speech::{
    Recognizer, RecognizerError, RecognizerEvent, Synthesizer, Utterance, VoiceInfo,
    VoiceSelection,
};
pub use wake_word::WakeWordDetector;
