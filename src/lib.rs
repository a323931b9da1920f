//! Crab Voice - conversation core for the Crab personal assistant
//!
//! This library provides the voice interaction loop of the assistant:
//! - Wake word detection over a live transcript
//! - Listen/speak turn-taking with cooldown gating
//! - Echo and duplicate transcript suppression
//! - Native command dispatch with an LLM fallback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Speech I/O Adapter                      │
//! │   Recognizer  │  Synthesizer  │  Voice presets      │
//! └────────────────────┬────────────────────────────────┘
//!                      │ transcripts / completions
//! ┌────────────────────▼────────────────────────────────┐
//! │             Conversation Controller                  │
//! │   State machine  │  Echo suppressor  │  Timers      │
//! └────────────────────┬────────────────────────────────┘
//!                      │ committed utterances
//! ┌────────────────────▼────────────────────────────────┐
//! │               Intent Dispatcher                      │
//! │   Native rules  │  Action sink  │  LLM              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod intent;
pub mod llm;
pub mod voice;

pub use config::Config;
pub use conversation::{
    Command, ConversationState, Controller, ControllerHandle, Event, Phase, Snapshot,
    StateMachine,
};
pub use error::{Error, Result};
pub use intent::{
    ActionIntent, ActionSink, ConsoleSink, DispatchOutcome, Dispatcher, Lookups, NoLookups,
    Reply, classify,
};
pub use llm::{GeminiClient, History, HistoryEntry, LanguageModel, OfflineModel, Speaker};
pub use voice::{EchoSuppressor, SpeechAdapter, Verdict, VoicePreset, WakeWordDetector};
