//! Conversation state

use std::fmt;

/// Where the conversation is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Not listening at all (signed out or not yet activated)
    #[default]
    Dormant,
    /// Listening for the wake word only
    AwaitingWake,
    /// Listening for a command
    Open,
    /// Waiting on the dispatcher
    Processing,
    /// Playing a reply
    Speaking,
    /// Listening resumed but input is still gated
    Cooldown,
    /// Forwarding transcripts verbatim; conversation rules off
    Dictation,
}

impl Phase {
    /// Whether the assistant is in an open conversation
    #[must_use]
    pub const fn is_assistant_open(self) -> bool {
        matches!(
            self,
            Self::Open | Self::Processing | Self::Speaking | Self::Cooldown
        )
    }

    /// Whether incoming transcripts are ignored outright
    #[must_use]
    pub const fn is_gated(self) -> bool {
        matches!(self, Self::Processing | Self::Speaking | Self::Cooldown)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dormant => "dormant",
            Self::AwaitingWake => "awaiting-wake",
            Self::Open => "open",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
            Self::Cooldown => "cooldown",
            Self::Dictation => "dictation",
        })
    }
}

/// Per-session conversation memory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub phase: Phase,

    /// Last utterance sent to the dispatcher (lowercase, trimmed)
    pub last_committed: String,

    /// Last reply that finished playing
    pub last_spoken_reply: String,

    /// Live transcript
    pub transcript: String,

    /// Reply handed to synthesis but not yet finished
    pub pending_reply: Option<String>,

    /// Current turn id; async results carry the turn they were issued for
    pub turn: u64,

    /// Bumped on every transcript change while open
    pub transcript_generation: u64,

    /// Recognition permission was refused; no listening until re-activated
    pub listening_blocked: bool,
}

impl ConversationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_assistant_open(&self) -> bool {
        self.phase.is_assistant_open()
    }

    /// Forget everything the current conversation remembered
    ///
    /// Bumps the turn so in-flight results are discarded.
    pub fn reset_memory(&mut self) {
        self.last_committed.clear();
        self.last_spoken_reply.clear();
        self.transcript.clear();
        self.pending_reply = None;
        self.turn += 1;
    }
}
