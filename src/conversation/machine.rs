//! Conversation state machine
//!
//! Pure and synchronous: every (phase, event) pair maps to a new state and a
//! list of commands for the controller to execute. Asynchronous results come
//! back as events tagged with the turn or generation they were issued for;
//! anything stale is dropped here.

use std::time::Duration;

use super::state::{ConversationState, Phase};
use crate::intent::{DispatchOutcome, Reply};
use crate::voice::{EchoSuppressor, SpeechOutcome, Utterance, Verdict, WakeWordDetector};

/// Spoken when a reply comes back empty
pub const EMPTY_REPLY_GUARD: &str = "Done.";

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Start wake-word listening (sign-in, or re-enable after a denial)
    Activate,
    /// Stop everything (sign-out)
    Deactivate,
    /// Live transcript changed
    Transcript(Utterance),
    /// Debounce timer for a transcript generation fired
    DebounceElapsed { generation: u64 },
    /// Dispatcher finished a turn
    DispatchCompleted { turn: u64, outcome: DispatchOutcome },
    /// Synthesis of a turn's reply ended
    SpeechFinished { turn: u64, outcome: SpeechOutcome },
    /// Post-speech cooldown ended
    CooldownElapsed { turn: u64 },
    /// User closed the assistant
    CloseRequested,
    EnterDictation,
    ExitDictation,
    /// Recognizer permission refused
    PermissionDenied,
}

/// Side effects requested by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartListening { continuous: bool },
    StopListening,
    CancelSpeech,
    ResetTranscript,
    Speak { turn: u64, text: String },
    Dispatch { turn: u64, text: String },
    ArmDebounce { generation: u64, after: Duration },
    ArmCooldown { turn: u64, after: Duration },
    /// Forward dictated text to the active text field
    Dictate(String),
}

/// Tunables for the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSettings {
    /// Spoken when the wake word is heard
    pub greeting: String,

    /// How long a transcript must be stable before it is committed
    pub debounce: Duration,

    /// How long transcripts stay gated after speech ends
    pub cooldown: Duration,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            greeting: "Hi".to_string(),
            debounce: Duration::from_millis(500),
            cooldown: Duration::from_millis(600),
        }
    }
}

/// The conversation state machine
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: ConversationState,
    detector: WakeWordDetector,
    settings: MachineSettings,
}

impl StateMachine {
    #[must_use]
    pub fn new(detector: WakeWordDetector, settings: MachineSettings) -> Self {
        Self {
            state: ConversationState::new(),
            detector,
            settings,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ConversationState {
        &self.state
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    #[must_use]
    pub const fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    /// Whether a dispatch result for `turn` would be applied
    #[must_use]
    pub fn accepts_dispatch(&self, turn: u64) -> bool {
        self.state.phase == Phase::Processing && self.state.turn == turn
    }

    /// Apply one event
    pub fn handle(&mut self, event: Event) -> Vec<Command> {
        let before = self.state.phase;

        let commands = match event {
            Event::Activate => self.on_activate(),
            Event::Deactivate => self.on_deactivate(),
            Event::Transcript(utterance) => self.on_transcript(&utterance),
            Event::DebounceElapsed { generation } => self.on_debounce(generation),
            Event::DispatchCompleted { turn, outcome } => self.on_dispatched(turn, outcome),
            Event::SpeechFinished { turn, outcome } => self.on_speech_finished(turn, outcome),
            Event::CooldownElapsed { turn } => self.on_cooldown(turn),
            Event::CloseRequested => self.on_close(),
            Event::EnterDictation => self.on_enter_dictation(),
            Event::ExitDictation => self.on_exit_dictation(),
            Event::PermissionDenied => self.on_permission_denied(),
        };

        if self.state.phase != before {
            tracing::debug!(from = %before, to = %self.state.phase, turn = self.state.turn, "phase changed");
        }

        commands
    }

    fn on_activate(&mut self) -> Vec<Command> {
        match self.state.phase {
            Phase::Dormant | Phase::AwaitingWake => {
                let was_listening =
                    self.state.phase == Phase::AwaitingWake && !self.state.listening_blocked;
                self.state.phase = Phase::AwaitingWake;
                self.state.listening_blocked = false;
                if was_listening {
                    Vec::new()
                } else {
                    vec![Command::StartListening { continuous: true }]
                }
            }
            _ => Vec::new(),
        }
    }

    fn on_deactivate(&mut self) -> Vec<Command> {
        if self.state.phase == Phase::Dormant {
            return Vec::new();
        }

        self.state.reset_memory();
        self.state.phase = Phase::Dormant;
        self.state.listening_blocked = false;
        vec![
            Command::CancelSpeech,
            Command::StopListening,
            Command::ResetTranscript,
        ]
    }

    fn on_transcript(&mut self, utterance: &Utterance) -> Vec<Command> {
        let text = utterance.text.trim();

        match self.state.phase {
            Phase::AwaitingWake => {
                self.state.transcript = text.to_string();
                if self.detector.detect(text).is_some() {
                    self.wake()
                } else {
                    Vec::new()
                }
            }
            Phase::Open => {
                self.state.transcript = text.to_string();
                self.state.transcript_generation += 1;

                let normalized = text.to_lowercase();
                if normalized.is_empty() || normalized == self.state.last_committed {
                    return Vec::new();
                }

                vec![Command::ArmDebounce {
                    generation: self.state.transcript_generation,
                    after: self.settings.debounce,
                }]
            }
            Phase::Dictation => {
                self.state.transcript = text.to_string();
                if utterance.is_final && !text.is_empty() {
                    self.state.transcript.clear();
                    vec![Command::Dictate(text.to_string()), Command::ResetTranscript]
                } else {
                    Vec::new()
                }
            }
            Phase::Dormant | Phase::Processing | Phase::Speaking | Phase::Cooldown => {
                tracing::trace!(phase = %self.state.phase, "transcript gated");
                Vec::new()
            }
        }
    }

    fn wake(&mut self) -> Vec<Command> {
        self.state.transcript.clear();
        self.state.last_committed.clear();
        self.state.turn += 1;

        // Open, then straight into speaking the greeting
        let greeting = self.settings.greeting.clone();
        self.state.pending_reply = Some(greeting.clone());
        self.state.phase = Phase::Speaking;

        vec![
            Command::ResetTranscript,
            Command::StopListening,
            Command::Speak {
                turn: self.state.turn,
                text: greeting,
            },
        ]
    }

    fn on_debounce(&mut self, generation: u64) -> Vec<Command> {
        if self.state.phase != Phase::Open || generation != self.state.transcript_generation {
            return Vec::new();
        }

        let text = self.state.transcript.trim().to_lowercase();
        if text.is_empty() || text == self.state.last_committed {
            return Vec::new();
        }

        match EchoSuppressor::evaluate(&text, &self.state.last_spoken_reply, &self.state.last_committed) {
            Verdict::Reject(reason) => {
                tracing::debug!(?reason, text, "transcript rejected");
                self.state.transcript.clear();
                vec![Command::ResetTranscript]
            }
            Verdict::Accept => {
                tracing::info!(text, "utterance committed");
                self.state.last_committed.clone_from(&text);
                self.state.transcript.clear();
                self.state.turn += 1;
                self.state.phase = Phase::Processing;
                vec![
                    Command::StopListening,
                    Command::ResetTranscript,
                    Command::Dispatch {
                        turn: self.state.turn,
                        text,
                    },
                ]
            }
        }
    }

    fn on_dispatched(&mut self, turn: u64, outcome: DispatchOutcome) -> Vec<Command> {
        if !self.accepts_dispatch(turn) {
            tracing::debug!(turn, current = self.state.turn, "stale dispatch result dropped");
            return Vec::new();
        }

        match outcome.reply {
            Reply::Close => self.close(),
            Reply::Say(text) => {
                let text = if text.trim().is_empty() {
                    EMPTY_REPLY_GUARD.to_string()
                } else {
                    text
                };
                self.state.pending_reply = Some(text.clone());
                self.state.phase = Phase::Speaking;
                vec![Command::Speak { turn, text }]
            }
        }
    }

    fn on_speech_finished(&mut self, turn: u64, outcome: SpeechOutcome) -> Vec<Command> {
        if self.state.phase != Phase::Speaking || self.state.turn != turn {
            tracing::debug!(turn, ?outcome, "stale speech completion dropped");
            return Vec::new();
        }

        tracing::debug!(turn, ?outcome, "speech finished");
        if let Some(reply) = self.state.pending_reply.take() {
            self.state.last_spoken_reply = reply;
        }
        self.state.transcript.clear();

        let mut commands = vec![Command::ResetTranscript];
        if !self.state.listening_blocked {
            commands.push(Command::StartListening { continuous: true });
        }

        if self.settings.cooldown.is_zero() {
            self.state.phase = Phase::Open;
        } else {
            self.state.phase = Phase::Cooldown;
            commands.push(Command::ArmCooldown {
                turn,
                after: self.settings.cooldown,
            });
        }

        commands
    }

    fn on_cooldown(&mut self, turn: u64) -> Vec<Command> {
        if self.state.phase != Phase::Cooldown || self.state.turn != turn {
            return Vec::new();
        }

        self.state.phase = Phase::Open;
        self.state.transcript.clear();
        vec![Command::ResetTranscript]
    }

    fn on_close(&mut self) -> Vec<Command> {
        if self.state.phase == Phase::Dormant {
            return Vec::new();
        }
        self.close()
    }

    fn close(&mut self) -> Vec<Command> {
        tracing::info!("conversation closed");
        self.state.reset_memory();
        self.state.phase = Phase::AwaitingWake;

        let mut commands = vec![
            Command::CancelSpeech,
            Command::StopListening,
            Command::ResetTranscript,
        ];
        if !self.state.listening_blocked {
            commands.push(Command::StartListening { continuous: true });
        }
        commands
    }

    fn on_enter_dictation(&mut self) -> Vec<Command> {
        // dormant means signed out: no listening of any kind
        if matches!(self.state.phase, Phase::Dictation | Phase::Dormant) {
            return Vec::new();
        }

        self.state.reset_memory();
        self.state.phase = Phase::Dictation;

        let mut commands = vec![
            Command::CancelSpeech,
            Command::StopListening,
            Command::ResetTranscript,
        ];
        if !self.state.listening_blocked {
            commands.push(Command::StartListening { continuous: true });
        }
        commands
    }

    fn on_exit_dictation(&mut self) -> Vec<Command> {
        if self.state.phase != Phase::Dictation {
            return Vec::new();
        }

        self.state.transcript.clear();
        self.state.phase = Phase::AwaitingWake;

        let mut commands = vec![Command::StopListening, Command::ResetTranscript];
        if !self.state.listening_blocked {
            commands.push(Command::StartListening { continuous: true });
        }
        commands
    }

    fn on_permission_denied(&mut self) -> Vec<Command> {
        tracing::warn!("listening blocked until re-activated");
        self.state.listening_blocked = true;

        if self.state.phase == Phase::Dormant {
            return Vec::new();
        }

        self.state.reset_memory();
        self.state.phase = Phase::AwaitingWake;
        vec![Command::CancelSpeech, Command::ResetTranscript]
    }
}
