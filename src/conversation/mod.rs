//! Conversation loop
//!
//! Wake word, listen/speak turn-taking and cooldown gating.

mod controller;
mod machine;
mod state;

pub use controller::{Control, Controller, ControllerHandle, Snapshot};
pub use machine::{Command, EMPTY_REPLY_GUARD, Event, MachineSettings, StateMachine};
pub use state::{ConversationState, Phase};
