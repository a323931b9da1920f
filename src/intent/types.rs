//! Intent and dispatch result types

use std::fmt;

use chrono::NaiveDate;

use super::time::TimeSpec;
use crate::llm::HistoryEntry;

/// App section a navigation command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Health,
    Gym,
    Settings,
    Reminders,
    Schedule,
    Notifications,
}

impl Section {
    /// Lowercase section name used in replies
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Gym => "gym",
            Self::Settings => "settings",
            Self::Reminders => "reminders",
            Self::Schedule => "schedule",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Device setting a toggle command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    Wifi,
    Bluetooth,
    Flashlight,
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wifi => "wifi",
            Self::Bluetooth => "bluetooth",
            Self::Flashlight => "flashlight",
        })
    }
}

/// Native command recognized by the rule table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionIntent {
    /// Nothing matched; hand the text to the language model
    None,
    StopListening,
    Navigate(Section),
    OpenApp(String),
    OpenWebsite(String),
    AddReminder {
        text: String,
        time: TimeSpec,
        date: Option<NaiveDate>,
    },
    AddSchedule {
        title: String,
    },
    ToggleSetting {
        setting: Setting,
        value: bool,
    },
    Screenshot,
    ReadScreen,
    StartWorkout,
    EndWorkout,
    ReportHealth,
}

impl ActionIntent {
    /// Whether a native rule matched
    #[must_use]
    pub const fn is_native(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// What the conversation should do with a dispatch result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The user asked to stop; close without speaking
    Close,
    /// Speak this text
    Say(String),
}

/// Result of dispatching one committed utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub reply: Reply,

    /// History entries produced by this turn, in order
    pub exchange: Vec<HistoryEntry>,
}

impl DispatchOutcome {
    /// Close the conversation
    #[must_use]
    pub const fn close() -> Self {
        Self {
            reply: Reply::Close,
            exchange: Vec::new(),
        }
    }

    /// Speak `text` without recording history
    #[must_use]
    pub fn say(text: impl Into<String>) -> Self {
        Self {
            reply: Reply::Say(text.into()),
            exchange: Vec::new(),
        }
    }

    /// Speak `reply` and record it with the user's `text`
    #[must_use]
    pub fn conversational(text: &str, reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self {
            exchange: vec![HistoryEntry::user(text), HistoryEntry::assistant(reply.clone())],
            reply: Reply::Say(reply),
        }
    }

    /// Reply text, if any
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.reply {
            Reply::Close => None,
            Reply::Say(text) => Some(text),
        }
    }
}
