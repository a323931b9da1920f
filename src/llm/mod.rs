//! Language model collaborator
//!
//! Conversation history, the [`LanguageModel`] capability and the structured
//! action schema returned by extraction.

mod gemini;

use std::collections::VecDeque;

use async_trait::async_trait;
use serde::Deserialize;

pub use gemini::GeminiClient;

use crate::{Error, Result};

/// Entries used as context for a conversational completion
pub const COMPLETION_CONTEXT: usize = 10;

/// Entries used as context for structured extraction
pub const EXTRACTION_CONTEXT: usize = 2;

/// Entries retained in memory
const MAX_HISTORY: usize = 50;

/// Who said a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub text: String,
}

impl HistoryEntry {
    /// Entry spoken by the user
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    /// Entry spoken by the assistant
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

/// Bounded, ordered conversation history
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, dropping the oldest past capacity
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == MAX_HISTORY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Append several entries in order
    pub fn extend(&mut self, entries: impl IntoIterator<Item = HistoryEntry>) {
        for entry in entries {
            self.push(entry);
        }
    }

    /// The last `n` entries, oldest first
    #[must_use]
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Copy of this history with `entry` appended
    #[must_use]
    pub fn with(&self, entry: HistoryEntry) -> Self {
        let mut next = self.clone();
        next.push(entry);
        next
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Kind of action an extraction found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Schedule,
    ReminderBatch,
    FetchWeather,
    FetchNews,
    FetchStock,
    FetchWebSearch,
    #[default]
    #[serde(other)]
    None,
}

/// One reminder inside a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReminderData {
    pub text: String,
    pub time: Option<String>,
    pub date: Option<String>,
}

/// Free-form action payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionData {
    pub title: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub reminders: Option<Vec<ReminderData>>,
    pub location: Option<String>,
    pub query: Option<String>,
    pub symbol: Option<String>,
}

/// Result of structured extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StructuredAction {
    pub has_action: bool,
    pub action_type: ActionType,
    pub missing_info: Option<String>,
    pub reply: Option<String>,
    pub data: ActionData,
}

impl StructuredAction {
    /// Whether this extraction names something to execute
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        self.has_action && self.action_type != ActionType::None
    }

    /// The model's ready-made reply, if it wrote one
    #[must_use]
    pub fn reply(&self) -> Option<&str> {
        self.reply.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    /// Parse the model's JSON output
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid action JSON
    pub fn from_json(text: &str) -> Result<Self> {
        let trimmed = text
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        Ok(serde_json::from_str(trimmed)?)
    }
}

/// LLM text and JSON generation
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Conversational completion
    ///
    /// `history` does not include `text`. `image` is JPEG bytes.
    ///
    /// # Errors
    ///
    /// Returns error on network or API failure
    async fn complete(&self, history: &History, text: &str, image: Option<&[u8]>)
    -> Result<String>;

    /// Structured action extraction
    ///
    /// `history` ends with the user's `text`. `Ok(None)` means the model
    /// returned nothing usable.
    ///
    /// # Errors
    ///
    /// Returns error on network or API failure
    async fn extract(&self, history: &History, text: &str) -> Result<Option<StructuredAction>>;
}

/// Model used when no API key is configured; every call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineModel;

#[async_trait]
impl LanguageModel for OfflineModel {
    async fn complete(
        &self,
        _history: &History,
        _text: &str,
        _image: Option<&[u8]>,
    ) -> Result<String> {
        Err(Error::Llm("no language model configured".to_string()))
    }

    async fn extract(&self, _history: &History, _text: &str) -> Result<Option<StructuredAction>> {
        Err(Error::Llm("no language model configured".to_string()))
    }
}
