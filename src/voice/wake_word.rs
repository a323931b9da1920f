//! Wake word detection
//!
//! Detects the agent name or wake phrase in a live transcript while the
//! assistant is closed.

use crate::{Error, Result};

/// Detects wake words in transcript text
#[derive(Debug, Clone)]
pub struct WakeWordDetector {
    wake_words: Vec<String>,
}

impl WakeWordDetector {
    /// Create a new wake word detector
    ///
    /// # Arguments
    ///
    /// * `wake_words` - Triggers to detect (e.g., "hey crab", "crab")
    ///
    /// # Errors
    ///
    /// Returns error if every wake word is blank
    pub fn new(wake_words: Vec<String>) -> Result<Self> {
        let mut normalized: Vec<String> = wake_words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        normalized.dedup();

        if normalized.is_empty() {
            return Err(Error::Config("at least one wake word is required".to_string()));
        }

        tracing::debug!(wake_words = ?normalized, "wake word detector initialized");

        Ok(Self {
            wake_words: normalized,
        })
    }

    /// Create a detector for an agent name plus wake phrase
    ///
    /// # Errors
    ///
    /// Returns error if both triggers are blank
    pub fn for_agent(agent_name: &str, wake_phrase: &str) -> Result<Self> {
        Self::new(vec![wake_phrase.to_string(), agent_name.to_string()])
    }

    /// Return the matched wake word if the transcript contains one
    ///
    /// Matching is a case-insensitive substring test on the trimmed transcript.
    /// Blank transcripts never match.
    #[must_use]
    pub fn detect(&self, transcript: &str) -> Option<&str> {
        let normalized = transcript.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        let found = self
            .wake_words
            .iter()
            .find(|w| normalized.contains(w.as_str()))
            .map(String::as_str);

        if let Some(wake_word) = found {
            tracing::info!(wake_word, transcript, "wake word detected");
        }

        found
    }

    /// Check if transcribed text contains a wake word
    #[must_use]
    pub fn check_wake_word(&self, transcript: &str) -> bool {
        self.detect(transcript).is_some()
    }

    /// Get the configured wake words
    #[must_use]
    pub fn wake_words(&self) -> &[String] {
        &self.wake_words
    }
}
