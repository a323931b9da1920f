//! Configuration management for the Crab voice core
//!
//! Precedence, lowest to highest: built-in defaults, the TOML config file,
//! environment variables.

pub mod file;

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use crate::conversation::{MachineSettings, StateMachine};
use crate::voice::{DEFAULT_PRESET, VoicePreset, WakeWordDetector};
use crate::{Error, Result};

pub use file::{CrabConfigFile, config_file_path};

const DEFAULT_AGENT_NAME: &str = "crab";
const DEFAULT_WAKE_PHRASE: &str = "hey crab";
const DEFAULT_GREETING: &str = "Hi";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_DEBOUNCE_MS: u64 = 500;
const DEFAULT_COOLDOWN_MS: u64 = 600;
const DEFAULT_RESTART_DELAY_MS: u64 = 50;

/// Crab voice core configuration
#[derive(Debug)]
pub struct Config {
    /// Assistant name; hearing it wakes the assistant
    pub agent_name: String,

    /// Wake phrase
    pub wake_phrase: String,

    /// Voice preset id
    pub voice: String,

    /// Spoken after the wake word
    pub greeting: String,

    /// Turn-taking timers
    pub timing: TimingConfig,

    /// Language model configuration
    pub llm: LlmConfig,
}

/// Turn-taking timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    pub debounce: Duration,
    pub cooldown: Duration,
    pub restart_delay: Duration,
}

/// Language model configuration
#[derive(Debug)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// API key; without one the assistant runs offline
    pub api_key: Option<SecretString>,
}

impl Config {
    /// Load configuration from the standard file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if an environment override is malformed
    pub fn load() -> Result<Self> {
        Self::resolve(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or an environment
    /// override is malformed
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::resolve(file::read_config_file(path)?, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment overrides
    ///
    /// `env` looks up a variable by name.
    ///
    /// # Errors
    ///
    /// Returns error if a duration override is not a whole number of
    /// milliseconds
    pub fn resolve(fc: CrabConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_blank = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let agent_name = non_blank("CRAB_AGENT_NAME")
            .or(fc.agent_name)
            .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string());
        let wake_phrase = non_blank("CRAB_WAKE_PHRASE")
            .or(fc.wake_phrase)
            .unwrap_or_else(|| DEFAULT_WAKE_PHRASE.to_string());
        let greeting = non_blank("CRAB_GREETING")
            .or(fc.greeting)
            .unwrap_or_else(|| DEFAULT_GREETING.to_string());

        let voice = non_blank("CRAB_VOICE")
            .or(fc.voice)
            .unwrap_or_else(|| DEFAULT_PRESET.to_string());
        let preset = VoicePreset::find(Some(&voice));
        if !preset.id.eq_ignore_ascii_case(&voice) {
            tracing::warn!(voice, fallback = preset.id, "unknown voice preset");
        }

        let millis = |key: &str, file: Option<u64>, default: u64| -> Result<Duration> {
            let value = match non_blank(key) {
                Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                    Error::Config(format!("{key} must be milliseconds, got {raw:?}: {e}"))
                })?,
                None => file.unwrap_or(default),
            };
            Ok(Duration::from_millis(value))
        };

        let timing = TimingConfig {
            debounce: millis("CRAB_DEBOUNCE_MS", fc.timing.debounce_ms, DEFAULT_DEBOUNCE_MS)?,
            cooldown: millis("CRAB_COOLDOWN_MS", fc.timing.cooldown_ms, DEFAULT_COOLDOWN_MS)?,
            restart_delay: millis(
                "CRAB_RESTART_DELAY_MS",
                fc.timing.restart_delay_ms,
                DEFAULT_RESTART_DELAY_MS,
            )?,
        };

        let llm = LlmConfig {
            model: non_blank("CRAB_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: non_blank("GEMINI_API_KEY")
                .or(fc.llm.api_key)
                .map(SecretString::from),
        };

        Ok(Self {
            agent_name,
            wake_phrase,
            voice: preset.id.to_string(),
            greeting,
            timing,
            llm,
        })
    }

    /// Wake word detector for the configured name and phrase
    ///
    /// # Errors
    ///
    /// Returns error if both triggers are blank
    pub fn wake_word_detector(&self) -> Result<WakeWordDetector> {
        WakeWordDetector::for_agent(&self.agent_name, &self.wake_phrase)
    }

    /// State machine tunables
    #[must_use]
    pub fn machine_settings(&self) -> MachineSettings {
        MachineSettings {
            greeting: self.greeting.clone(),
            debounce: self.timing.debounce,
            cooldown: self.timing.cooldown,
        }
    }

    /// A fresh state machine for this configuration
    ///
    /// # Errors
    ///
    /// Returns error if both wake triggers are blank
    pub fn state_machine(&self) -> Result<StateMachine> {
        Ok(StateMachine::new(
            self.wake_word_detector()?,
            self.machine_settings(),
        ))
    }
}
