//! TOML configuration file loading
//!
//! Supports `~/.config/crab/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrabConfigFile {
    /// Assistant name, also a wake trigger (e.g. "crab")
    pub agent_name: Option<String>,

    /// Wake phrase (e.g. "hey crab")
    pub wake_phrase: Option<String>,

    /// Voice preset id (e.g. "Nebula")
    pub voice: Option<String>,

    /// Spoken after the wake word
    pub greeting: Option<String>,

    /// Turn-taking timers
    #[serde(default)]
    pub timing: TimingFileConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,
}

/// Turn-taking timer configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingFileConfig {
    /// Transcript stability window before commit
    pub debounce_ms: Option<u64>,

    /// Post-speech input gate
    pub cooldown_ms: Option<u64>,

    /// Delay before restarting a dropped recognizer
    pub restart_delay_ms: Option<u64>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gemini-2.5-flash")
    pub model: Option<String>,

    /// Gemini API key
    pub api_key: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `CrabConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> CrabConfigFile {
    let Some(path) = config_file_path() else {
        return CrabConfigFile::default();
    };

    if !path.exists() {
        return CrabConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            CrabConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid config TOML
pub fn read_config_file(path: &Path) -> Result<CrabConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/crab/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("crab").join("config.toml"))
}
