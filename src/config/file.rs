//! TOML configuration file loading
//!
//! Supports `~/.config/surya/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SuryaConfigFile {
    /// Assistant identity and phrase lists
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Debounce and shutdown delays
    #[serde(default)]
    pub timing: TimingFileConfig,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Assistant identity configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Display name used in prompts (e.g. "Surya")
    pub name: Option<String>,

    /// Phrases that activate the assistant
    pub wake_words: Option<Vec<String>>,

    /// Phrases that shut the assistant down
    pub exit_words: Option<Vec<String>>,

    /// Spoken after the wake word is heard
    pub confirmation: Option<String>,

    /// Spoken before shutting down
    pub goodbye: Option<String>,

    /// Spoken when the planner fails
    pub apology: Option<String>,
}

/// Timing configuration, all values in milliseconds
#[derive(Debug, Default, Deserialize)]
pub struct TimingFileConfig {
    pub activation_delay_ms: Option<u64>,
    pub restart_delay_ms: Option<u64>,
    pub exit_delay_ms: Option<u64>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,

    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,

    /// Maximum number of messages kept in the conversation window
    pub max_history: Option<usize>,

    pub system_prompt: Option<String>,
    pub max_tool_rounds: Option<usize>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Recognition language hint (ISO-639-1, e.g. "en")
    pub language: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `SuryaConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SuryaConfigFile {
    let Some(path) = config_file_path() else {
        return SuryaConfigFile::default();
    };

    if !path.exists() {
        return SuryaConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            SuryaConfigFile::default()
        }
    }
}

/// Read and parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<SuryaConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/surya/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("surya").join("config.toml"))
}
