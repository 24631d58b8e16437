//! Configuration management for Surya

pub mod file;

use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

use file::SuryaConfigFile;

/// Default wake words (English and Devanagari spellings)
pub const DEFAULT_WAKE_WORDS: &[&str] = &["surya", "सूर्या", "सूर्य"];

/// Default exit keywords
pub const DEFAULT_EXIT_WORDS: &[&str] = &[
    "bye",
    "goodbye",
    "exit",
    "quit",
    "shutdown",
    "shut down",
    "close",
    "stop",
    "बाय",
    "गुडबाय",
    "बंद करो",
    "शट डाउन",
];

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, professional, and intelligent AI assistant. \
You provide clear, concise, and accurate responses. You are friendly but professional. \
Keep your responses conversational and natural for voice interaction. \
Avoid overly long responses - aim for clarity and brevity.";

/// Surya configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Assistant identity and phrase lists
    pub assistant: AssistantConfig,

    /// Debounce and shutdown delays
    pub timing: TimingConfig,

    /// LLM planner configuration
    pub llm: LlmConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Assistant identity and spoken phrases
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Name shown in the activation prompt
    pub name: String,

    pub wake_words: Vec<String>,
    pub exit_words: Vec<String>,

    /// Spoken once the wake word is recognized
    pub confirmation: String,

    /// Spoken before a voice-triggered shutdown
    pub goodbye: String,

    /// Substituted for the reply when the planner fails
    pub apology: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: "Surya".to_string(),
            wake_words: DEFAULT_WAKE_WORDS.iter().map(ToString::to_string).collect(),
            exit_words: DEFAULT_EXIT_WORDS.iter().map(ToString::to_string).collect(),
            confirmation: "Yes, I'm listening".to_string(),
            goodbye: "Goodbye! Have a great day!".to_string(),
            apology: "I apologize, but I encountered an error processing your request. \
                      Please try again."
                .to_string(),
        }
    }
}

/// Controller timing
#[derive(Debug, Clone, Copy)]
pub struct TimingConfig {
    /// Wait after the wake confirmation before listening for commands
    pub activation_delay: Duration,

    /// Wait after a reply finishes playing before listening again
    pub restart_delay: Duration,

    /// Wait after the goodbye before terminating
    pub exit_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            activation_delay: Duration::from_millis(2500),
            restart_delay: Duration::from_millis(500),
            exit_delay: Duration::from_millis(3000),
        }
    }
}

/// LLM planner configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat completion model
    pub model: String,

    /// OpenAI-compatible API base URL (without trailing slash)
    pub base_url: String,

    pub temperature: f32,
    pub max_tokens: u32,

    /// Conversation window size, including the system message
    pub max_history: usize,

    pub system_prompt: String,

    /// Upper bound on tool-call rounds per user utterance
    pub max_tool_rounds: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            max_history: 20,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_rounds: 5,
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// Recognition language hint
    pub language: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            language: "en".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper, TTS and chat completions)
    pub openai: Option<SecretString>,
}

impl Config {
    /// Load configuration from the environment and an optional config file
    ///
    /// When `path` is `None` the standard path is used and a broken file falls
    /// back to defaults; an explicit path must parse.
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly given config file cannot be loaded
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = match path {
            Some(p) => file::read_config_file(p).map_err(|e| {
                Error::Config(format!("failed to load {}: {e}", p.display()))
            })?,
            None => file::load_config_file(),
        };

        Ok(Self::from_sources(fc, |key| std::env::var(key).ok()))
    }

    /// Parse a TOML overlay without consulting the environment
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is invalid
    pub fn load_from_str(toml: &str) -> Result<Self> {
        let fc: SuryaConfigFile = toml::from_str(toml)?;
        Ok(Self::from_sources(fc, |_| None))
    }

    /// Merge sources with precedence env > file > default
    pub fn from_sources(fc: SuryaConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let assistant_defaults = AssistantConfig::default();
        let assistant = AssistantConfig {
            name: fc.assistant.name.unwrap_or(assistant_defaults.name),
            wake_words: fc
                .assistant
                .wake_words
                .unwrap_or(assistant_defaults.wake_words),
            exit_words: fc
                .assistant
                .exit_words
                .unwrap_or(assistant_defaults.exit_words),
            confirmation: fc
                .assistant
                .confirmation
                .unwrap_or(assistant_defaults.confirmation),
            goodbye: fc.assistant.goodbye.unwrap_or(assistant_defaults.goodbye),
            apology: fc.assistant.apology.unwrap_or(assistant_defaults.apology),
        };

        let timing_defaults = TimingConfig::default();
        let timing = TimingConfig {
            activation_delay: fc
                .timing
                .activation_delay_ms
                .map_or(timing_defaults.activation_delay, Duration::from_millis),
            restart_delay: fc
                .timing
                .restart_delay_ms
                .map_or(timing_defaults.restart_delay, Duration::from_millis),
            exit_delay: fc
                .timing
                .exit_delay_ms
                .map_or(timing_defaults.exit_delay, Duration::from_millis),
        };

        // LLM config (env > toml > default)
        let llm_defaults = LlmConfig::default();
        let llm = LlmConfig {
            model: env("SURYA_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or(llm_defaults.model),
            base_url: env("SURYA_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or(llm_defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            temperature: fc.llm.temperature.unwrap_or(llm_defaults.temperature),
            max_tokens: fc.llm.max_tokens.unwrap_or(llm_defaults.max_tokens),
            // A window smaller than system + user cannot hold a turn
            max_history: fc
                .llm
                .max_history
                .unwrap_or(llm_defaults.max_history)
                .max(2),
            system_prompt: fc
                .llm
                .system_prompt
                .unwrap_or(llm_defaults.system_prompt),
            max_tool_rounds: fc
                .llm
                .max_tool_rounds
                .unwrap_or(llm_defaults.max_tool_rounds),
        };

        // Voice config (env > toml > default)
        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            stt_model: env("SURYA_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(voice_defaults.stt_model),
            language: fc.voice.language.unwrap_or(voice_defaults.language),
            tts_model: env("SURYA_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(voice_defaults.tts_model),
            tts_voice: env("SURYA_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(voice_defaults.tts_voice),
            tts_speed: fc
                .voice
                .tts_speed
                .unwrap_or(voice_defaults.tts_speed)
                .clamp(0.25, 4.0),
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
        };

        Self {
            assistant,
            timing,
            llm,
            voice,
            api_keys,
        }
    }

    /// The `OpenAI` key, required by every cloud collaborator
    ///
    /// # Errors
    ///
    /// Returns error if no key is configured
    pub fn openai_key(&self) -> Result<&str> {
        self.api_keys
            .openai
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .ok_or_else(|| {
                Error::Config(
                    "OPENAI_API_KEY environment variable (or api_keys.openai) not set".to_string(),
                )
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_sources(SuryaConfigFile::default(), |_| None)
    }
}
