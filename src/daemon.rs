//! Daemon - the assistant process
//!
//! Builds the transcription, synthesis and planner services from config,
//! hands them to the conversation controller and connects the terminal: the
//! Enter key is the mic button and Ctrl-C shuts down.

use std::io::BufRead;
use std::sync::Arc;

use crate::controller::{ControllerHandle, ConversationController};
use crate::planner::{ChatClient, LlmPlanner};
use crate::status::ConsoleStatus;
use crate::tools::ToolRegistry;
use crate::voice::{MicTranscriber, SpeakerSynthesizer, SpeechToText, TextToSpeech};
use crate::{Config, Error, Result};

/// The Surya daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the assistant until shutdown
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or a service cannot start
    pub async fn run(self) -> Result<()> {
        let config = &self.config;
        let api_key = config.openai_key()?.to_string();

        let stt = SpeechToText::new(
            api_key.clone(),
            config.llm.base_url.clone(),
            config.voice.stt_model.clone(),
            config.voice.language.clone(),
        )?;
        let tts = TextToSpeech::new(
            api_key,
            config.llm.base_url.clone(),
            config.voice.tts_model.clone(),
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
        )?;

        let transcriber = Arc::new(MicTranscriber::new(stt)?);
        let synthesizer = Arc::new(SpeakerSynthesizer::new(tts)?);
        let planner = Arc::new(build_planner(config)?);

        let controller = ConversationController::new(
            config,
            transcriber,
            synthesizer,
            planner,
            Arc::new(ConsoleStatus),
        );
        let handle = controller.handle();

        tracing::info!(
            name = %config.assistant.name,
            model = %config.llm.model,
            "assistant ready - press Enter to toggle the microphone"
        );

        let controller_task = tokio::spawn(controller.run());

        {
            let handle = handle.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown requested");
                    handle.shutdown();
                }
            });
        }

        spawn_mic_button(handle)?;

        controller_task
            .await
            .map_err(|e| Error::Config(format!("controller task failed: {e}")))?;

        tracing::info!("daemon stopped");
        Ok(())
    }
}

/// Build the LLM planner with the built-in tools
///
/// # Errors
///
/// Returns error if the API key is missing
pub fn build_planner(config: &Config) -> Result<LlmPlanner> {
    let client = ChatClient::new(config.openai_key()?.to_string(), &config.llm)?;
    let tools = ToolRegistry::with_builtins();

    tracing::debug!(tools = tools.len(), "planner tools registered");

    Ok(LlmPlanner::new(client, tools, &config.llm))
}

/// Map each line on stdin to a mic button press
///
/// Runs on a plain thread: a blocking stdin read must not hold up runtime
/// shutdown.
fn spawn_mic_button(handle: ControllerHandle) -> Result<()> {
    std::thread::Builder::new()
        .name("surya-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if line.is_err() || !handle.is_running() {
                    break;
                }
                handle.toggle();
            }
        })?;
    Ok(())
}
