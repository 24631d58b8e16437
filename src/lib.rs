//! Surya - voice-driven desktop assistant
//!
//! This library provides the building blocks of the assistant:
//! - Voice processing (capture, segmentation, STT, TTS, playback)
//! - Wake word and exit phrase matching
//! - An LLM planner with tool calling
//! - The conversation controller that ties them together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  text   ┌──────────────────────────┐  text  ┌─────────────┐
//! │ Transcriber  ├────────►│  ConversationController  ├───────►│ Synthesizer │
//! │ (mic thread) │         │  (single mailbox task)   │◄───────┤ (tts thread)│
//! └──────────────┘         └────────────┬─────────────┘ speak  └─────────────┘
//!                                       │ spawn          on/off
//!                               ┌───────▼───────┐
//!                               │    Planner    │── ToolRegistry
//!                               │  (LLM + tools)│
//!                               └───────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod planner;
pub mod status;
pub mod tools;
pub mod voice;

pub use config::Config;
pub use controller::{ControllerHandle, ConversationController, ListeningMode, State};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use planner::{LlmPlanner, Planner};
pub use status::{ConsoleStatus, StatusSink};
pub use tools::ToolRegistry;
