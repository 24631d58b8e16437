//! Controller states

use std::fmt;

/// What the microphone is listening for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListeningMode {
    /// Only the wake word is acted on
    WakeWordOnly,
    /// Every utterance is a command
    ActiveCommand,
    /// Nothing is acted on until the mic button is pressed
    Stopped,
}

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    WakeWordOnly,
    ActiveListening,
    /// An utterance is with the planner
    Processing,
    /// A reply, confirmation or goodbye is playing, or the post-playback
    /// debounce has not yet elapsed
    Speaking,
    Stopped,
    /// Shut down; the controller loop has exited or is about to
    Terminated,
}

impl State {
    /// Whether the mic button should stop rather than start listening
    #[must_use]
    pub const fn is_engaged(self) -> bool {
        matches!(self, Self::ActiveListening | Self::Processing | Self::Speaking)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WakeWordOnly => "wake-word",
            Self::ActiveListening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
            Self::Stopped => "stopped",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}
