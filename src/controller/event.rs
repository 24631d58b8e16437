//! Controller mailbox events
//!
//! Every input to the controller, from service callbacks, timers, planner
//! tasks or the UI, arrives as one of these.

/// An input to the controller loop
#[derive(Debug)]
pub enum Event {
    /// Recognized speech from the transcription session `epoch`
    Recognized { text: String, epoch: u64 },

    /// Transcription transport or microphone failure
    TranscriptionError(String),

    /// Synthesis started (`true`) or stopped (`false`)
    Speaking(bool),

    /// The restart timer for `generation` elapsed
    RestartDue { generation: u64 },

    /// The goodbye delay for `generation` elapsed
    ExitDue { generation: u64 },

    /// Planner result for request `request_id`; errors are already replaced
    PlannerReply { request_id: u64, text: String },

    /// Mic button
    Toggle,

    /// Stop listening and speaking
    Stop,

    /// Tear everything down and exit the loop
    Shutdown,
}
