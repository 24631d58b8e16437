//! Conversation controller
//!
//! Owns the listening mode and mediates between transcription, the planner
//! and synthesis. All state lives in [`ConversationController::run`]; service
//! callbacks, timers, planner tasks and the UI only enqueue [`Event`]s into
//! its mailbox.
//!
//! Guarantees:
//! - at most one utterance is with the planner at a time; stop, exit and
//!   shutdown abort the outstanding call
//! - transcription is stopped before the planner is called and before any
//!   speech is queued, and is re-armed only after playback has ended
//! - `stop` is idempotent; `shutdown` runs exactly once

mod event;
mod state;
mod timer;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;

use crate::config::{AssistantConfig, Config, TimingConfig};
use crate::planner::Planner;
use crate::status::StatusSink;
use crate::voice::{PhraseSet, Synthesizer, TextCallback, Transcriber};

pub use event::Event;
pub use state::{ListeningMode, State};
pub use timer::DeferredTask;

const STATUS_ACTIVATING: &str = "Activating...";
const STATUS_LISTENING: &str = "Listening...";
const STATUS_THINKING: &str = "Thinking...";
const STATUS_SPEAKING: &str = "Speaking...";
const STATUS_STOPPED: &str = "Stopped";
const STATUS_SHUTTING_DOWN: &str = "Shutting down...";
const STATUS_MIC_ERROR: &str = "Error - Check microphone";

/// Playback as seen through the speaking notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Playback {
    Idle,
    /// Text handed to the synthesizer, start not yet reported
    Queued,
    Playing,
}

/// Cloneable handle for driving a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<State>,
}

impl ControllerHandle {
    /// Mic button press
    pub fn toggle(&self) {
        self.send(Event::Toggle);
    }

    /// Stop listening and speaking
    pub fn stop(&self) {
        self.send(Event::Stop);
    }

    /// Shut the controller down; `run` returns afterwards
    pub fn shutdown(&self) {
        self.send(Event::Shutdown);
    }

    /// Current controller state
    #[must_use]
    pub fn state(&self) -> State {
        *self.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.state.clone()
    }

    /// Whether the controller loop is still accepting events
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("controller already stopped");
        }
    }
}

/// The voice interaction state machine
pub struct ConversationController {
    transcriber: Arc<dyn Transcriber>,
    synthesizer: Arc<dyn Synthesizer>,
    planner: Arc<dyn Planner>,
    status: Arc<dyn StatusSink>,

    assistant: AssistantConfig,
    wake_words: PhraseSet,
    exit_words: PhraseSet,
    timing: TimingConfig,

    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
    state_tx: watch::Sender<State>,

    state: State,
    mode: ListeningMode,
    processing: bool,
    auto_listen: bool,
    exiting: bool,
    listening: bool,
    playback: Playback,

    /// Current transcription session; text tagged with any other is stale
    epoch: u64,
    request_id: u64,
    in_flight: Option<u64>,
    planner_task: Option<AbortHandle>,

    restart: DeferredTask,
    exit_timer: DeferredTask,
}

impl ConversationController {
    /// Create a controller and install its speaking callback
    #[must_use]
    pub fn new(
        config: &Config,
        transcriber: Arc<dyn Transcriber>,
        synthesizer: Arc<dyn Synthesizer>,
        planner: Arc<dyn Planner>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(State::WakeWordOnly);

        let speaking_tx = tx.clone();
        synthesizer.set_speaking_callback(Arc::new(move |speaking| {
            let _ = speaking_tx.send(Event::Speaking(speaking));
        }));

        Self {
            transcriber,
            synthesizer,
            planner,
            status,
            wake_words: PhraseSet::new(&config.assistant.wake_words),
            exit_words: PhraseSet::new(&config.assistant.exit_words),
            assistant: config.assistant.clone(),
            timing: config.timing,
            tx,
            rx,
            state_tx,
            state: State::WakeWordOnly,
            mode: ListeningMode::WakeWordOnly,
            processing: false,
            auto_listen: false,
            exiting: false,
            listening: false,
            playback: Playback::Idle,
            epoch: 0,
            request_id: 0,
            in_flight: None,
            planner_task: None,
            restart: DeferredTask::new(),
            exit_timer: DeferredTask::new(),
        }
    }

    #[must_use]
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.tx.clone(),
            state: self.state_tx.subscribe(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Listen for the wake word and process events until shutdown
    pub async fn run(mut self) {
        tracing::info!(
            wake_words = ?self.wake_words.phrases(),
            "conversation controller started"
        );
        self.enter_wake_word_mode();

        while let Some(event) = self.rx.recv().await {
            self.handle_event(event);
            if self.state == State::Terminated {
                break;
            }
        }

        tracing::info!("conversation controller stopped");
    }

    fn handle_event(&mut self, event: Event) {
        tracing::trace!(?event, state = %self.state, "controller event");

        match event {
            Event::Recognized { text, epoch } => self.on_recognized(text, epoch),
            Event::TranscriptionError(error) => self.on_transcription_error(&error),
            Event::Speaking(true) => self.on_speaking_started(),
            Event::Speaking(false) => self.on_speaking_stopped(),
            Event::RestartDue { generation } => self.on_restart_due(generation),
            Event::ExitDue { generation } => {
                if self.exit_timer.complete(generation) {
                    self.shutdown();
                }
            }
            Event::PlannerReply { request_id, text } => self.on_planner_reply(request_id, &text),
            Event::Toggle => self.toggle(),
            Event::Stop => {
                if self.exiting {
                    tracing::debug!("stop ignored during exit");
                } else {
                    self.stop();
                }
            }
            Event::Shutdown => self.shutdown(),
        }
    }

    fn on_recognized(&mut self, text: String, epoch: u64) {
        if epoch != self.epoch || !self.listening || self.exiting {
            tracing::debug!(%text, epoch, current = self.epoch, "dropping stale transcript");
            return;
        }

        tracing::info!(%text, mode = ?self.mode, "recognized");

        match self.mode {
            ListeningMode::WakeWordOnly => self.on_wake_text(&text),
            ListeningMode::ActiveCommand => self.on_command(text),
            ListeningMode::Stopped => {}
        }
    }

    fn on_wake_text(&mut self, text: &str) {
        match self.wake_words.find_in(text) {
            Some(word) => tracing::info!(wake_word = word, "wake word detected"),
            None => {
                tracing::debug!("no wake word in transcript");
                return;
            }
        }

        // Stop listening so the confirmation is not transcribed
        self.stop_transcription();

        self.mode = ListeningMode::ActiveCommand;
        self.auto_listen = true;
        self.processing = false;

        self.set_state(State::Speaking);
        self.set_status(STATUS_ACTIVATING);

        let confirmation = self.assistant.confirmation.clone();
        self.speak(&confirmation);
        self.arm_restart(self.timing.activation_delay);
    }

    fn on_command(&mut self, text: String) {
        if self.exit_words.matches(&text) {
            self.begin_exit();
            return;
        }

        if self.processing {
            tracing::info!(%text, "already processing, ignoring input");
            return;
        }

        self.processing = true;
        self.stop_transcription();
        self.restart.cancel();
        self.synthesizer.stop_speaking();
        self.playback = Playback::Idle;

        self.set_state(State::Processing);
        self.set_status(STATUS_THINKING);

        self.request_id += 1;
        let request_id = self.request_id;
        self.in_flight = Some(request_id);

        let planner = Arc::clone(&self.planner);
        let apology = self.assistant.apology.clone();
        let tx = self.tx.clone();

        // Separate task so a panic surfaces as a JoinError and a stop can abort it
        let task = tokio::spawn(async move { planner.respond(&text).await });
        self.planner_task = Some(task.abort_handle());

        tokio::spawn(async move {
            let text = match task.await {
                Ok(Ok(reply)) if !reply.trim().is_empty() => reply,
                Ok(Ok(_)) => {
                    tracing::warn!(request_id, "planner returned an empty reply");
                    apology
                }
                Ok(Err(e)) => {
                    tracing::error!(request_id, error = %e, "planner failed");
                    apology
                }
                Err(e) if e.is_cancelled() => {
                    tracing::debug!(request_id, "planner call cancelled");
                    return;
                }
                Err(e) => {
                    tracing::error!(request_id, error = %e, "planner task panicked");
                    apology
                }
            };

            let _ = tx.send(Event::PlannerReply { request_id, text });
        });
    }

    fn on_planner_reply(&mut self, request_id: u64, text: &str) {
        if self.in_flight != Some(request_id) || self.state != State::Processing {
            tracing::debug!(request_id, "dropping reply from a cancelled request");
            return;
        }
        self.in_flight = None;
        self.planner_task = None;

        tracing::info!(request_id, reply = %text, "planner replied");

        self.set_state(State::Speaking);
        self.set_status(STATUS_SPEAKING);
        self.speak(text);
    }

    fn on_transcription_error(&mut self, error: &str) {
        if !self.listening {
            tracing::debug!(error, "ignoring error from a stopped transcription session");
            return;
        }
        tracing::error!(error, "transcription error");
        self.set_status(STATUS_MIC_ERROR);
    }

    fn on_speaking_started(&mut self) {
        self.playback = Playback::Playing;
        if self.state == State::Speaking && !self.exiting {
            self.set_status(STATUS_SPEAKING);
        }
    }

    fn on_speaking_stopped(&mut self) {
        match self.playback {
            Playback::Playing => self.playback = Playback::Idle,
            // End of an utterance interrupted before the current one was queued
            Playback::Queued | Playback::Idle => {
                tracing::debug!("ignoring stale stop notification");
                return;
            }
        }

        if self.state != State::Speaking || self.exiting {
            return;
        }

        self.processing = false;

        if !self.auto_listen {
            tracing::debug!("playback ended with auto-listen off");
            return;
        }
        if !self.restart.is_pending() {
            self.arm_restart(self.timing.restart_delay);
        }
    }

    fn on_restart_due(&mut self, generation: u64) {
        if !self.restart.complete(generation) {
            tracing::debug!(generation, "dropping cancelled restart");
            return;
        }

        if !self.auto_listen || self.exiting {
            return;
        }

        // The next stop notification arms a fresh restart
        if self.playback != Playback::Idle {
            tracing::debug!("restart deferred until playback ends");
            return;
        }

        self.activate_listening();
    }

    fn toggle(&mut self) {
        if self.exiting {
            tracing::debug!("toggle ignored during exit");
            return;
        }

        if self.state.is_engaged() {
            self.stop();
        } else if self.state != State::Terminated {
            self.restart.cancel();
            self.auto_listen = true;
            self.activate_listening();
        }
    }

    fn stop(&mut self) {
        self.restart.cancel();
        self.stop_transcription();
        self.synthesizer.stop_speaking();

        self.playback = Playback::Idle;
        self.cancel_planner();
        self.processing = false;
        self.auto_listen = false;
        self.mode = ListeningMode::Stopped;

        if self.state != State::Stopped {
            self.set_state(State::Stopped);
            self.set_status(STATUS_STOPPED);
        }
    }

    fn begin_exit(&mut self) {
        tracing::info!("exit keyword detected, shutting down");

        self.exiting = true;
        self.restart.cancel();
        self.stop_transcription();
        self.cancel_planner();
        self.processing = false;

        self.set_state(State::Speaking);
        self.set_status(STATUS_SHUTTING_DOWN);

        let goodbye = self.assistant.goodbye.clone();
        self.speak(&goodbye);

        let tx = self.tx.clone();
        self.exit_timer.schedule(self.timing.exit_delay, move |generation| {
            let _ = tx.send(Event::ExitDue { generation });
        });
    }

    fn shutdown(&mut self) {
        if self.state == State::Terminated {
            return;
        }

        self.restart.cancel();
        self.exit_timer.cancel();
        self.stop_transcription();
        self.synthesizer.shutdown();
        self.cancel_planner();

        self.playback = Playback::Idle;
        self.processing = false;
        self.auto_listen = false;

        if !self.exiting {
            self.set_status(STATUS_SHUTTING_DOWN);
        }
        self.set_state(State::Terminated);
    }

    fn enter_wake_word_mode(&mut self) {
        self.mode = ListeningMode::WakeWordOnly;
        self.auto_listen = false;
        self.processing = false;

        self.start_transcription();
        self.set_state(State::WakeWordOnly);
        self.set_status(&format!("Say 'Hello {}' to activate", self.assistant.name));
    }

    fn activate_listening(&mut self) {
        self.mode = ListeningMode::ActiveCommand;
        self.processing = false;

        self.start_transcription();
        self.set_state(State::ActiveListening);
        self.set_status(STATUS_LISTENING);
    }

    fn cancel_planner(&mut self) {
        self.in_flight = None;
        if let Some(task) = self.planner_task.take() {
            task.abort();
            tracing::debug!("planner call aborted");
        }
    }

    fn arm_restart(&mut self, delay: Duration) {
        let tx = self.tx.clone();
        let generation = self.restart.schedule(delay, move |generation| {
            let _ = tx.send(Event::RestartDue { generation });
        });
        tracing::debug!(generation, delay_ms = delay.as_millis(), "restart armed");
    }

    fn speak(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.playback = Playback::Queued;
        self.synthesizer.speak(text);
    }

    fn start_transcription(&mut self) {
        // A running session keeps its old callbacks, so restart it cleanly
        self.transcriber.stop();
        self.epoch += 1;

        let epoch = self.epoch;
        let text_tx = self.tx.clone();
        let on_text: TextCallback = Arc::new(move |text| {
            let _ = text_tx.send(Event::Recognized { text, epoch });
        });
        let error_tx = self.tx.clone();
        let on_error: TextCallback = Arc::new(move |error| {
            let _ = error_tx.send(Event::TranscriptionError(error));
        });

        match self.transcriber.start(on_text, on_error) {
            Ok(()) => self.listening = true,
            Err(e) => {
                tracing::error!(error = %e, "failed to start transcription");
                self.listening = false;
                self.set_status(STATUS_MIC_ERROR);
            }
        }
    }

    fn stop_transcription(&mut self) {
        self.epoch += 1;
        self.listening = false;
        self.transcriber.stop();
    }

    fn set_state(&mut self, next: State) {
        if self.state == next {
            return;
        }
        tracing::info!(from = %self.state, to = %next, "state changed");
        self.state = next;
        self.state_tx.send_replace(next);
        self.status.state_changed(next);
    }

    fn set_status(&self, status: &str) {
        tracing::debug!(status, "status");
        self.status.status_changed(status);
    }
}
