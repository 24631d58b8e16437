//! Shared test utilities
//!
//! In-memory stand-ins for the transcription, synthesis and planner services
//! plus a status recorder, so the controller can run without audio hardware
//! or network access.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use surya::config::Config;
use surya::planner::Planner;
use surya::voice::{SpeakingCallback, Synthesizer, TextCallback, Transcriber};
use surya::{ControllerHandle, ConversationController, State, StatusSink};

/// Let queued events and spawned tasks run without reaching any timer
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Transcriber that hands out text on demand
#[derive(Default)]
pub struct FakeTranscriber {
    callbacks: Mutex<Option<(TextCallback, TextCallback)>>,
    /// Callbacks of every session ever started, newest last
    sessions: Mutex<Vec<TextCallback>>,
    listening: Mutex<bool>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
}

impl FakeTranscriber {
    /// Deliver recognized text through the current session
    pub fn say(&self, text: &str) {
        let callback = self.callbacks.lock().unwrap().as_ref().map(|(t, _)| Arc::clone(t));
        if let Some(on_text) = callback {
            on_text(text.to_string());
        }
    }

    /// Deliver text through an earlier session's callback
    pub fn say_in_session(&self, session: usize, text: &str) {
        let callback = Arc::clone(&self.sessions.lock().unwrap()[session]);
        callback(text.to_string());
    }

    pub fn fail(&self, error: &str) {
        let callback = self.callbacks.lock().unwrap().as_ref().map(|(_, e)| Arc::clone(e));
        if let Some(on_error) = callback {
            on_error(error.to_string());
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl Transcriber for FakeTranscriber {
    fn start(&self, on_text: TextCallback, on_error: TextCallback) -> surya::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().push(Arc::clone(&on_text));
        *self.callbacks.lock().unwrap() = Some((on_text, on_error));
        *self.listening.lock().unwrap() = true;
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.callbacks.lock().unwrap() = None;
        *self.listening.lock().unwrap() = false;
    }

    fn is_listening(&self) -> bool {
        *self.listening.lock().unwrap()
    }
}

/// Synthesizer that records speech and plays it until told to finish
#[derive(Default)]
pub struct FakeSynthesizer {
    spoken: Mutex<Vec<String>>,
    callback: Mutex<Option<SpeakingCallback>>,
    pub interrupts: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl FakeSynthesizer {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// Report the current utterance as finished
    pub fn finish(&self) {
        self.notify(false);
    }

    fn notify(&self, speaking: bool) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(speaking);
        }
    }
}

impl Synthesizer for FakeSynthesizer {
    fn speak(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.spoken.lock().unwrap().push(text.to_string());
        self.notify(true);
    }

    fn stop_speaking(&self) {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
    }

    fn set_speaking_callback(&self, callback: SpeakingCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// How the fake planner answers
#[derive(Clone)]
pub enum Reply {
    Text(String),
    Fail,
    Panic,
    /// Answer after a delay
    Slow(Duration, String),
}

/// Planner with a scripted reply that counts calls
pub struct FakePlanner {
    reply: Mutex<Reply>,
    pub calls: AtomicUsize,
    pub inputs: Mutex<Vec<String>>,
    /// Calls currently running, including ones later aborted
    active: Arc<AtomicUsize>,
    max_active: AtomicUsize,
}

/// Decrements the running-call count when a call ends or is dropped
struct ActiveCall(Arc<AtomicUsize>);

impl Drop for ActiveCall {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakePlanner {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(Reply::Text(text.to_string()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of calls ever running at once
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Planner for FakePlanner {
    async fn respond(&self, text: &str) -> surya::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(text.to_string());

        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(running, Ordering::SeqCst);
        let _call = ActiveCall(Arc::clone(&self.active));

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail => Err(surya::Error::Planner("model unavailable".to_string())),
            Reply::Panic => panic!("planner blew up"),
            Reply::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }
}

/// Records every status line and state change
#[derive(Default)]
pub struct RecordingStatus {
    statuses: Mutex<Vec<String>>,
    states: Mutex<Vec<State>>,
}

impl RecordingStatus {
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<State> {
        self.states.lock().unwrap().clone()
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses.lock().unwrap().last().cloned()
    }

    pub fn count(&self, status: &str) -> usize {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == status)
            .count()
    }
}

impl StatusSink for RecordingStatus {
    fn status_changed(&self, status: &str) {
        self.statuses.lock().unwrap().push(status.to_string());
    }

    fn state_changed(&self, state: State) {
        self.states.lock().unwrap().push(state);
    }
}

/// A running controller wired to fakes
pub struct Harness {
    pub transcriber: Arc<FakeTranscriber>,
    pub synthesizer: Arc<FakeSynthesizer>,
    pub planner: Arc<FakePlanner>,
    pub status: Arc<RecordingStatus>,
    pub handle: ControllerHandle,
    pub task: tokio::task::JoinHandle<()>,
}

impl Harness {
    /// Start a controller with default config
    pub async fn start(planner: FakePlanner) -> Self {
        Self::start_with(&Config::default(), planner).await
    }

    pub async fn start_with(config: &Config, planner: FakePlanner) -> Self {
        let transcriber = Arc::new(FakeTranscriber::default());
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let planner = Arc::new(planner);
        let status = Arc::new(RecordingStatus::default());

        let controller = ConversationController::new(
            config,
            Arc::clone(&transcriber) as Arc<dyn Transcriber>,
            Arc::clone(&synthesizer) as Arc<dyn Synthesizer>,
            Arc::clone(&planner) as Arc<dyn Planner>,
            Arc::clone(&status) as Arc<dyn StatusSink>,
        );
        let handle = controller.handle();
        let task = tokio::spawn(controller.run());
        settle().await;

        Self {
            transcriber,
            synthesizer,
            planner,
            status,
            handle,
            task,
        }
    }

    pub fn state(&self) -> State {
        self.handle.state()
    }

    /// Recognize text and let the controller react
    pub async fn say(&self, text: &str) {
        self.transcriber.say(text);
        settle().await;
    }

    /// Finish the current utterance and let the controller react
    pub async fn finish_speaking(&self) {
        self.synthesizer.finish();
        settle().await;
    }

    /// Wake up and wait out the activation delay
    pub async fn activate(&self) {
        self.say("hello surya").await;
        self.finish_speaking().await;
        tokio::time::sleep(Config::default().timing.activation_delay).await;
        settle().await;
        assert_eq!(self.state(), State::ActiveListening);
    }
}
