//! Synthesis service: queued text → speech on the speakers
//!
//! A dedicated worker thread drains the queue, synthesizes each entry and
//! plays it, reporting start/stop through the speaking callback. The stop
//! notification fires for every dequeued entry, including failed and
//! interrupted ones.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::playback::{AudioPlayback, PlaybackOutcome};
use super::tts::TextToSpeech;
use crate::{Error, Result};

/// Callback receiving `true` when speech starts and `false` when it ends
pub type SpeakingCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Speaks text aloud
pub trait Synthesizer: Send + Sync {
    /// Queue text for playback; blank text is ignored
    fn speak(&self, text: &str);

    /// Interrupt the current utterance and clear the queue
    fn stop_speaking(&self);

    /// Install the start/stop notification callback
    fn set_speaking_callback(&self, callback: SpeakingCallback);

    /// Stop playback and terminate the worker
    fn shutdown(&self);
}

struct Utterance {
    text: String,
    generation: u64,
}

#[derive(Default)]
struct Shared {
    /// Bumped by `stop_speaking`; entries from older generations are dropped
    generation: AtomicU64,
    shutdown: AtomicBool,
    callback: Mutex<Option<SpeakingCallback>>,
}

impl Shared {
    fn notify(&self, speaking: bool) {
        let callback = self.callback.lock().ok().and_then(|cb| cb.clone());
        if let Some(callback) = callback {
            callback(speaking);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        !self.shutdown.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }
}

/// Cloud TTS + local speaker playback
pub struct SpeakerSynthesizer {
    queue: Mutex<Option<mpsc::UnboundedSender<Utterance>>>,
    shared: Arc<Shared>,
}

impl SpeakerSynthesizer {
    /// Spawn the playback worker
    ///
    /// # Errors
    ///
    /// Returns error if called outside a tokio runtime or the thread cannot spawn
    pub fn new(tts: TextToSpeech) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Config(format!("synthesizer needs a tokio runtime: {e}")))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::default());

        // Detached: the worker exits once the queue closes
        {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("surya-tts".to_string())
                .spawn(move || playback_loop(&tts, &runtime, &shared, rx))?;
        }

        Ok(Self {
            queue: Mutex::new(Some(tx)),
            shared,
        })
    }
}

impl Synthesizer for SpeakerSynthesizer {
    fn speak(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        let utterance = Utterance {
            text: text.to_string(),
            generation: self.shared.generation.load(Ordering::Acquire),
        };

        let sent = self
            .queue
            .lock()
            .ok()
            .and_then(|q| q.as_ref().map(|tx| tx.send(utterance).is_ok()))
            .unwrap_or(false);

        if !sent {
            tracing::warn!("speech queue closed, dropping utterance");
        }
    }

    fn stop_speaking(&self) {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        tracing::debug!("speech interrupted");
    }

    fn set_speaking_callback(&self, callback: SpeakingCallback) {
        if let Ok(mut cb) = self.shared.callback.lock() {
            *cb = Some(callback);
        }
    }

    fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.stop_speaking();

        // Closing the queue ends the worker loop
        if let Ok(mut queue) = self.queue.lock() {
            queue.take();
        }
        tracing::debug!("synthesizer shut down");
    }
}

fn playback_loop(
    tts: &TextToSpeech,
    runtime: &Handle,
    shared: &Shared,
    mut rx: mpsc::UnboundedReceiver<Utterance>,
) {
    let playback = match AudioPlayback::new() {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::error!(error = %e, "failed to open speakers, speech will be skipped");
            None
        }
    };

    while let Some(utterance) = rx.blocking_recv() {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        if !shared.is_current(utterance.generation) {
            continue;
        }

        shared.notify(true);

        match speak_one(tts, runtime, shared, playback.as_ref(), &utterance) {
            Ok(PlaybackOutcome::Completed) => {}
            Ok(PlaybackOutcome::Interrupted) => tracing::debug!("playback interrupted"),
            Err(e) => tracing::error!(error = %e, "TTS error"),
        }

        shared.notify(false);
    }

    tracing::debug!("speech worker exiting");
}

fn speak_one(
    tts: &TextToSpeech,
    runtime: &Handle,
    shared: &Shared,
    playback: Option<&AudioPlayback>,
    utterance: &Utterance,
) -> Result<PlaybackOutcome> {
    let audio = runtime.block_on(tts.synthesize(&utterance.text))?;

    if !shared.is_current(utterance.generation) {
        return Ok(PlaybackOutcome::Interrupted);
    }

    let playback = playback.ok_or_else(|| Error::Audio("no output device".to_string()))?;
    playback.play_mp3(&audio, || !shared.is_current(utterance.generation))
}
