//! Transcription service: microphone → utterances → text
//!
//! The capture/recognition loop runs on its own OS thread (cpal streams are
//! not `Send`) and reports through callbacks. Callbacks fire on that thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::runtime::Handle;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::segmenter::UtteranceSegmenter;
use super::stt::SpeechToText;
use crate::{Error, Result};

/// Callback receiving recognized text or an error description
pub type TextCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Poll interval for the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Converts microphone speech into text
///
/// `start` and `stop` are idempotent. After `stop` returns no further
/// `on_text` calls are made, except for one whose recognition was already
/// finishing; callers that need a hard guarantee tag each session.
pub trait Transcriber: Send + Sync {
    /// Begin capturing; `on_text` fires once per recognized utterance
    ///
    /// # Errors
    ///
    /// Returns error if the capture thread cannot be spawned
    fn start(&self, on_text: TextCallback, on_error: TextCallback) -> Result<()>;

    /// Stop capturing and discard buffered audio
    fn stop(&self);

    /// Whether a capture session is running
    fn is_listening(&self) -> bool;
}

struct Worker {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Microphone transcriber backed by the Whisper API
pub struct MicTranscriber {
    stt: SpeechToText,
    runtime: Handle,
    worker: Mutex<Option<Worker>>,
}

impl MicTranscriber {
    /// Create a transcriber bound to the current tokio runtime
    ///
    /// # Errors
    ///
    /// Returns error if called outside a tokio runtime
    pub fn new(stt: SpeechToText) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Config(format!("transcriber needs a tokio runtime: {e}")))?;

        Ok(Self {
            stt,
            runtime,
            worker: Mutex::new(None),
        })
    }
}

impl Transcriber for MicTranscriber {
    fn start(&self, on_text: TextCallback, on_error: TextCallback) -> Result<()> {
        let mut worker = self
            .worker
            .lock()
            .map_err(|_| Error::Audio("transcriber lock poisoned".to_string()))?;

        if worker.as_ref().is_some_and(|w| !w.thread.is_finished()) {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = Arc::clone(&stop);
            let stt = self.stt.clone();
            let runtime = self.runtime.clone();
            std::thread::Builder::new()
                .name("surya-stt".to_string())
                .spawn(move || capture_loop(&stt, &runtime, &stop, &on_text, &on_error))?
        };

        *worker = Some(Worker { stop, thread });
        tracing::debug!("transcription started");
        Ok(())
    }

    fn stop(&self) {
        let Ok(mut worker) = self.worker.lock() else {
            return;
        };

        // Detach rather than join: an in-flight request may take seconds
        if let Some(w) = worker.take() {
            w.stop.store(true, Ordering::Release);
            tracing::debug!("transcription stopped");
        }
    }

    fn is_listening(&self) -> bool {
        self.worker
            .lock()
            .map(|w| w.as_ref().is_some_and(|w| !w.thread.is_finished()))
            .unwrap_or(false)
    }
}

fn capture_loop(
    stt: &SpeechToText,
    runtime: &Handle,
    stop: &AtomicBool,
    on_text: &TextCallback,
    on_error: &TextCallback,
) {
    let mut capture = match AudioCapture::new().and_then(|mut c| c.start().map(|()| c)) {
        Ok(capture) => capture,
        Err(e) => {
            tracing::error!(error = %e, "failed to open microphone");
            on_error(format!("Microphone unavailable: {e}"));
            return;
        }
    };

    let mut segmenter = UtteranceSegmenter::default();

    while !stop.load(Ordering::Acquire) {
        std::thread::sleep(POLL_INTERVAL);

        let samples = capture.take_buffer();
        if samples.is_empty() {
            continue;
        }

        let Some(utterance) = segmenter.push(&samples) else {
            continue;
        };

        let wav = match samples_to_wav(&utterance, SAMPLE_RATE) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode utterance");
                continue;
            }
        };

        let result = runtime.block_on(stt.transcribe(&wav));

        if stop.load(Ordering::Acquire) {
            tracing::debug!("dropping transcription that finished after stop");
            break;
        }

        match result {
            Ok(text) if text.is_empty() => tracing::debug!("could not understand audio"),
            Ok(text) => on_text(text),
            Err(e) => {
                tracing::error!(error = %e, "speech recognition error");
                on_error(format!("Speech recognition error: {e}"));
            }
        }
    }

    capture.stop();
}
