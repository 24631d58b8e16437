//! Utterance segmentation
//!
//! Splits the continuous microphone stream into short utterances using a
//! simple RMS energy gate. Each completed utterance is handed to STT.

use super::capture::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to keep an utterance (0.3 seconds at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Silence duration to consider end of utterance (0.5 seconds at 16kHz)
const SILENCE_SAMPLES: usize = 8000;

/// Hard cap on a single utterance (5 seconds at 16kHz)
const MAX_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize * 5;

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech
    Idle,
    /// Speech detected, accumulating
    Speech,
}

/// Energy-gated utterance segmenter
#[derive(Debug)]
pub struct UtteranceSegmenter {
    state: SegmenterState,
    buffer: Vec<f32>,
    voiced_samples: usize,
    silence_counter: usize,
    threshold: f32,
}

impl Default for UtteranceSegmenter {
    fn default() -> Self {
        Self::new(ENERGY_THRESHOLD)
    }
}

impl UtteranceSegmenter {
    /// Create a segmenter with a custom energy threshold
    #[must_use]
    pub const fn new(threshold: f32) -> Self {
        Self {
            state: SegmenterState::Idle,
            buffer: Vec::new(),
            voiced_samples: 0,
            silence_counter: 0,
            threshold,
        }
    }

    /// Feed a chunk of samples
    ///
    /// Returns the completed utterance once enough speech has been followed by
    /// silence, or once the utterance hits the length cap.
    pub fn push(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let energy = rms_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            SegmenterState::Idle => {
                if is_speech {
                    self.state = SegmenterState::Speech;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(samples);
                    self.voiced_samples = samples.len();
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected");
                }
                None
            }
            SegmenterState::Speech => {
                self.buffer.extend_from_slice(samples);

                if is_speech {
                    self.voiced_samples += samples.len();
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.buffer.len() >= MAX_UTTERANCE_SAMPLES {
                    tracing::debug!(samples = self.buffer.len(), "utterance hit length cap");
                    return Some(self.take());
                }

                if self.silence_counter > SILENCE_SAMPLES {
                    if self.voiced_samples > MIN_SPEECH_SAMPLES {
                        tracing::debug!(samples = self.buffer.len(), "utterance complete");
                        return Some(self.take());
                    }

                    // Too short to be speech, treat as a noise blip
                    if self.silence_counter > SILENCE_SAMPLES * 2 {
                        tracing::trace!("timeout - resetting");
                        self.reset();
                    }
                }

                None
            }
        }
    }

    /// Reset to idle, discarding any partial utterance
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.buffer.clear();
        self.voiced_samples = 0;
        self.silence_counter = 0;
    }

    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }

    /// Samples accumulated for the current utterance
    #[must_use]
    pub fn pending_samples(&self) -> usize {
        self.buffer.len()
    }

    fn take(&mut self) -> Vec<f32> {
        let utterance = std::mem::take(&mut self.buffer);
        self.reset();
        utterance
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
