//! Voice processing module
//!
//! Audio capture and playback, utterance segmentation, wake/exit phrase
//! matching, and the transcription and synthesis services the controller
//! drives.

mod capture;
mod playback;
mod segmenter;
mod stt;
mod synthesizer;
mod transcriber;
mod tts;
mod wake_word;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, PlaybackOutcome, decode_mp3};
pub use segmenter::{SegmenterState, UtteranceSegmenter, rms_energy};
pub use stt::SpeechToText;
pub use synthesizer::{SpeakerSynthesizer, SpeakingCallback, Synthesizer};
pub use transcriber::{MicTranscriber, TextCallback, Transcriber};
pub use tts::TextToSpeech;
pub use wake_word::PhraseSet;
