//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches `OpenAI` TTS MP3 output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Poll interval while waiting for playback to drain
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// All samples were played
    Completed,
    /// The interrupt check fired before the end
    Interrupted,
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let rate = SampleRate(PLAYBACK_SAMPLE_RATE);
        let supported = |channels: u16| {
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        };

        // Fallback: stereo
        let supported_config = supported(1)
            .or_else(|| supported(2))
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config.with_sample_rate(rate).config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Decode MP3 bytes and play them, blocking until done or interrupted
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(
        &self,
        mp3_data: &[u8],
        interrupted: impl Fn() -> bool,
    ) -> Result<PlaybackOutcome> {
        let samples = decode_mp3(mp3_data)?;
        self.play_samples(samples, interrupted)
    }

    /// Play mono f32 samples, blocking until done or interrupted
    ///
    /// `interrupted` is polled while the stream drains; returning true stops
    /// playback immediately.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built
    pub fn play_samples(
        &self,
        samples: Vec<f32>,
        interrupted: impl Fn() -> bool,
    ) -> Result<PlaybackOutcome> {
        if samples.is_empty() {
            return Ok(PlaybackOutcome::Completed);
        }

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            self.device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);
                        for frame in data.chunks_mut(channels) {
                            let sample = samples.get(pos).copied().unwrap_or(0.0);
                            frame.fill(sample);
                            if pos < samples.len() {
                                pos += 1;
                            }
                        }
                        position.store(pos, Ordering::Relaxed);
                        if pos >= samples.len() {
                            finished.store(true, Ordering::Release);
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let timeout = Duration::from_millis(duration_ms + 500);
        let start = Instant::now();

        let mut outcome = PlaybackOutcome::Completed;
        while !finished.load(Ordering::Acquire) {
            if interrupted() {
                outcome = PlaybackOutcome::Interrupted;
                break;
            }
            if start.elapsed() > timeout {
                tracing::warn!(duration_ms, "playback did not drain before timeout");
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        if outcome == PlaybackOutcome::Completed {
            // Let the device flush its last buffer
            std::thread::sleep(Duration::from_millis(100));
        }

        drop(stream);
        tracing::debug!(samples = sample_count, ?outcome, "playback finished");

        Ok(outcome)
    }
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the data is not decodable MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}
