//! Audio playback to speakers

use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Plays encoded audio files
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play a file to completion
    ///
    /// Resolves once, after the last sample was played or playback was
    /// halted by [`stop`](Self::stop).
    async fn play_file(&self, path: &Path) -> Result<()>;

    /// Halt current playback and release the player
    fn stop(&self);
}

/// Plays audio to the default output device
pub struct CpalPlayer {
    config: StreamConfig,
    current: Mutex<Option<Arc<AtomicBool>>>,
}

impl CpalPlayer {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::PlaybackFailed("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::PlaybackFailed(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::PlaybackFailed("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            config,
            current: Mutex::new(None),
        })
    }

    /// Play raw f32 samples at the playback rate
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    pub async fn play_samples(&self, samples: Vec<f32>) -> Result<()> {
        let halt = Arc::new(AtomicBool::new(false));
        if let Ok(mut current) = self.current.lock() {
            *current = Some(Arc::clone(&halt));
        }

        let config = self.config.clone();
        let result = tokio::task::spawn_blocking(move || play_samples_blocking(&config, &samples, &halt))
            .await
            .map_err(|e| Error::PlaybackFailed(e.to_string()))?;

        if let Ok(mut current) = self.current.lock() {
            current.take();
        }
        result
    }
}

#[async_trait]
impl AudioPlayer for CpalPlayer {
    async fn play_file(&self, path: &Path) -> Result<()> {
        let data = tokio::fs::read(path).await?;
        let samples = decode_mp3(&data)?;
        self.play_samples(samples).await
    }

    fn stop(&self) {
        let halt = self.current.lock().ok().and_then(|mut c| c.take());
        if let Some(halt) = halt {
            halt.store(true, Ordering::SeqCst);
            tracing::debug!("playback halted");
        }
    }
}

/// Play samples on the calling thread until done or halted
fn play_samples_blocking(config: &StreamConfig, samples: &[f32], halt: &AtomicBool) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::PlaybackFailed("no output device".to_string()))?;

    let channels = config.channels as usize;
    let samples: Arc<[f32]> = Arc::from(samples);
    let sample_count = samples.len();
    let (done_tx, done_rx) = std::sync::mpsc::sync_channel::<()>(1);

    let stream = {
        let samples = Arc::clone(&samples);
        let mut position = 0usize;
        let mut done_tx = Some(done_tx);

        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(position).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        if position < samples.len() {
                            position += 1;
                        }
                    }

                    // Completion fires once
                    if position >= samples.len() {
                        if let Some(tx) = done_tx.take() {
                            let _ = tx.try_send(());
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::PlaybackFailed(e.to_string()))?
    };

    stream
        .play()
        .map_err(|e| Error::PlaybackFailed(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    let timeout = Duration::from_millis(duration_ms + 500);
    let start = Instant::now();

    loop {
        if halt.load(Ordering::SeqCst) {
            tracing::debug!("playback stopped early");
            break;
        }
        match done_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(()) | Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                // Let the device drain its last buffer
                std::thread::sleep(Duration::from_millis(100));
                break;
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                if start.elapsed() > timeout {
                    tracing::warn!("playback did not signal completion in time");
                    break;
                }
            }
        }
    }

    drop(stream);
    tracing::debug!(samples = sample_count, "playback complete");

    Ok(())
}

/// Decode MP3 bytes to f32 samples
///
/// # Errors
///
/// Returns [`Error::PlaybackFailed`] if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                // Convert i16 samples to f32 and handle stereo to mono
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::PlaybackFailed(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}
