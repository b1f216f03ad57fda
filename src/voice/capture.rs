//! Audio capture from microphone

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::mpsc;

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// One tap delivery of mono f32 samples
pub type AudioBuffer = Vec<f32>;

/// Microphone engine with a single tap
///
/// The tap receives fixed-size buffers while the engine runs. Implementations
/// must tolerate `stop` and `remove_tap` being called in any state.
pub trait AudioInput: Send + Sync {
    /// Install the tap, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns error if the tap cannot be installed
    fn install_tap(&self, buffer_size: usize, sink: mpsc::UnboundedSender<AudioBuffer>)
    -> Result<()>;

    /// Remove the tap, if any
    fn remove_tap(&self);

    /// Start delivering audio
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to start
    fn start(&self) -> Result<()>;

    /// Stop delivering audio
    fn stop(&self);

    /// Whether the engine is running
    fn is_running(&self) -> bool;
}

struct Tap {
    buffer_size: usize,
    pending: Vec<f32>,
    sink: mpsc::UnboundedSender<AudioBuffer>,
}

impl Tap {
    fn feed(&mut self, data: &[f32]) {
        self.pending.extend_from_slice(data);
        while self.pending.len() >= self.buffer_size {
            let rest = self.pending.split_off(self.buffer_size);
            let buffer = std::mem::replace(&mut self.pending, rest);
            // Receiver gone means the request ended; drop the audio
            let _ = self.sink.send(buffer);
        }
    }
}

struct StreamWorker {
    stop_tx: std::sync::mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Captures audio from the default input device
///
/// cpal streams are not `Send`, so the stream lives on its own thread for as
/// long as the engine runs.
pub struct CpalAudioInput {
    config: StreamConfig,
    tap: Arc<Mutex<Option<Tap>>>,
    worker: Mutex<Option<StreamWorker>>,
}

impl CpalAudioInput {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::AudioEngine("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::AudioEngine(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::AudioEngine("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            tap: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
        })
    }
}

impl AudioInput for CpalAudioInput {
    fn install_tap(
        &self,
        buffer_size: usize,
        sink: mpsc::UnboundedSender<AudioBuffer>,
    ) -> Result<()> {
        if buffer_size == 0 {
            return Err(Error::AudioEngine("tap buffer size must be positive".to_string()));
        }

        let mut tap = self
            .tap
            .lock()
            .map_err(|_| Error::AudioEngine("tap lock poisoned".to_string()))?;
        *tap = Some(Tap {
            buffer_size,
            pending: Vec::with_capacity(buffer_size),
            sink,
        });
        tracing::trace!(buffer_size, "tap installed");
        Ok(())
    }

    fn remove_tap(&self) {
        if let Ok(mut tap) = self.tap.lock() {
            if tap.take().is_some() {
                tracing::trace!("tap removed");
            }
        }
    }

    fn start(&self) -> Result<()> {
        let mut worker = self
            .worker
            .lock()
            .map_err(|_| Error::AudioEngine("engine lock poisoned".to_string()))?;
        if worker.is_some() {
            return Ok(());
        }

        let config = self.config.clone();
        let tap = Arc::clone(&self.tap);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("audio-input".to_string())
            .spawn(move || {
                let stream = match build_input_stream(&config, tap) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(Error::AudioEngine(e.to_string())));
                    return;
                }

                let _ = ready_tx.send(Ok(()));
                // Park until stopped or the engine is dropped
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                *worker = Some(StreamWorker { stop_tx, handle });
                tracing::debug!("audio capture started");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(Error::AudioEngine("audio input thread exited".to_string()))
            }
        }
    }

    fn stop(&self) {
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            let _ = worker.stop_tx.send(());
            if worker.handle.join().is_err() {
                tracing::warn!("audio input thread panicked");
            }
            tracing::debug!("audio capture stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.worker.lock().map(|w| w.is_some()).unwrap_or(false)
    }
}

impl Drop for CpalAudioInput {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_input_stream(config: &StreamConfig, tap: Arc<Mutex<Option<Tap>>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::AudioEngine("no input device".to_string()))?;

    device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut tap) = tap.lock() {
                    if let Some(tap) = tap.as_mut() {
                        tap.feed(data);
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::AudioEngine(e.to_string()))
}

/// Peak and RMS level of a run of samples
#[must_use]
pub fn signal_level(samples: &[f32]) -> (f32, f32) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    (peak, super::endpoint::calculate_energy(samples))
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::AudioEngine(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::AudioEngine(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| Error::AudioEngine(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_delivers_fixed_size_buffers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tap = Tap {
            buffer_size: 4,
            pending: Vec::new(),
            sink: tx,
        };

        tap.feed(&[0.1; 3]);
        assert!(rx.try_recv().is_err());

        tap.feed(&[0.2; 6]);
        assert_eq!(rx.try_recv().unwrap().len(), 4);
        assert_eq!(rx.try_recv().unwrap().len(), 4);
        assert!(rx.try_recv().is_err());
        assert_eq!(tap.pending.len(), 1);
    }

    #[test]
    fn test_tap_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut tap = Tap {
            buffer_size: 2,
            pending: Vec::new(),
            sink: tx,
        };
        tap.feed(&[0.0; 8]);
        assert!(tap.pending.is_empty());
    }

    #[test]
    fn test_signal_level_of_silence_is_zero() {
        let (peak, rms) = signal_level(&[0.0; 64]);
        assert!(peak < f32::EPSILON);
        assert!(rms < f32::EPSILON);
    }

    #[test]
    fn test_signal_level_reports_peak() {
        let (peak, _) = signal_level(&[0.1, -0.8, 0.3]);
        assert!((peak - 0.8).abs() < f32::EPSILON);
    }
}
