//! Utterance endpointing
//!
//! Decides, from audio energy alone, when the user started talking and when
//! they stopped. The recognizer uses this to know which samples to send for
//! transcription and when a transcript is final.

use super::capture::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech for an utterance (0.3 seconds)
const MIN_SPEECH_SAMPLES: usize = SAMPLE_RATE as usize * 3 / 10;

/// Trailing silence that ends an utterance (0.8 seconds)
const SILENCE_SAMPLES: usize = SAMPLE_RATE as usize * 8 / 10;

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Idle,
    /// Speech detected, accumulating the utterance
    Speaking,
    /// Enough speech followed by enough silence
    Complete,
}

/// Detects the start and end of a spoken utterance
pub struct UtteranceDetector {
    state: DetectorState,
    utterance: Vec<f32>,
    silence_counter: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    /// Create an idle detector
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DetectorState::Idle,
            utterance: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Process audio samples
    ///
    /// Returns true once the utterance is complete (speech followed by silence)
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            DetectorState::Idle => {
                if is_speech {
                    self.state = DetectorState::Speaking;
                    self.utterance.clear();
                    self.utterance.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                }
            }
            DetectorState::Speaking => {
                self.utterance.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > SILENCE_SAMPLES {
                    if self.utterance.len() > MIN_SPEECH_SAMPLES + self.silence_counter {
                        tracing::debug!(samples = self.utterance.len(), "utterance complete");
                        self.state = DetectorState::Complete;
                        return true;
                    }

                    // Too short to be speech: a click or a cough
                    tracing::trace!("blip discarded");
                    self.reset();
                }
            }
            DetectorState::Complete => return true,
        }

        false
    }

    /// Whether any speech has been heard
    #[must_use]
    pub fn has_speech(&self) -> bool {
        self.state != DetectorState::Idle && !self.utterance.is_empty()
    }

    /// Samples of the utterance so far
    #[must_use]
    pub fn utterance(&self) -> &[f32] {
        &self.utterance
    }

    /// Take the utterance, resetting the detector
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let utterance = std::mem::take(&mut self.utterance);
        self.reset();
        utterance
    }

    /// Reset detector to idle state
    pub fn reset(&mut self) {
        self.state = DetectorState::Idle;
        self.utterance.clear();
        self.silence_counter = 0;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
