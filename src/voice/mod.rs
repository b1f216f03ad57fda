//! Voice processing module
//!
//! Handles the audio session, microphone capture, speech recognition, speech
//! synthesis and playback.

mod capture;
mod chunking;
mod endpoint;
mod listener;
mod permissions;
mod playback;
mod recognizer;
mod session;
mod stt;
mod synthesizer;
mod tts;

pub use capture::{AudioBuffer, AudioInput, CpalAudioInput, SAMPLE_RATE, samples_to_wav, signal_level};
pub use chunking::{DEFAULT_MAX_CHUNK_LEN, split_sentences, split_text_into_chunks};
pub use endpoint::{DetectorState, UtteranceDetector, calculate_energy};
pub use listener::{CaptureState, DEFAULT_SILENCE_TIMEOUT, DEFAULT_TAP_BUFFER_SIZE, SpeechCaptureEngine};
pub use permissions::{HostPermissions, PermissionProvider};
pub use playback::{AudioPlayer, CpalPlayer, PLAYBACK_SAMPLE_RATE, decode_mp3};
pub use recognizer::{
    RecognitionEvent, RecognitionRequest, RecognitionTask, SpawnedRecognition, SpeechRecognizer,
    WhisperRecognizer,
};
pub use session::{
    AudioMode, AudioSessionBackend, AudioSessionManager, CategoryOptions, HostAudioSession,
    SessionCategory, SessionMode, SessionTransition,
};
pub use stt::SpeechToText;
pub use synthesizer::{DEFAULT_CHUNK_PAUSE, SpeechSynthesizer, SynthesisProgress, SynthesisState};
pub use tts::{TextToSpeech, TtsClient};
