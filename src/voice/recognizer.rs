//! Streaming speech recognition
//!
//! A recognizer consumes the buffers of a [`RecognitionRequest`] and reports
//! [`RecognitionEvent`]s until the utterance is final, it fails, or the task
//! is cancelled. Events may keep arriving after the consumer has moved on;
//! consumers must be prepared to discard them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::capture::{AudioBuffer, SAMPLE_RATE, samples_to_wav};
use super::endpoint::UtteranceDetector;
use super::stt::SpeechToText;
use crate::Result;

/// Recognizer callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Best transcript so far
    Partial(String),
    /// Transcript of the finished utterance
    Final(String),
    /// Recognition failed
    Error(String),
}

/// Audio fed to a recognition task
///
/// Audio ends when every sender returned by [`RecognitionRequest::new`] is
/// dropped.
pub struct RecognitionRequest {
    audio: mpsc::UnboundedReceiver<AudioBuffer>,
    partial_results: bool,
}

impl RecognitionRequest {
    /// Create a request and the sender that feeds it
    #[must_use]
    pub fn new(partial_results: bool) -> (mpsc::UnboundedSender<AudioBuffer>, Self) {
        let (tx, audio) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                audio,
                partial_results,
            },
        )
    }

    /// Next buffer, or `None` once audio has ended
    pub async fn next_buffer(&mut self) -> Option<AudioBuffer> {
        self.audio.recv().await
    }

    /// Whether interim transcripts are wanted
    #[must_use]
    pub const fn reports_partial_results(&self) -> bool {
        self.partial_results
    }
}

/// Handle to a running recognition
pub trait RecognitionTask: Send {
    /// Stop recognizing; no further events are produced
    fn cancel(&mut self);
}

/// Speech recognizer backend
pub trait SpeechRecognizer: Send + Sync {
    /// Whether recognition can run on this platform right now
    fn is_available(&self) -> bool;

    /// Start recognizing the request, reporting to `events`
    ///
    /// # Errors
    ///
    /// Returns error if the task cannot be started
    fn start_task(
        &self,
        request: RecognitionRequest,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<Box<dyn RecognitionTask>>;
}

/// Recognition task running on the tokio runtime
pub struct SpawnedRecognition(JoinHandle<()>);

impl RecognitionTask for SpawnedRecognition {
    fn cancel(&mut self) {
        self.0.abort();
    }
}

/// Recognizer built on Whisper transcriptions
///
/// Endpointing is local: audio energy decides when the utterance ends. While
/// the user keeps talking, the audio so far is transcribed every
/// `interim_interval` samples and reported as a partial result.
pub struct WhisperRecognizer {
    stt: Arc<SpeechToText>,
    interim_interval: usize,
}

impl WhisperRecognizer {
    /// Interim transcripts every two seconds of speech
    pub const DEFAULT_INTERIM_INTERVAL: usize = SAMPLE_RATE as usize * 2;

    /// Create a recognizer around a Whisper client
    #[must_use]
    pub fn new(stt: SpeechToText) -> Self {
        Self {
            stt: Arc::new(stt),
            interim_interval: Self::DEFAULT_INTERIM_INTERVAL,
        }
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn is_available(&self) -> bool {
        true
    }

    fn start_task(
        &self,
        request: RecognitionRequest,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<Box<dyn RecognitionTask>> {
        let stt = Arc::clone(&self.stt);
        let interim_interval = self.interim_interval;
        let handle = tokio::spawn(async move {
            run_recognition(&stt, request, &events, interim_interval).await;
        });

        Ok(Box::new(SpawnedRecognition(handle)))
    }
}

async fn run_recognition(
    stt: &SpeechToText,
    mut request: RecognitionRequest,
    events: &mpsc::UnboundedSender<RecognitionEvent>,
    interim_interval: usize,
) {
    let mut detector = UtteranceDetector::new();
    let mut since_interim = 0usize;

    while let Some(buffer) = request.next_buffer().await {
        if detector.process(&buffer) {
            let utterance = detector.take_utterance();
            finish(stt, &utterance, events).await;
            return;
        }

        if !request.reports_partial_results() || !detector.has_speech() {
            continue;
        }

        since_interim += buffer.len();
        if since_interim < interim_interval {
            continue;
        }
        since_interim = 0;

        match transcribe(stt, detector.utterance()).await {
            Ok(text) if !text.is_empty() => {
                let _ = events.send(RecognitionEvent::Partial(text));
            }
            Ok(_) => {}
            Err(e) => {
                let _ = events.send(RecognitionEvent::Error(e.to_string()));
                return;
            }
        }
    }

    // Audio ended mid-utterance: whatever was said is final
    if detector.has_speech() {
        let utterance = detector.take_utterance();
        finish(stt, &utterance, events).await;
    }
}

async fn finish(
    stt: &SpeechToText,
    utterance: &[f32],
    events: &mpsc::UnboundedSender<RecognitionEvent>,
) {
    match transcribe(stt, utterance).await {
        Ok(text) if !text.is_empty() => {
            let _ = events.send(RecognitionEvent::Final(text));
        }
        Ok(_) => tracing::debug!("utterance transcribed to nothing"),
        Err(e) => {
            let _ = events.send(RecognitionEvent::Error(e.to_string()));
        }
    }
}

async fn transcribe(stt: &SpeechToText, samples: &[f32]) -> Result<String> {
    let wav = samples_to_wav(samples, SAMPLE_RATE)?;
    stt.transcribe(&wav).await
}
