//! Speech capture engine
//!
//! Runs one listening attempt at a time: permissions, recording session,
//! microphone tap, streaming recognizer, and the silence timer. The callback
//! stream of the recognizer is folded into a single result per attempt.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::capture::{AudioBuffer, AudioInput};
use super::permissions::PermissionProvider;
use super::recognizer::{RecognitionEvent, RecognitionRequest, RecognitionTask, SpeechRecognizer};
use super::session::AudioSessionManager;
use crate::{Error, Result};

/// Default silence timeout
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default frames per tap buffer
pub const DEFAULT_TAP_BUFFER_SIZE: usize = 4096;

/// Lifecycle of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No session
    Idle,
    /// Permissions and recording session being set up
    ConfiguringAudio,
    /// Engine running, waiting for the recognizer
    Listening,
    /// A transcript was accepted, tearing down
    Finalizing,
    /// Stopped from outside before a result
    Cancelled,
    /// Ended with an error, tearing down
    Failed,
}

impl CaptureState {
    const fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

struct CaptureSession {
    state: CaptureState,
    generation: u64,
    last_partial: String,
    silence_deadline: Option<Instant>,
    holds_recording: bool,
    audio_tx: Option<mpsc::UnboundedSender<AudioBuffer>>,
    task: Option<Box<dyn RecognitionTask>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl CaptureSession {
    const fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            generation: 0,
            last_partial: String::new(),
            silence_deadline: None,
            holds_recording: false,
            audio_tx: None,
            task: None,
            cancel: None,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state == CaptureState::Listening
    }
}

/// Captures one spoken request and returns its transcript
pub struct SpeechCaptureEngine {
    session: AudioSessionManager,
    input: Arc<dyn AudioInput>,
    recognizer: Arc<dyn SpeechRecognizer>,
    permissions: Arc<dyn PermissionProvider>,
    silence_timeout: Duration,
    tap_buffer_size: usize,
    capture: Mutex<CaptureSession>,
    teardown_lock: tokio::sync::Mutex<()>,
}

impl SpeechCaptureEngine {
    /// Create an engine over the shared audio session
    #[must_use]
    pub fn new(
        session: AudioSessionManager,
        input: Arc<dyn AudioInput>,
        recognizer: Arc<dyn SpeechRecognizer>,
        permissions: Arc<dyn PermissionProvider>,
    ) -> Self {
        Self {
            session,
            input,
            recognizer,
            permissions,
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
            tap_buffer_size: DEFAULT_TAP_BUFFER_SIZE,
            capture: Mutex::new(CaptureSession::new()),
            teardown_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Set the silence timeout
    #[must_use]
    pub const fn with_silence_timeout(mut self, timeout: Duration) -> Self {
        self.silence_timeout = timeout;
        self
    }

    /// Set the frames per tap buffer
    #[must_use]
    pub const fn with_tap_buffer_size(mut self, frames: usize) -> Self {
        self.tap_buffer_size = frames;
        self
    }

    /// Current capture state
    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.capture().state
    }

    /// Whether a capture session is in progress
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.capture().state.is_active()
    }

    /// Latest partial transcript of the current session
    #[must_use]
    pub fn last_partial_transcript(&self) -> String {
        self.capture().last_partial.clone()
    }

    /// When the silence timer fires, if armed
    #[must_use]
    pub fn silence_deadline(&self) -> Option<Instant> {
        self.capture().silence_deadline
    }

    /// Listen for one spoken request
    ///
    /// Returns `Ok(None)` without side effects if a session is already
    /// active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSpeechDetected`] when the silence timer fires with
    /// nothing heard, [`Error::PermissionDenied`],
    /// [`Error::PlatformUnsupported`], [`Error::AudioEngine`],
    /// [`Error::Recognition`], or [`Error::Cancelled`] if
    /// [`stop_recording`](Self::stop_recording) ended the session
    pub async fn start_listening(&self) -> Result<Option<String>> {
        let generation = {
            let mut capture = self.capture();
            if capture.state.is_active() {
                tracing::debug!(state = ?capture.state, "capture already active, ignoring start");
                return Ok(None);
            }
            capture.generation += 1;
            capture.state = CaptureState::ConfiguringAudio;
            capture.generation
        };

        // Wait out any teardown still releasing the previous session
        drop(self.teardown_lock.lock().await);

        tracing::info!(generation, "starting to listen");
        let result = self.listen(generation).await;

        {
            let mut capture = self.capture();
            capture.state = match &result {
                Ok(_) => CaptureState::Finalizing,
                Err(Error::Cancelled) => CaptureState::Cancelled,
                Err(_) => CaptureState::Failed,
            };
        }
        self.teardown().await;
        self.capture().state = CaptureState::Idle;

        match &result {
            Ok(transcript) => tracing::info!(transcript = %transcript, "capture finished"),
            Err(e) => tracing::info!(error = %e, "capture ended without transcript"),
        }

        result.map(Some)
    }

    async fn listen(&self, generation: u64) -> Result<String> {
        if !self.recognizer.is_available() {
            return Err(Error::PlatformUnsupported(
                "speech recognition not available".to_string(),
            ));
        }

        if !self.permissions.request_microphone().await {
            return Err(Error::PermissionDenied("microphone".to_string()));
        }
        if !self.permissions.request_speech_recognition().await {
            return Err(Error::PermissionDenied("speech recognition".to_string()));
        }
        tracing::debug!("all permissions granted");

        self.session.configure_for_recording().await?;
        self.capture().holds_recording = true;

        let (audio_tx, request) = RecognitionRequest::new(true);
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let task = self.recognizer.start_task(request, events_tx)?;

        {
            let mut capture = self.capture();
            capture.audio_tx = Some(audio_tx.clone());
            capture.task = Some(task);
            if capture.state == CaptureState::Cancelled || capture.generation != generation {
                return Err(Error::Cancelled);
            }
            capture.cancel = Some(cancel_tx);
        }

        self.input
            .install_tap(self.tap_buffer_size, audio_tx)
            .map_err(into_engine_error)?;
        self.input.start().map_err(into_engine_error)?;

        // Armed once: partial results do not extend the window
        let deadline = Instant::now() + self.silence_timeout;
        {
            let mut capture = self.capture();
            if capture.state == CaptureState::Cancelled {
                return Err(Error::Cancelled);
            }
            capture.state = CaptureState::Listening;
            capture.silence_deadline = Some(deadline);
        }

        let mut events_open = true;
        loop {
            tokio::select! {
                biased;

                _ = &mut cancel_rx => return Err(Error::Cancelled),

                event = events.recv(), if events_open => {
                    let Some(event) = event else {
                        events_open = false;
                        continue;
                    };

                    let mut capture = self.capture();
                    if !capture.is_current(generation) {
                        tracing::trace!(?event, "discarding late recognizer event");
                        continue;
                    }

                    match event {
                        RecognitionEvent::Partial(text) => {
                            tracing::debug!(transcript = %text, "partial result");
                            capture.last_partial = text;
                        }
                        RecognitionEvent::Final(text) => {
                            capture.last_partial.clone_from(&text);
                            return Ok(text);
                        }
                        RecognitionEvent::Error(message) => {
                            tracing::error!(error = %message, "recognition error");
                            return Err(Error::Recognition(message));
                        }
                    }
                }

                () = tokio::time::sleep_until(deadline) => {
                    let partial = self.capture().last_partial.clone();
                    if partial.trim().is_empty() {
                        tracing::debug!("silence timeout with nothing heard");
                        return Err(Error::NoSpeechDetected);
                    }
                    tracing::debug!(transcript = %partial, "silence timeout, using partial result");
                    return Ok(partial);
                }
            }
        }
    }

    /// Stop any capture session and release its resources
    ///
    /// Safe to call in any state, any number of times. An in-flight
    /// [`start_listening`](Self::start_listening) returns
    /// [`Error::Cancelled`].
    pub async fn stop_recording(&self) {
        let cancel = {
            let mut capture = self.capture();
            if matches!(
                capture.state,
                CaptureState::ConfiguringAudio | CaptureState::Listening
            ) {
                capture.state = CaptureState::Cancelled;
            }
            capture.cancel.take()
        };

        if let Some(cancel) = cancel {
            let _ = cancel.send(());
        }

        self.teardown().await;
    }

    async fn teardown(&self) {
        let _guard = self.teardown_lock.lock().await;

        let (audio_tx, task, cancel, holds_recording) = {
            let mut capture = self.capture();
            capture.silence_deadline = None;
            (
                capture.audio_tx.take(),
                capture.task.take(),
                capture.cancel.take(),
                std::mem::take(&mut capture.holds_recording),
            )
        };
        drop(cancel);

        if self.input.is_running() {
            self.input.stop();
        }
        self.input.remove_tap();

        // Dropping the last sender ends the request's audio
        drop(audio_tx);
        if let Some(mut task) = task {
            task.cancel();
        }

        // The session may belong to playback by now
        if holds_recording {
            self.session.release().await;
        }
        self.capture().last_partial.clear();
    }

    fn capture(&self) -> MutexGuard<'_, CaptureSession> {
        self.capture.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn into_engine_error(e: Error) -> Error {
    match e {
        Error::AudioEngine(_) => e,
        other => Error::AudioEngine(other.to_string()),
    }
}
