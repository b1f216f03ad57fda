//! Speech synthesizer
//!
//! Speaks text one chunk at a time: request audio, write it to a temporary
//! file, switch the session to playback, play it, remove the file, pause.
//! Chunks never overlap and a chunk's file is gone before the next starts.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tempfile::NamedTempFile;

use super::chunking::{DEFAULT_MAX_CHUNK_LEN, split_text_into_chunks};
use super::playback::AudioPlayer;
use super::session::AudioSessionManager;
use super::tts::TtsClient;
use crate::{Error, Result};

/// Default pause after each chunk
pub const DEFAULT_CHUNK_PAUSE: Duration = Duration::from_millis(500);

/// Progress of the current or last synthesis job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisState {
    /// Nothing spoken yet
    Idle,
    /// Waiting for audio of the current chunk
    RequestingAudio,
    /// Playing the current chunk
    Playing,
    /// All chunks played, or stopped
    Completed,
    /// Ended with an error
    Failed,
}

/// Snapshot of a synthesis job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisProgress {
    /// Job state
    pub state: SynthesisState,
    /// Index of the chunk being requested or played
    pub current_index: usize,
    /// Number of chunks in the job
    pub chunk_count: usize,
}

/// Turns text into sequential spoken audio
pub struct SpeechSynthesizer {
    tts: Arc<dyn TtsClient>,
    player: Arc<dyn AudioPlayer>,
    session: AudioSessionManager,
    max_chunk_len: usize,
    chunk_pause: Duration,
    temp_dir: Option<PathBuf>,
    next_job: AtomicU64,
    active_job: AtomicU64,
    progress: Mutex<SynthesisProgress>,
}

impl SpeechSynthesizer {
    /// Create a synthesizer over the shared audio session
    #[must_use]
    pub fn new(
        session: AudioSessionManager,
        tts: Arc<dyn TtsClient>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            tts,
            player,
            session,
            max_chunk_len: DEFAULT_MAX_CHUNK_LEN,
            chunk_pause: DEFAULT_CHUNK_PAUSE,
            temp_dir: None,
            next_job: AtomicU64::new(0),
            active_job: AtomicU64::new(0),
            progress: Mutex::new(SynthesisProgress {
                state: SynthesisState::Idle,
                current_index: 0,
                chunk_count: 0,
            }),
        }
    }

    /// Set the maximum characters per chunk
    #[must_use]
    pub const fn with_max_chunk_len(mut self, max_chunk_len: usize) -> Self {
        self.max_chunk_len = max_chunk_len;
        self
    }

    /// Set the pause after each chunk
    #[must_use]
    pub const fn with_chunk_pause(mut self, pause: Duration) -> Self {
        self.chunk_pause = pause;
        self
    }

    /// Write temporary audio files into `dir` instead of the system temp dir
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Whether a job is in progress
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.active_job.load(Ordering::SeqCst) != 0
    }

    /// Progress of the current or last job
    #[must_use]
    pub fn progress(&self) -> SynthesisProgress {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Speak `text`, returning once the last chunk has played
    ///
    /// Empty text, or a call while already speaking, is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SynthesisRequestFailed`] if the TTS endpoint rejects
    /// a chunk, [`Error::PlaybackFailed`] if a chunk cannot be played, or
    /// [`Error::AudioEngine`] if the session cannot switch to playback
    pub async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let job = self.next_job.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .active_job
            .compare_exchange(0, job, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("already speaking, ignoring");
            return Ok(());
        }

        let chunks = split_text_into_chunks(text, self.max_chunk_len);
        tracing::debug!(job, chunks = chunks.len(), "speaking");
        self.set_progress(SynthesisState::Idle, 0, chunks.len());

        let result = self.speak_chunks(job, &chunks).await;

        let state = if result.is_ok() {
            SynthesisState::Completed
        } else {
            SynthesisState::Failed
        };
        // A stopped job must not overwrite the progress of its successor
        let active = self.active_job.load(Ordering::SeqCst);
        if active == job || active == 0 {
            let index = self.progress().current_index;
            self.set_progress(state, index, chunks.len());
        }

        // Only clear the flag if stop() hasn't already handed it on
        let _ = self
            .active_job
            .compare_exchange(job, 0, Ordering::SeqCst, Ordering::SeqCst);

        if let Err(e) = &result {
            tracing::error!(error = %e, "speech error");
        }
        result
    }

    async fn speak_chunks(&self, job: u64, chunks: &[String]) -> Result<()> {
        for (index, chunk) in chunks.iter().enumerate() {
            if !self.is_current(job) {
                tracing::debug!(job, index, "speech stopped, skipping remaining chunks");
                break;
            }

            self.set_progress(SynthesisState::RequestingAudio, index, chunks.len());
            let audio = self.tts.synthesize(chunk).await?;
            if !self.is_current(job) {
                tracing::debug!(job, index, "speech stopped during synthesis, dropping chunk");
                break;
            }
            let file = self.write_temp_audio(&audio)?;

            self.session.configure_for_playback().await?;
            if !self.is_current(job) {
                tracing::debug!(job, index, "speech stopped before playback, dropping chunk");
                break;
            }

            self.set_progress(SynthesisState::Playing, index, chunks.len());
            let played = self.player.play_file(file.path()).await;

            // The file goes only after the player is done with it
            let removed = file.close();
            played.map_err(into_playback_error)?;
            removed?;

            tokio::time::sleep(self.chunk_pause).await;
        }

        Ok(())
    }

    /// Halt current playback and clear the speaking flag
    ///
    /// A chunk whose audio is still being requested is never played, and
    /// later chunks of the in-flight job are skipped.
    pub fn stop(&self) {
        self.active_job.store(0, Ordering::SeqCst);
        self.player.stop();
    }

    fn is_current(&self, job: u64) -> bool {
        self.active_job.load(Ordering::SeqCst) == job
    }

    fn write_temp_audio(&self, audio: &[u8]) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("speech-").suffix(".mp3");
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(audio)?;
        file.flush()?;
        Ok(file)
    }

    fn set_progress(&self, state: SynthesisState, current_index: usize, chunk_count: usize) {
        *self.progress.lock().unwrap_or_else(PoisonError::into_inner) = SynthesisProgress {
            state,
            current_index,
            chunk_count,
        };
    }
}

fn into_playback_error(e: Error) -> Error {
    match e {
        Error::PlaybackFailed(_) => e,
        other => Error::PlaybackFailed(other.to_string()),
    }
}
