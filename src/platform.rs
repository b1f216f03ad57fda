//! Platform wiring
//!
//! Builds the desktop implementations of the voice collaborators and hands
//! them to the orchestrator. Targets without an audio backend fail with
//! [`Error::PlatformUnsupported`](crate::Error::PlatformUnsupported).

use std::sync::Arc;

use crate::Result;
use crate::config::Config;
use crate::conversation::ConversationOrchestrator;
use crate::recipe::RecipeClient;
use crate::voice::{AudioSessionManager, SpeechCaptureEngine, SpeechSynthesizer};

/// Create the shared audio session for this platform
///
/// # Errors
///
/// Returns `PlatformUnsupported` on targets without an audio backend
pub fn audio_session() -> Result<AudioSessionManager> {
    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]
    return Ok(desktop::audio_session());

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    Err(unsupported("audio session"))
}

/// Build the speech capture engine
///
/// # Errors
///
/// Returns `MissingApiKey` without an `OpenAI` key, `AudioEngine` if no
/// usable input device exists, or `PlatformUnsupported`
pub fn capture_engine(config: &Config, session: AudioSessionManager) -> Result<SpeechCaptureEngine> {
    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]
    return desktop::capture_engine(config, session);

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        let _ = (config, session);
        Err(unsupported("speech capture"))
    }
}

/// Build the speech synthesizer
///
/// # Errors
///
/// Returns `MissingApiKey` without an `OpenAI` key, `PlaybackFailed` if no
/// usable output device exists, or `PlatformUnsupported`
pub fn synthesizer(config: &Config, session: AudioSessionManager) -> Result<SpeechSynthesizer> {
    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]
    return desktop::synthesizer(config, session);

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        let _ = (config, session);
        Err(unsupported("speech synthesis"))
    }
}

/// Build the full assistant
///
/// # Errors
///
/// Returns error if any collaborator cannot be built
pub fn assistant(config: &Config) -> Result<ConversationOrchestrator> {
    let session = audio_session()?;
    let capture = capture_engine(config, session.clone())?;
    let synthesizer = synthesizer(config, session)?;
    let recipes = RecipeClient::from_config(config)?;

    tracing::info!("assistant ready");

    Ok(ConversationOrchestrator::new(
        Arc::new(capture),
        Arc::new(synthesizer),
        Arc::new(recipes),
    )
    .with_max_retries(config.conversation.max_retries))
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
fn unsupported(what: &str) -> crate::Error {
    crate::Error::PlatformUnsupported(format!("{what} is not implemented for this platform"))
}

#[cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]
mod desktop {
    use std::sync::Arc;

    use crate::Result;
    use crate::config::Config;
    use crate::voice::{
        AudioSessionManager, CpalAudioInput, CpalPlayer, HostAudioSession, HostPermissions,
        SpeechCaptureEngine, SpeechSynthesizer, SpeechToText, TextToSpeech, WhisperRecognizer,
    };

    pub fn audio_session() -> AudioSessionManager {
        AudioSessionManager::new(HostAudioSession::new())
    }

    pub fn capture_engine(
        config: &Config,
        session: AudioSessionManager,
    ) -> Result<SpeechCaptureEngine> {
        let stt = SpeechToText::with_url(
            config.api_keys.openai_key()?,
            config.voice.stt_model.clone(),
            config.voice.stt_url.clone(),
        )?;
        let input = CpalAudioInput::new()?;

        Ok(SpeechCaptureEngine::new(
            session,
            Arc::new(input),
            Arc::new(WhisperRecognizer::new(stt)),
            // Whisper needs no grant beyond the API key checked above
            Arc::new(HostPermissions::new(true)),
        )
        .with_silence_timeout(config.voice.silence_timeout)
        .with_tap_buffer_size(config.voice.tap_buffer_size))
    }

    pub fn synthesizer(config: &Config, session: AudioSessionManager) -> Result<SpeechSynthesizer> {
        let tts = TextToSpeech::from_config(config.api_keys.openai_key()?, &config.voice)?;
        let player = CpalPlayer::new()?;

        Ok(SpeechSynthesizer::new(session, Arc::new(tts), Arc::new(player))
            .with_max_chunk_len(config.voice.max_chunk_len)
            .with_chunk_pause(config.voice.chunk_pause))
    }
}
