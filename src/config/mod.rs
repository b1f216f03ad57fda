//! Configuration management for the recipe assistant

pub mod file;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

use self::file::RecipeVoiceConfigFile;

/// Default chat completions endpoint
pub const DEFAULT_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default speech synthesis endpoint
pub const DEFAULT_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Default transcription endpoint
pub const DEFAULT_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Recipe assistant configuration
#[derive(Debug)]
pub struct Config {
    /// API keys
    pub api_keys: ApiKeys,

    /// Recipe completion configuration
    pub llm: LlmConfig,

    /// Voice capture and synthesis configuration
    pub voice: VoiceConfig,

    /// Conversation flow configuration
    pub conversation: ConversationConfig,
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (chat completions, Whisper and TTS)
    pub openai: Option<SecretString>,
}

impl ApiKeys {
    /// Hand out a copy of the `OpenAI` key for a client
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`] if no non-empty key is configured
    pub fn openai_key(&self) -> Result<SecretString> {
        match &self.openai {
            Some(key) if !key.expose_secret().trim().is_empty() => {
                Ok(SecretString::from(key.expose_secret().to_owned()))
            }
            _ => Err(Error::MissingApiKey),
        }
    }
}

/// Chat completion configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat completions endpoint
    pub url: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Completion token cap
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHAT_URL.to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 800,
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Speech synthesis endpoint
    pub tts_url: String,

    /// TTS model
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Transcription endpoint
    pub stt_url: String,

    /// STT model
    pub stt_model: String,

    /// Maximum characters per synthesized chunk
    pub max_chunk_len: usize,

    /// Pause after each synthesized chunk
    pub chunk_pause: Duration,

    /// Silence timeout while listening
    pub silence_timeout: Duration,

    /// Frames per tap buffer delivered to the recognizer
    pub tap_buffer_size: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tts_url: DEFAULT_TTS_URL.to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "nova".to_string(),
            tts_speed: 0.85,
            stt_url: DEFAULT_STT_URL.to_string(),
            stt_model: "whisper-1".to_string(),
            max_chunk_len: 150,
            chunk_pause: Duration::from_millis(500),
            silence_timeout: Duration::from_secs(5),
            tap_buffer_size: 4096,
        }
    }
}

/// Conversation flow configuration
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Listening retries after no speech was heard
    pub max_retries: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is out of range
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is out of range
    pub fn from_sources(
        fc: RecipeVoiceConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
        };

        let llm_defaults = LlmConfig::default();
        let llm = LlmConfig {
            url: fc.llm.url.unwrap_or(llm_defaults.url),
            model: env("RECIPE_VOICE_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or(llm_defaults.model),
            temperature: fc.llm.temperature.unwrap_or(llm_defaults.temperature),
            max_tokens: fc.llm.max_tokens.unwrap_or(llm_defaults.max_tokens),
        };

        let voice_defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            tts_model: env("RECIPE_VOICE_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(voice_defaults.tts_model),
            tts_voice: env("RECIPE_VOICE_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(voice_defaults.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(voice_defaults.tts_speed),
            stt_model: env("RECIPE_VOICE_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(voice_defaults.stt_model),
            max_chunk_len: fc.voice.max_chunk_len.unwrap_or(voice_defaults.max_chunk_len),
            chunk_pause: fc
                .voice
                .chunk_pause_ms
                .map_or(voice_defaults.chunk_pause, Duration::from_millis),
            silence_timeout: fc
                .voice
                .silence_timeout_ms
                .map_or(voice_defaults.silence_timeout, Duration::from_millis),
            ..voice_defaults
        };

        if !(0.25..=4.0).contains(&voice.tts_speed) {
            return Err(Error::Config(format!(
                "tts_speed must be between 0.25 and 4.0, got {}",
                voice.tts_speed
            )));
        }

        if voice.max_chunk_len == 0 {
            return Err(Error::Config("max_chunk_len must be positive".to_string()));
        }

        if voice.silence_timeout.is_zero() {
            return Err(Error::Config("silence_timeout_ms must be positive".to_string()));
        }

        let conversation = ConversationConfig {
            max_retries: fc
                .conversation
                .max_retries
                .unwrap_or_else(|| ConversationConfig::default().max_retries),
        };

        tracing::debug!(
            llm_model = %llm.model,
            tts_voice = %voice.tts_voice,
            max_retries = conversation.max_retries,
            has_openai_key = api_keys.openai.is_some(),
            "configuration resolved"
        );

        Ok(Self {
            api_keys,
            llm,
            voice,
            conversation,
        })
    }
}
