//! TOML configuration file loading
//!
//! Supports `~/.config/recipe-voice/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RecipeVoiceConfigFile {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Conversation flow configuration
    #[serde(default)]
    pub conversation: ConversationFileConfig,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-3.5-turbo")
    pub model: Option<String>,

    /// Chat completions endpoint
    pub url: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Completion token cap
    pub max_tokens: Option<u32>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "nova")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Maximum characters per synthesized chunk
    pub max_chunk_len: Option<usize>,

    /// Pause between synthesized chunks, in milliseconds
    pub chunk_pause_ms: Option<u64>,

    /// Silence timeout while listening, in milliseconds
    pub silence_timeout_ms: Option<u64>,
}

/// Conversation flow configuration
#[derive(Debug, Default, Deserialize)]
pub struct ConversationFileConfig {
    /// Listening retries after no speech was heard
    pub max_retries: Option<u32>,
}

/// Load the TOML config file from the standard path
///
/// Returns `RecipeVoiceConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> RecipeVoiceConfigFile {
    config_file_path().map_or_else(RecipeVoiceConfigFile::default, |path| {
        load_config_file_from(&path)
    })
}

/// Load a TOML config file from an explicit path
pub fn load_config_file_from(path: &Path) -> RecipeVoiceConfigFile {
    if !path.exists() {
        return RecipeVoiceConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                RecipeVoiceConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            RecipeVoiceConfigFile::default()
        }
    }
}

/// Return the config file path
///
/// `RECIPE_VOICE_CONFIG` wins; otherwise `~/.config/recipe-voice/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("RECIPE_VOICE_CONFIG") {
        return Some(PathBuf::from(path));
    }

    directories::BaseDirs::new().map(|d| d.config_dir().join("recipe-voice").join("config.toml"))
}
