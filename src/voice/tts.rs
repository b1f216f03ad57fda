//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{DEFAULT_TTS_URL, VoiceConfig};
use crate::{Error, Result};

/// Remote speech synthesis
#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Synthesize one chunk of text to encoded audio bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Synthesizes speech from text with the `OpenAI` speech endpoint
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    url: String,
    voice: String,
    speed: f32,
    model: String,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`] if the API key is empty
    pub fn new_openai(api_key: SecretString, voice: String, speed: f32) -> Result<Self> {
        Self::new_openai_with_model(api_key, voice, speed, "tts-1".to_string())
    }

    /// Create a new TTS instance using `OpenAI` with custom model
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`] if the API key is empty
    pub fn new_openai_with_model(
        api_key: SecretString,
        voice: String,
        speed: f32,
        model: String,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::MissingApiKey);
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            url: DEFAULT_TTS_URL.to_string(),
            voice,
            speed,
            model,
        })
    }

    /// Create a TTS instance from voice configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`] if the API key is empty
    pub fn from_config(api_key: SecretString, config: &VoiceConfig) -> Result<Self> {
        let mut tts = Self::new_openai_with_model(
            api_key,
            config.tts_voice.clone(),
            config.tts_speed,
            config.tts_model.clone(),
        )?;
        tts.url.clone_from(&config.tts_url);
        Ok(tts)
    }
}

#[async_trait]
impl TtsClient for TextToSpeech {
    /// Synthesize text to MP3 bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        tracing::debug!(chars = text.len(), voice = %self.voice, "requesting speech");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "OpenAI TTS error");
            return Err(Error::SynthesisRequestFailed(format!(
                "OpenAI TTS error {status}: {body}"
            )));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_rejected() {
        let result = TextToSpeech::new_openai(SecretString::from(String::new()), "nova".into(), 0.85);
        assert!(matches!(result, Err(Error::MissingApiKey)));
    }

    #[test]
    fn test_config_endpoint_is_used() {
        let config = VoiceConfig {
            tts_url: "http://localhost:9/speech".to_string(),
            ..VoiceConfig::default()
        };
        let tts = TextToSpeech::from_config(SecretString::from("key".to_string()), &config).unwrap();
        assert_eq!(tts.url, "http://localhost:9/speech");
        assert_eq!(tts.voice, "nova");
        assert_eq!(tts.model, "tts-1");
    }
}
