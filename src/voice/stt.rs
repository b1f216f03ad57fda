//! Speech-to-text (STT) processing

use secrecy::{ExposeSecret, SecretString};

use crate::config::DEFAULT_STT_URL;
use crate::{Error, Result};

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech to text via `OpenAI` Whisper
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    url: String,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`] if the API key is empty
    pub fn new_whisper(api_key: SecretString, model: String) -> Result<Self> {
        Self::with_url(api_key, model, DEFAULT_STT_URL.to_string())
    }

    /// Create a new STT instance against a custom endpoint
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`] if the API key is empty
    pub fn with_url(api_key: SecretString, model: String, url: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::MissingApiKey);
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            url,
        })
    }

    /// Transcribe audio to text
    ///
    /// # Arguments
    ///
    /// * `audio` - WAV audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Recognition(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::MalformedResponse(e.to_string())
        })?;

        let text = result.text.trim().to_string();
        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_rejected() {
        let result = SpeechToText::new_whisper(SecretString::from(String::new()), "whisper-1".into());
        assert!(matches!(result, Err(Error::MissingApiKey)));
    }

    #[test]
    fn test_whisper_uses_default_endpoint() {
        let stt = SpeechToText::new_whisper(SecretString::from("key".to_string()), "whisper-1".into())
            .unwrap();
        assert_eq!(stt.url, DEFAULT_STT_URL);
        assert_eq!(stt.model, "whisper-1");
    }
}
