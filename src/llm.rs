//! Chat completion client

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::{Error, Result};

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model
    System,
    /// The request
    User,
}

/// One chat message
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Author
    pub role: Role,
    /// Text
    pub content: String,
}

impl ChatMessage {
    /// System message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// User message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling options; `None` leaves the endpoint default
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionOptions {
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Completion token cap
    pub max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an `OpenAI`-compatible chat completions endpoint
pub struct ChatClient {
    client: Client,
    api_key: SecretString,
    url: String,
    model: String,
}

impl ChatClient {
    /// Create a client for `model` at `url`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`] if the API key is empty
    pub fn new(api_key: SecretString, url: String, model: String) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::MissingApiKey);
        }

        Ok(Self {
            client: Client::new(),
            api_key,
            url,
            model,
        })
    }

    /// Create a client from completion configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`] if the API key is empty
    pub fn from_config(api_key: SecretString, config: &LlmConfig) -> Result<Self> {
        Self::new(api_key, config.url.clone(), config.model.clone())
    }

    /// Model this client asks for
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one completion and return the first choice's text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on transport failure, [`Error::HttpStatus`]
    /// for any status other than 200, or [`Error::MalformedResponse`] if the
    /// body has no message content
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "requesting completion");

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion request failed");
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_completion(&body)
    }
}

/// Extract `choices[0].message.content` from a completion body
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the body is not a completion or
/// carries no content
pub fn parse_completion(body: &str) -> Result<String> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("invalid completion body: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::MalformedResponse("completion has no message content".to_string()))
}
