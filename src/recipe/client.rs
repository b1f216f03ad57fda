//! Recipe lookup over chat completions

use async_trait::async_trait;

use super::{Recipe, RecipeSource, parse_recipe};
use crate::Result;
use crate::config::Config;
use crate::llm::{ChatClient, ChatMessage, CompletionOptions};

/// Instructions given to the model with every request
pub const SYSTEM_PROMPT: &str =
    "You are a helpful cooking assistant. Provide detailed recipes with exact measurements.";

/// Build the request for a spoken query, pinning the response layout
#[must_use]
pub fn recipe_prompt(query: &str) -> String {
    format!(
        "Create a detailed recipe based on this request: \"{query}\".
Format the response in this exact structure:
Title: [recipe name]
Preparation Time: [time]
Servings: [number]
Ingredients:
- [ingredient 1]
- [ingredient 2]
Instructions:
1. [step 1]
2. [step 2]"
    )
}

/// Fetches recipes from a chat completion model
pub struct RecipeClient {
    chat: ChatClient,
    options: CompletionOptions,
}

impl RecipeClient {
    /// Create a client over `chat`
    #[must_use]
    pub const fn new(chat: ChatClient, options: CompletionOptions) -> Self {
        Self { chat, options }
    }

    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`](crate::Error::MissingApiKey) if no
    /// `OpenAI` key is configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let chat = ChatClient::from_config(config.api_keys.openai_key()?, &config.llm)?;
        Ok(Self::new(
            chat,
            CompletionOptions {
                temperature: Some(config.llm.temperature),
                max_tokens: Some(config.llm.max_tokens),
            },
        ))
    }
}

#[async_trait]
impl RecipeSource for RecipeClient {
    async fn get_recipe(&self, query: &str) -> Result<Recipe> {
        tracing::info!(query = %query, model = %self.chat.model(), "looking up recipe");

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(recipe_prompt(query)),
        ];
        let text = self.chat.complete(&messages, self.options).await?;

        parse_recipe(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_quotes_query_and_pins_layout() {
        let prompt = recipe_prompt("banana bread");

        assert!(prompt.starts_with("Create a detailed recipe based on this request: \"banana bread\"."));
        for marker in ["Title:", "Preparation Time:", "Servings:", "Ingredients:", "Instructions:"] {
            assert!(prompt.lines().any(|l| l.starts_with(marker)), "{marker}");
        }
    }
}
