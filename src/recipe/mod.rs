//! Recipes: completion client, response parser and display formatting

mod client;
mod format;
mod parse;

use async_trait::async_trait;

use crate::Result;

pub use client::{RecipeClient, SYSTEM_PROMPT, recipe_prompt};
pub use format::format_recipe_details;
pub use parse::{DEFAULT_PREPARATION_TIME, DEFAULT_SERVINGS, parse_recipe};

/// A recipe as returned by the completion endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    /// Dish name
    pub title: String,
    /// Free-form preparation time, e.g. "20 minutes"
    pub preparation_time: String,
    /// Number of servings, at least 1
    pub servings: u32,
    /// Ingredients in listed order
    pub ingredients: Vec<String>,
    /// Numbered steps in listed order, one per entry
    pub instructions: Vec<String>,
}

impl Recipe {
    /// Steps joined with newlines
    #[must_use]
    pub fn instructions_text(&self) -> String {
        self.instructions.join("\n")
    }
}

/// Anything that can turn a spoken request into a recipe
#[async_trait]
pub trait RecipeSource: Send + Sync {
    /// Look up a recipe for `query`
    ///
    /// # Errors
    ///
    /// Returns error if the lookup fails or yields no usable recipe
    async fn get_recipe(&self, query: &str) -> Result<Recipe>;
}
