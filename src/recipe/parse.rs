//! Line-oriented recipe response parser
//!
//! The completion is asked for a fixed layout (`Title:`, `Preparation Time:`,
//! `Servings:`, `Ingredients:` with `-` bullets, `Instructions:` with numbered
//! steps). Parsing is best effort: lines that match nothing are dropped.

use std::sync::LazyLock;

use regex::Regex;

use super::Recipe;
use crate::{Error, Result};

/// Servings when the response has none, or none we can read
pub const DEFAULT_SERVINGS: u32 = 4;

/// Preparation time when the response has none
pub const DEFAULT_PREPARATION_TIME: &str = "30 minutes";

static NUMBERED_STEP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.").expect("step pattern is valid"));

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Ingredients,
    Instructions,
}

/// Parse a completion into a [`Recipe`]
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if neither a title, an ingredient nor
/// a step could be found
pub fn parse_recipe(response: &str) -> Result<Recipe> {
    let mut title = String::new();
    let mut preparation_time = DEFAULT_PREPARATION_TIME.to_string();
    let mut servings = DEFAULT_SERVINGS;
    let mut ingredients = Vec::new();
    let mut instructions = Vec::new();
    let mut section = Section::None;

    for line in response.lines() {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("Title:") {
            rest.trim().clone_into(&mut title);
        } else if let Some(rest) = line.strip_prefix("Preparation Time:") {
            rest.trim().clone_into(&mut preparation_time);
        } else if let Some(rest) = line.strip_prefix("Servings:") {
            servings = parse_servings(rest);
        } else if line == "Ingredients:" {
            section = Section::Ingredients;
        } else if line == "Instructions:" {
            section = Section::Instructions;
        } else if section == Section::Ingredients {
            if let Some(item) = line.strip_prefix('-') {
                ingredients.push(item.trim().to_string());
            }
        } else if section == Section::Instructions && NUMBERED_STEP.is_match(line) {
            instructions.push(line.to_string());
        }
    }

    if title.is_empty() && ingredients.is_empty() && instructions.is_empty() {
        tracing::warn!(chars = response.len(), "completion did not follow the recipe layout");
        return Err(Error::MalformedResponse(
            "no recipe found in completion".to_string(),
        ));
    }

    tracing::debug!(
        title = %title,
        ingredients = ingredients.len(),
        steps = instructions.len(),
        "recipe parsed"
    );

    Ok(Recipe {
        title,
        preparation_time,
        servings,
        ingredients,
        instructions,
    })
}

/// Leading digits of `value`, or the default if there are none or they are 0
fn parse_servings(value: &str) -> u32 {
    let value = value.trim();
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());

    match value[..end].parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => DEFAULT_SERVINGS,
    }
}
