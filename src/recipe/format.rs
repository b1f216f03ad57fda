//! Recipe display text

use std::fmt::Write;

use super::Recipe;

/// Render a recipe as the decorated text shown to the user
#[must_use]
pub fn format_recipe_details(recipe: &Recipe) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "🍳 {} 🍳", recipe.title.to_uppercase());
    out.push('\n');
    let _ = writeln!(out, "⏱️ Preparation Time: {}", recipe.preparation_time);
    let _ = writeln!(out, "👥 Servings: {}", recipe.servings);
    out.push('\n');

    out.push_str("📝 INGREDIENTS:\n");
    for ingredient in &recipe.ingredients {
        let _ = writeln!(out, "• {ingredient}");
    }
    out.push('\n');

    out.push_str("📋 INSTRUCTIONS:\n");
    for step in &recipe.instructions {
        let _ = writeln!(out, "{step}");
    }
    out.push('\n');

    out.push_str("Bon Appétit! 🎉");
    out
}
