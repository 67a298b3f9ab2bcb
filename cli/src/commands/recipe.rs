use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use slank_core::models::{DraftIngredient, DraftInstruction, IngredientLine, Recipe};
use slank_core::service::Tracker;

use super::helpers::truncate;

pub(crate) fn cmd_recipe_list(tracker: &Tracker, tags: &[String], json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Tags")]
        tags: String,
        #[tabled(rename = "Description")]
        description: String,
    }

    let recipes = tracker.recipes(tags)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    if recipes.is_empty() {
        eprintln!("No recipes found");
        process::exit(2);
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            name: r.name.clone(),
            tags: r.tags.join(", "),
            description: truncate(&r.description, 50),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
    Ok(())
}

pub(crate) fn cmd_recipe_show(
    tracker: &Tracker,
    name: &str,
    servings: f64,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "Ingredient")]
        ingredient: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "Grams")]
        grams: String,
        #[tabled(rename = "kcal")]
        calories: String,
    }

    let recipe = tracker.scaled_recipe(name, servings)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
        return Ok(());
    }

    let title = &recipe.name;
    println!("=== {title} ({servings} serving(s)) ===");
    if !recipe.description.is_empty() {
        let description = &recipe.description;
        println!("{description}");
    }
    if !recipe.tags.is_empty() {
        let tags = recipe.tags.join(", ");
        println!("Tags: {tags}");
    }
    println!();

    let rows: Vec<IngredientRow> = recipe
        .ingredients
        .iter()
        .map(|i| IngredientRow {
            ingredient: i.ingredient.clone(),
            quantity: format!("{} {}", i.quantity, i.serving),
            grams: i.grams.map_or("-".into(), |g| format!("{g:.0}")),
            calories: i.calories.map_or("-".into(), |c| format!("{c:.0}")),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let total = recipe.total_calories;
    println!("Total: {total:.0} kcal");

    if !recipe.instructions.is_empty() {
        println!();
        for (i, step) in recipe.instructions.iter().enumerate() {
            let n = i + 1;
            println!("{n}. {step}");
        }
    }
    Ok(())
}

/// Save the drafted recipe under `name`. Draft ingredient quantities are
/// totals for `servings` servings; the drafts are cleared on success.
pub(crate) fn cmd_recipe_save(
    tracker: &Tracker,
    name: &str,
    description: &str,
    servings: f64,
    json: bool,
) -> Result<()> {
    let ingredients: Vec<IngredientLine> = tracker
        .draft_ingredients()?
        .into_iter()
        .map(|d| IngredientLine {
            ingredient: d.ingredient,
            quantity: d.quantity,
            serving: d.serving,
        })
        .collect();
    if ingredients.is_empty() {
        bail!("No drafted ingredients. Add some with 'recipe draft ingredient' first");
    }
    let instructions: Vec<String> = tracker
        .draft_instructions()?
        .into_iter()
        .map(|d| d.instruction)
        .collect();
    let tags = tracker.draft_tags()?;

    let recipe = Recipe {
        name: name.to_string(),
        description: description.to_string(),
        tags,
        ingredients,
        instructions,
    };
    tracker.save_recipe(&recipe, servings)?;
    tracker.clear_drafts()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
        return Ok(());
    }
    println!("Saved recipe: {name} ({servings} serving(s))");
    Ok(())
}

pub(crate) fn cmd_recipe_remove(tracker: &Tracker, name: &str, json: bool) -> Result<()> {
    tracker.remove_recipe(name)?;

    if json {
        println!("{}", serde_json::json!({ "removed": name }));
        return Ok(());
    }
    println!("Removed recipe: {name}");
    Ok(())
}

// --- Drafts ---

pub(crate) fn cmd_draft_ingredient(
    tracker: &Tracker,
    ingredient: &str,
    quantity: f64,
    serving: &str,
) -> Result<()> {
    tracker.add_draft_ingredient(&DraftIngredient {
        ingredient: ingredient.to_string(),
        quantity,
        serving: serving.to_string(),
    })?;
    println!("Drafted ingredient: {quantity} {serving} {ingredient}");
    Ok(())
}

pub(crate) fn cmd_draft_instruction(tracker: &Tracker, text: &str) -> Result<()> {
    tracker.add_draft_instruction(&DraftInstruction {
        instruction: text.to_string(),
    })?;
    println!("Drafted instruction step");
    Ok(())
}

pub(crate) fn cmd_draft_tag(tracker: &Tracker, tag: &str) -> Result<()> {
    // Only established tags may be attached to a recipe.
    if !tracker.tags()?.iter().any(|t| t == tag) {
        bail!("Unknown tag '{tag}'. Add it with 'tag add' first");
    }
    tracker.add_draft_tag(tag)?;
    println!("Drafted tag: {tag}");
    Ok(())
}

pub(crate) fn cmd_draft_show(tracker: &Tracker, json: bool) -> Result<()> {
    let ingredients = tracker.draft_ingredients()?;
    let instructions = tracker.draft_instructions()?;
    let tags = tracker.draft_tags()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "ingredients": ingredients,
                "instructions": instructions,
                "tags": tags,
            }))?
        );
        return Ok(());
    }

    if ingredients.is_empty() && instructions.is_empty() && tags.is_empty() {
        println!("No recipe draft in progress.");
        return Ok(());
    }

    println!("=== Recipe draft ===");
    if !tags.is_empty() {
        let tags = tags.join(", ");
        println!("Tags: {tags}");
    }
    if !ingredients.is_empty() {
        println!("Ingredients:");
        for i in &ingredients {
            let ingredient = &i.ingredient;
            let quantity = i.quantity;
            let serving = &i.serving;
            println!("  {quantity} {serving} {ingredient}");
        }
    }
    if !instructions.is_empty() {
        println!("Instructions:");
        for (i, step) in instructions.iter().enumerate() {
            let n = i + 1;
            let text = &step.instruction;
            println!("  {n}. {text}");
        }
    }
    Ok(())
}

pub(crate) fn cmd_draft_clear(tracker: &Tracker) -> Result<()> {
    tracker.clear_drafts()?;
    println!("Cleared recipe draft");
    Ok(())
}

// --- Tags ---

pub(crate) fn cmd_tag_add(tracker: &Tracker, tag: &str, json: bool) -> Result<()> {
    tracker.add_tag(tag)?;

    if json {
        println!("{}", serde_json::json!({ "added": tag }));
        return Ok(());
    }
    println!("Added tag: {tag}");
    Ok(())
}

pub(crate) fn cmd_tag_remove(tracker: &Tracker, tag: &str, json: bool) -> Result<()> {
    tracker.remove_tag(tag)?;

    if json {
        println!("{}", serde_json::json!({ "removed": tag }));
        return Ok(());
    }
    println!("Removed tag: {tag}");
    Ok(())
}

pub(crate) fn cmd_tag_list(tracker: &Tracker, json: bool) -> Result<()> {
    let tags = tracker.tags()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
        return Ok(());
    }

    if tags.is_empty() {
        eprintln!("No tags defined");
        process::exit(2);
    }
    for tag in tags {
        println!("{tag}");
    }
    Ok(())
}
