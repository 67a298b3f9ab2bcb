use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;

use crate::metrics::{
    self, MealTotals, ResolvedEntry, calories_rounded, food_index, resolve_grams,
};
use crate::models::{
    DraftIngredient, DraftInstruction, FoodItem, IngredientLine, LogEntry, PersonInfo, Recipe,
    RecipeIngredientRow, RecipeInfoRow, RecipeInstructionRow, RecipeTagRow, Target, TagRow,
    WeightEntry, ensure_unique_name, validate_food_item, validate_log_entry, validate_weight,
};
use crate::sheets::SheetClient;
use crate::table::{Table, empty_schema};

pub const FOOD_DATA_SHEET: &str = "food_data";
pub const RECIPE_INFO_SHEET: &str = "recipe_info";
pub const RECIPE_TAGS_SHEET: &str = "recipe_tags";
pub const RECIPE_INGREDIENTS_SHEET: &str = "recipe_ingredients";
pub const RECIPE_INSTRUCTIONS_SHEET: &str = "recipe_instructions";
pub const AVAILABLE_TAGS_SHEET: &str = "available_tags";
pub const DRAFT_INGREDIENTS_SHEET: &str = "new_recipe_ingredients";
pub const DRAFT_INSTRUCTIONS_SHEET: &str = "new_recipe_instructions";
pub const DRAFT_TAGS_SHEET: &str = "new_recipe_tags";

#[must_use]
pub fn food_log_sheet(person: &str) -> String {
    format!("food_log_{person}")
}

#[must_use]
pub fn weight_log_sheet(person: &str) -> String {
    format!("weight_log_{person}")
}

#[must_use]
pub fn target_sheet(person: &str) -> String {
    format!("target_{person}")
}

#[must_use]
pub fn info_sheet(person: &str) -> String {
    format!("info_{person}")
}

/// Everything the daily overview shows: resolved log lines, per-meal totals,
/// and the energy budget. Budget fields are `None` when the person has no
/// info or weight entries yet.
#[derive(Debug, Clone, Serialize)]
pub struct DayOverview {
    pub date: NaiveDate,
    pub entries: Vec<ResolvedEntry>,
    pub totals: MealTotals,
    pub consumed: f64,
    pub weight: Option<f64>,
    pub expenditure: Option<f64>,
    pub target_deficit: Option<f64>,
    pub remaining: Option<f64>,
}

/// One weight entry with its delta from the person's first entry.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProgressEntry {
    pub date: NaiveDate,
    pub weight: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeStanding {
    pub person: String,
    pub start_weight: f64,
    pub current_weight: f64,
    pub delta: f64,
}

/// Head-to-head weight challenge. The leader is whoever has the lowest delta
/// from their own first entry; on an exact tie the first listed person leads.
#[derive(Debug, Clone, Serialize)]
pub struct Challenge {
    pub standings: Vec<ChallengeStanding>,
    pub leader: String,
}

/// One ingredient line scaled to a chosen serving count. Grams and kcal are
/// `None` when the ingredient is not in `food_data`.
#[derive(Debug, Clone, Serialize)]
pub struct ScaledIngredient {
    pub ingredient: String,
    pub quantity: f64,
    pub serving: String,
    pub grams: Option<f64>,
    pub calories: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScaledRecipe {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub servings: f64,
    pub ingredients: Vec<ScaledIngredient>,
    pub instructions: Vec<String>,
    /// Sum over the lines whose ingredient is known.
    pub total_calories: f64,
}

/// The service layer: one method per user operation, all sheet access going
/// through the rate-limit-aware client.
pub struct Tracker {
    client: SheetClient,
}

impl Tracker {
    #[must_use]
    pub fn new(client: SheetClient) -> Self {
        Self { client }
    }

    pub fn clear_cache(&self) -> Result<usize> {
        self.client.cache().clear_all()
    }

    fn load_decoded<T: serde::de::DeserializeOwned>(&self, sheet: &str) -> Result<Vec<T>> {
        self.client
            .load(sheet)?
            .decode()
            .with_context(|| format!("Sheet '{sheet}' has malformed rows"))
    }

    fn save_encoded<T: Serialize>(&self, sheet: &str, records: &[T]) -> Result<()> {
        let table = if records.is_empty() {
            empty_schema(sheet)
        } else {
            Table::encode(records)?
        };
        self.client.save(sheet, &table)
    }

    // --- Food items ---

    pub fn foods(&self) -> Result<Vec<FoodItem>> {
        self.load_decoded(FOOD_DATA_SHEET)
    }

    pub fn add_food(&self, item: &FoodItem) -> Result<()> {
        validate_food_item(item)?;
        let mut foods = self.foods()?;
        let names: Vec<String> = foods.iter().map(|f| f.name.clone()).collect();
        ensure_unique_name("food item", &item.name, &names)?;
        foods.push(item.clone());
        self.save_encoded(FOOD_DATA_SHEET, &foods)
    }

    pub fn remove_food(&self, name: &str) -> Result<()> {
        let mut foods = self.foods()?;
        let before = foods.len();
        foods.retain(|f| f.name != name);
        if foods.len() == before {
            bail!("No food item named '{name}'");
        }
        self.save_encoded(FOOD_DATA_SHEET, &foods)
    }

    // --- Food log ---

    pub fn log_entries(&self, person: &str) -> Result<Vec<LogEntry>> {
        self.load_decoded(&food_log_sheet(person))
    }

    pub fn add_log_entry(&self, person: &str, entry: &LogEntry) -> Result<()> {
        validate_log_entry(entry)?;
        let foods = self.foods()?;
        if !foods.iter().any(|f| f.name == entry.name) {
            bail!("Unknown food '{}'. Add it to the food list first", entry.name);
        }
        let sheet = food_log_sheet(person);
        let mut log = self.log_entries(person)?;
        log.push(entry.clone());
        self.save_encoded(&sheet, &log)
    }

    /// The daily overview page: resolved log lines, per-meal subtotals, and
    /// the remaining energy budget for the given activity level (0-5).
    pub fn day_overview(&self, person: &str, date: NaiveDate, level: usize) -> Result<DayOverview> {
        let foods = food_index(&self.foods()?);
        let log = self.log_entries(person)?;
        let entries = metrics::resolve_day(&log, &foods, date);
        let totals = metrics::daily_meal_totals(&entries);
        let consumed = totals.consumed();

        let weight = self.current_weight(person)?.map(|e| e.weight);
        let info = self.person_info(person)?;
        let target_deficit = self.target(person)?;

        let expenditure = match (weight, &info) {
            (Some(w), Some(info)) => Some(metrics::energy_expenditure(w, info, date, level)?),
            _ => None,
        };
        let remaining = expenditure
            .map(|exp| metrics::remaining_budget(exp, target_deficit.unwrap_or(0.0), consumed));

        Ok(DayOverview {
            date,
            entries,
            totals,
            consumed,
            weight,
            expenditure,
            target_deficit,
            remaining,
        })
    }

    // --- Weight ---

    /// The person's weight history, sorted by date ascending.
    pub fn weight_history(&self, person: &str) -> Result<Vec<WeightEntry>> {
        let mut entries: Vec<WeightEntry> = self.load_decoded(&weight_log_sheet(person))?;
        entries.sort_by_key(|e| e.date);
        Ok(entries)
    }

    pub fn current_weight(&self, person: &str) -> Result<Option<WeightEntry>> {
        Ok(self.weight_history(person)?.into_iter().next_back())
    }

    pub fn add_weight(&self, person: &str, entry: &WeightEntry) -> Result<()> {
        validate_weight(entry.weight)?;
        let sheet = weight_log_sheet(person);
        let mut log: Vec<WeightEntry> = self.load_decoded(&sheet)?;
        log.push(entry.clone());
        self.save_encoded(&sheet, &log)
    }

    /// Weight history with each entry's delta from the first entry.
    pub fn weight_progress(&self, person: &str) -> Result<Vec<ProgressEntry>> {
        let history = self.weight_history(person)?;
        let Some(first) = history.first() else {
            return Ok(Vec::new());
        };
        let start = first.weight;
        Ok(history
            .iter()
            .map(|e| ProgressEntry {
                date: e.date,
                weight: e.weight,
                delta: e.weight - start,
            })
            .collect())
    }

    pub fn challenge(&self, person_a: &str, person_b: &str) -> Result<Challenge> {
        let mut standings = Vec::with_capacity(2);
        for person in [person_a, person_b] {
            let history = self.weight_history(person)?;
            let (Some(first), Some(last)) = (history.first(), history.last()) else {
                bail!("'{person}' has no weight entries yet");
            };
            standings.push(ChallengeStanding {
                person: person.to_string(),
                start_weight: first.weight,
                current_weight: last.weight,
                delta: last.weight - first.weight,
            });
        }
        let leader = if standings[0].delta <= standings[1].delta {
            standings[0].person.clone()
        } else {
            standings[1].person.clone()
        };
        Ok(Challenge { standings, leader })
    }

    // --- Target and person info ---

    pub fn target(&self, person: &str) -> Result<Option<f64>> {
        let rows: Vec<Target> = self.load_decoded(&target_sheet(person))?;
        Ok(rows.first().map(|t| t.target))
    }

    pub fn set_target(&self, person: &str, target: f64) -> Result<()> {
        if target < 0.0 {
            bail!("Target deficit must not be negative");
        }
        self.save_encoded(&target_sheet(person), &[Target { target }])
    }

    pub fn person_info(&self, person: &str) -> Result<Option<PersonInfo>> {
        let rows: Vec<PersonInfo> = self.load_decoded(&info_sheet(person))?;
        Ok(rows.into_iter().next())
    }

    pub fn set_person_info(&self, person: &str, info: &PersonInfo) -> Result<()> {
        self.save_encoded(&info_sheet(person), &[info.clone()])
    }

    // --- Recipes ---

    /// Assemble recipes from the four recipe sheets. With `tags` given, only
    /// recipes carrying every listed tag are returned.
    pub fn recipes(&self, tags: &[String]) -> Result<Vec<Recipe>> {
        let infos: Vec<RecipeInfoRow> = self.load_decoded(RECIPE_INFO_SHEET)?;
        let tag_rows: Vec<RecipeTagRow> = self.load_decoded(RECIPE_TAGS_SHEET)?;
        let ingredient_rows: Vec<RecipeIngredientRow> =
            self.load_decoded(RECIPE_INGREDIENTS_SHEET)?;
        let instruction_rows: Vec<RecipeInstructionRow> =
            self.load_decoded(RECIPE_INSTRUCTIONS_SHEET)?;

        let recipes = infos
            .into_iter()
            .map(|info| Recipe {
                tags: tag_rows
                    .iter()
                    .filter(|r| r.name == info.name)
                    .map(|r| r.tag.clone())
                    .collect(),
                ingredients: ingredient_rows
                    .iter()
                    .filter(|r| r.name == info.name)
                    .map(|r| IngredientLine {
                        ingredient: r.ingredient.clone(),
                        quantity: r.quantity,
                        serving: r.serving.clone(),
                    })
                    .collect(),
                instructions: instruction_rows
                    .iter()
                    .filter(|r| r.name == info.name)
                    .map(|r| r.instruction.clone())
                    .collect(),
                name: info.name,
                description: info.description,
            })
            .filter(|r| tags.iter().all(|t| r.tags.contains(t)))
            .collect();
        Ok(recipes)
    }

    pub fn recipe(&self, name: &str) -> Result<Recipe> {
        self.recipes(&[])?
            .into_iter()
            .find(|r| r.name == name)
            .with_context(|| format!("No recipe named '{name}'"))
    }

    /// A recipe's ingredient lines scaled to `servings`, with grams and kcal
    /// per line where the ingredient is a known food.
    pub fn scaled_recipe(&self, name: &str, servings: f64) -> Result<ScaledRecipe> {
        if servings <= 0.0 {
            bail!("Servings must be greater than 0");
        }
        let recipe = self.recipe(name)?;
        let foods = food_index(&self.foods()?);

        let ingredients: Vec<ScaledIngredient> = recipe
            .ingredients
            .iter()
            .map(|line| {
                let quantity = line.quantity * servings;
                let grams = foods
                    .get(&line.ingredient)
                    .map(|food| resolve_grams(quantity, &line.serving, food));
                let calories = foods
                    .get(&line.ingredient)
                    .zip(grams)
                    .map(|(food, g)| calories_rounded(g, food.calories_per_100g));
                ScaledIngredient {
                    ingredient: line.ingredient.clone(),
                    quantity,
                    serving: line.serving.clone(),
                    grams,
                    calories,
                }
            })
            .collect();
        let total_calories = ingredients.iter().filter_map(|i| i.calories).sum();

        Ok(ScaledRecipe {
            name: recipe.name,
            description: recipe.description,
            tags: recipe.tags,
            servings,
            ingredients,
            instructions: recipe.instructions,
            total_calories,
        })
    }

    /// Save a recipe whose ingredient quantities are totals for `servings`
    /// servings; stored quantities are normalized to a single serving.
    pub fn save_recipe(&self, recipe: &Recipe, servings: f64) -> Result<()> {
        if servings <= 0.0 {
            bail!("Servings must be greater than 0");
        }
        if recipe.ingredients.is_empty() {
            bail!("A recipe needs at least one ingredient");
        }
        let mut infos: Vec<RecipeInfoRow> = self.load_decoded(RECIPE_INFO_SHEET)?;
        let names: Vec<String> = infos.iter().map(|r| r.name.clone()).collect();
        ensure_unique_name("recipe", &recipe.name, &names)?;

        infos.push(RecipeInfoRow {
            name: recipe.name.clone(),
            description: recipe.description.clone(),
        });
        self.save_encoded(RECIPE_INFO_SHEET, &infos)?;

        let mut tag_rows: Vec<RecipeTagRow> = self.load_decoded(RECIPE_TAGS_SHEET)?;
        tag_rows.extend(recipe.tags.iter().map(|tag| RecipeTagRow {
            name: recipe.name.clone(),
            tag: tag.clone(),
        }));
        self.save_encoded(RECIPE_TAGS_SHEET, &tag_rows)?;

        let mut ingredient_rows: Vec<RecipeIngredientRow> =
            self.load_decoded(RECIPE_INGREDIENTS_SHEET)?;
        ingredient_rows.extend(recipe.ingredients.iter().map(|line| RecipeIngredientRow {
            name: recipe.name.clone(),
            ingredient: line.ingredient.clone(),
            quantity: line.quantity / servings,
            serving: line.serving.clone(),
        }));
        self.save_encoded(RECIPE_INGREDIENTS_SHEET, &ingredient_rows)?;

        let mut instruction_rows: Vec<RecipeInstructionRow> =
            self.load_decoded(RECIPE_INSTRUCTIONS_SHEET)?;
        instruction_rows.extend(recipe.instructions.iter().map(|step| RecipeInstructionRow {
            name: recipe.name.clone(),
            instruction: step.clone(),
        }));
        self.save_encoded(RECIPE_INSTRUCTIONS_SHEET, &instruction_rows)
    }

    /// Remove a recipe's rows from all four recipe sheets.
    pub fn remove_recipe(&self, name: &str) -> Result<()> {
        let mut infos: Vec<RecipeInfoRow> = self.load_decoded(RECIPE_INFO_SHEET)?;
        let before = infos.len();
        infos.retain(|r| r.name != name);
        if infos.len() == before {
            bail!("No recipe named '{name}'");
        }
        self.save_encoded(RECIPE_INFO_SHEET, &infos)?;

        let mut tag_rows: Vec<RecipeTagRow> = self.load_decoded(RECIPE_TAGS_SHEET)?;
        tag_rows.retain(|r| r.name != name);
        self.save_encoded(RECIPE_TAGS_SHEET, &tag_rows)?;

        let mut ingredient_rows: Vec<RecipeIngredientRow> =
            self.load_decoded(RECIPE_INGREDIENTS_SHEET)?;
        ingredient_rows.retain(|r| r.name != name);
        self.save_encoded(RECIPE_INGREDIENTS_SHEET, &ingredient_rows)?;

        let mut instruction_rows: Vec<RecipeInstructionRow> =
            self.load_decoded(RECIPE_INSTRUCTIONS_SHEET)?;
        instruction_rows.retain(|r| r.name != name);
        self.save_encoded(RECIPE_INSTRUCTIONS_SHEET, &instruction_rows)
    }

    // --- Tags ---

    pub fn tags(&self) -> Result<Vec<String>> {
        let rows: Vec<TagRow> = self.load_decoded(AVAILABLE_TAGS_SHEET)?;
        Ok(rows.into_iter().map(|r| r.tag).collect())
    }

    pub fn add_tag(&self, tag: &str) -> Result<()> {
        let mut tags = self.tags()?;
        ensure_unique_name("tag", tag, &tags)?;
        tags.push(tag.to_string());
        let rows: Vec<TagRow> = tags.into_iter().map(|tag| TagRow { tag }).collect();
        self.save_encoded(AVAILABLE_TAGS_SHEET, &rows)
    }

    pub fn remove_tag(&self, tag: &str) -> Result<()> {
        let mut tags = self.tags()?;
        let before = tags.len();
        tags.retain(|t| t != tag);
        if tags.len() == before {
            bail!("No tag named '{tag}'");
        }
        let rows: Vec<TagRow> = tags.into_iter().map(|tag| TagRow { tag }).collect();
        self.save_encoded(AVAILABLE_TAGS_SHEET, &rows)
    }

    // --- Recipe drafts (local cache only, no remote traffic) ---

    fn read_draft<T: serde::de::DeserializeOwned>(&self, sheet: &str) -> Result<Vec<T>> {
        self.client
            .cache()
            .read(sheet)?
            .decode()
            .with_context(|| format!("Draft sheet '{sheet}' has malformed rows"))
    }

    fn write_draft<T: Serialize>(&self, sheet: &str, records: &[T]) -> Result<()> {
        let table = if records.is_empty() {
            empty_schema(sheet)
        } else {
            Table::encode(records)?
        };
        self.client.cache().write(sheet, &table)
    }

    pub fn draft_ingredients(&self) -> Result<Vec<DraftIngredient>> {
        self.read_draft(DRAFT_INGREDIENTS_SHEET)
    }

    pub fn add_draft_ingredient(&self, line: &DraftIngredient) -> Result<()> {
        if line.quantity <= 0.0 {
            bail!("Quantity must be greater than 0");
        }
        let mut lines = self.draft_ingredients()?;
        lines.push(line.clone());
        self.write_draft(DRAFT_INGREDIENTS_SHEET, &lines)
    }

    pub fn draft_instructions(&self) -> Result<Vec<DraftInstruction>> {
        self.read_draft(DRAFT_INSTRUCTIONS_SHEET)
    }

    pub fn add_draft_instruction(&self, step: &DraftInstruction) -> Result<()> {
        if step.instruction.trim().is_empty() {
            bail!("Instruction must not be empty");
        }
        let mut steps = self.draft_instructions()?;
        steps.push(step.clone());
        self.write_draft(DRAFT_INSTRUCTIONS_SHEET, &steps)
    }

    pub fn draft_tags(&self) -> Result<Vec<String>> {
        let rows: Vec<TagRow> = self.read_draft(DRAFT_TAGS_SHEET)?;
        Ok(rows.into_iter().map(|r| r.tag).collect())
    }

    pub fn add_draft_tag(&self, tag: &str) -> Result<()> {
        let mut tags = self.draft_tags()?;
        ensure_unique_name("tag", tag, &tags)?;
        tags.push(tag.to_string());
        let rows: Vec<TagRow> = tags.into_iter().map(|tag| TagRow { tag }).collect();
        self.write_draft(DRAFT_TAGS_SHEET, &rows)
    }

    pub fn clear_drafts(&self) -> Result<()> {
        for sheet in [
            DRAFT_INGREDIENTS_SHEET,
            DRAFT_INSTRUCTIONS_SHEET,
            DRAFT_TAGS_SHEET,
        ] {
            self.client.cache().invalidate(sheet)?;
        }
        Ok(())
    }

    // --- Raw sheets (data editor) ---

    pub fn sheet(&self, name: &str) -> Result<Table> {
        self.client.load(name)
    }

    pub fn save_sheet(&self, name: &str, table: &Table) -> Result<()> {
        self.client.save(name, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::cache::SheetCache;
    use crate::models::{Meal, Sex};
    use crate::sheets::{CachePolicy, SheetBackend};

    #[derive(Default)]
    struct InMemoryBackend {
        sheets: Mutex<HashMap<String, Table>>,
    }

    impl InMemoryBackend {
        fn has_sheet(&self, name: &str) -> bool {
            self.sheets.lock().unwrap().contains_key(name)
        }
    }

    impl SheetBackend for Arc<InMemoryBackend> {
        fn fetch(&self, sheet: &str) -> Result<Table> {
            Ok(self
                .sheets
                .lock()
                .unwrap()
                .get(sheet)
                .cloned()
                .unwrap_or_else(|| empty_schema(sheet)))
        }

        fn replace(&self, sheet: &str, table: &Table) -> Result<()> {
            self.sheets
                .lock()
                .unwrap()
                .insert(sheet.to_string(), table.clone());
            Ok(())
        }
    }

    fn tracker() -> (tempfile::TempDir, Arc<InMemoryBackend>, Tracker) {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(InMemoryBackend::default());
        let cache = SheetCache::new(dir.path()).unwrap();
        let policy = CachePolicy {
            // Zero freshness keeps every load authoritative in tests.
            fresh_for: Duration::ZERO,
            quota_pause: Duration::ZERO,
        };
        let client = SheetClient::new(Box::new(Arc::clone(&backend)), cache, policy);
        (dir, backend, Tracker::new(client))
    }

    fn food(name: &str, kcal_per_100g: f64, serving_size_g: f64) -> FoodItem {
        FoodItem {
            name: name.to_string(),
            fat_per_100g: 1.0,
            carbs_per_100g: 2.0,
            protein_per_100g: 3.0,
            calories_per_100g: kcal_per_100g,
            serving_name: "portion(s)".to_string(),
            serving_size_g,
            food_type: "Test".to_string(),
        }
    }

    fn weight(date: &str, kg: f64) -> WeightEntry {
        WeightEntry {
            date: date.parse().unwrap(),
            weight: kg,
        }
    }

    fn log_entry(date: &str, meal: Meal, name: &str, quantity: f64, serving: &str) -> LogEntry {
        LogEntry {
            date: date.parse().unwrap(),
            meal,
            name: name.to_string(),
            quantity,
            serving: serving.to_string(),
        }
    }

    fn sample_recipe() -> Recipe {
        Recipe {
            name: "Porridge".to_string(),
            description: "Breakfast staple".to_string(),
            tags: vec!["breakfast".to_string(), "quick".to_string()],
            ingredients: vec![
                IngredientLine {
                    ingredient: "Oats".to_string(),
                    quantity: 100.0,
                    serving: "g".to_string(),
                },
                IngredientLine {
                    ingredient: "Milk".to_string(),
                    quantity: 2.0,
                    serving: "portion(s)".to_string(),
                },
            ],
            instructions: vec!["Combine".to_string(), "Simmer".to_string()],
        }
    }

    #[test]
    fn test_add_list_remove_food() {
        let (_dir, _backend, tracker) = tracker();
        tracker.add_food(&food("Oats", 389.0, 40.0)).unwrap();
        tracker.add_food(&food("Milk", 47.0, 200.0)).unwrap();

        let foods = tracker.foods().unwrap();
        assert_eq!(foods.len(), 2);
        assert_eq!(foods[0].name, "Oats");

        tracker.remove_food("Oats").unwrap();
        assert_eq!(tracker.foods().unwrap().len(), 1);
        assert!(tracker.remove_food("Oats").is_err());
    }

    #[test]
    fn test_add_food_rejects_duplicate_name() {
        let (_dir, _backend, tracker) = tracker();
        tracker.add_food(&food("Oats", 389.0, 40.0)).unwrap();
        assert!(tracker.add_food(&food("Oats", 100.0, 10.0)).is_err());
    }

    #[test]
    fn test_add_log_entry_rejects_unknown_food() {
        let (_dir, _backend, tracker) = tracker();
        let entry = log_entry("2024-06-15", Meal::Lunch, "Mystery", 100.0, "g");
        assert!(tracker.add_log_entry("bela", &entry).is_err());
    }

    #[test]
    fn test_day_overview_full_budget() {
        let (_dir, _backend, tracker) = tracker();
        tracker.add_food(&food("Rice", 100.0, 75.0)).unwrap();
        tracker
            .add_log_entry(
                "bela",
                &log_entry("2024-06-15", Meal::Lunch, "Rice", 300.0, "g"),
            )
            .unwrap();
        tracker.add_weight("bela", &weight("2024-06-14", 70.0)).unwrap();
        tracker.set_target("bela", 500.0).unwrap();
        let info = PersonInfo {
            height: 170.0,
            birthday: "1994-06-15".parse().unwrap(),
            sex: Sex::Male,
        };
        tracker.set_person_info("bela", &info).unwrap();

        // Exactly 30 years of 365 days after the birthday.
        let date = info.birthday + chrono::Duration::days(30 * 365);
        let overview = tracker.day_overview("bela", date, 2).unwrap();

        assert_eq!(overview.entries.len(), 0);
        let overview = tracker
            .day_overview("bela", "2024-06-15".parse().unwrap(), 2)
            .unwrap();
        assert_eq!(overview.entries.len(), 1);
        assert!((overview.totals.lunch - 300.0).abs() < f64::EPSILON);
        assert!((overview.consumed - 300.0).abs() < f64::EPSILON);
        assert_eq!(overview.weight, Some(70.0));
        assert_eq!(overview.target_deficit, Some(500.0));
        assert!(overview.expenditure.is_some());
        let expenditure = overview.expenditure.unwrap();
        let remaining = overview.remaining.unwrap();
        assert!((remaining - (expenditure - 500.0 - 300.0)).abs() < 1e-9);
    }

    #[test]
    fn test_day_overview_without_info_has_no_budget() {
        let (_dir, _backend, tracker) = tracker();
        let overview = tracker
            .day_overview("bela", "2024-06-15".parse().unwrap(), 2)
            .unwrap();
        assert!(overview.entries.is_empty());
        assert!(overview.weight.is_none());
        assert!(overview.expenditure.is_none());
        assert!(overview.remaining.is_none());
    }

    #[test]
    fn test_weight_history_sorted_and_progress() {
        let (_dir, _backend, tracker) = tracker();
        tracker.add_weight("bela", &weight("2024-06-15", 89.0)).unwrap();
        tracker.add_weight("bela", &weight("2024-06-01", 91.0)).unwrap();
        tracker.add_weight("bela", &weight("2024-06-08", 90.0)).unwrap();

        let history = tracker.weight_history("bela").unwrap();
        let dates: Vec<String> = history.iter().map(|e| e.date.to_string()).collect();
        assert_eq!(dates, ["2024-06-01", "2024-06-08", "2024-06-15"]);

        let current = tracker.current_weight("bela").unwrap().unwrap();
        assert!((current.weight - 89.0).abs() < f64::EPSILON);

        let progress = tracker.weight_progress("bela").unwrap();
        assert!((progress[0].delta - 0.0).abs() < f64::EPSILON);
        assert!((progress[2].delta - (-2.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_challenge_lowest_delta_wins() {
        let (_dir, _backend, tracker) = tracker();
        tracker.add_weight("bela", &weight("2024-06-01", 91.0)).unwrap();
        tracker.add_weight("bela", &weight("2024-06-15", 89.0)).unwrap();
        tracker.add_weight("marleen", &weight("2024-06-01", 70.0)).unwrap();
        tracker.add_weight("marleen", &weight("2024-06-15", 67.0)).unwrap();

        let challenge = tracker.challenge("bela", "marleen").unwrap();
        assert_eq!(challenge.leader, "marleen");
        assert!((challenge.standings[0].delta - (-2.0)).abs() < f64::EPSILON);
        assert!((challenge.standings[1].delta - (-3.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_challenge_tie_favors_first_listed() {
        let (_dir, _backend, tracker) = tracker();
        tracker.add_weight("bela", &weight("2024-06-01", 91.0)).unwrap();
        tracker.add_weight("marleen", &weight("2024-06-01", 70.0)).unwrap();

        let challenge = tracker.challenge("bela", "marleen").unwrap();
        assert_eq!(challenge.leader, "bela");
    }

    #[test]
    fn test_challenge_requires_entries_for_both() {
        let (_dir, _backend, tracker) = tracker();
        tracker.add_weight("bela", &weight("2024-06-01", 91.0)).unwrap();
        assert!(tracker.challenge("bela", "marleen").is_err());
    }

    #[test]
    fn test_target_set_overwrites() {
        let (_dir, _backend, tracker) = tracker();
        assert!(tracker.target("bela").unwrap().is_none());

        tracker.set_target("bela", 500.0).unwrap();
        assert_eq!(tracker.target("bela").unwrap(), Some(500.0));

        tracker.set_target("bela", 300.0).unwrap();
        assert_eq!(tracker.target("bela").unwrap(), Some(300.0));
    }

    #[test]
    fn test_save_recipe_normalizes_quantities() {
        let (_dir, _backend, tracker) = tracker();
        tracker.save_recipe(&sample_recipe(), 2.0).unwrap();

        let recipes = tracker.recipes(&[]).unwrap();
        assert_eq!(recipes.len(), 1);
        let porridge = &recipes[0];
        assert_eq!(porridge.ingredients.len(), 2);
        // 100 g for 2 servings stores as 50 g per serving.
        assert!((porridge.ingredients[0].quantity - 50.0).abs() < f64::EPSILON);
        assert!((porridge.ingredients[1].quantity - 1.0).abs() < f64::EPSILON);
        assert_eq!(porridge.instructions, ["Combine", "Simmer"]);
    }

    #[test]
    fn test_save_recipe_rejects_duplicate_name() {
        let (_dir, _backend, tracker) = tracker();
        tracker.save_recipe(&sample_recipe(), 2.0).unwrap();
        assert!(tracker.save_recipe(&sample_recipe(), 1.0).is_err());
    }

    #[test]
    fn test_recipes_filter_by_tag_subset() {
        let (_dir, _backend, tracker) = tracker();
        tracker.save_recipe(&sample_recipe(), 1.0).unwrap();
        let mut dinner = sample_recipe();
        dinner.name = "Stew".to_string();
        dinner.tags = vec!["dinner".to_string()];
        tracker.save_recipe(&dinner, 1.0).unwrap();

        let all = tracker.recipes(&[]).unwrap();
        assert_eq!(all.len(), 2);

        let quick = tracker.recipes(&["quick".to_string()]).unwrap();
        assert_eq!(quick.len(), 1);
        assert_eq!(quick[0].name, "Porridge");

        let both = tracker
            .recipes(&["quick".to_string(), "dinner".to_string()])
            .unwrap();
        assert!(both.is_empty());
    }

    #[test]
    fn test_scaled_recipe_grams_and_calories() {
        let (_dir, _backend, tracker) = tracker();
        tracker.add_food(&food("Oats", 389.0, 40.0)).unwrap();
        tracker.add_food(&food("Milk", 47.0, 200.0)).unwrap();
        tracker.save_recipe(&sample_recipe(), 2.0).unwrap();

        let scaled = tracker.scaled_recipe("Porridge", 2.0).unwrap();
        // Back to the as-saved totals at two servings.
        assert!((scaled.ingredients[0].quantity - 100.0).abs() < f64::EPSILON);
        assert_eq!(scaled.ingredients[0].grams, Some(100.0));
        assert_eq!(scaled.ingredients[0].calories, Some(389.0));
        // 2 portions of 200 g at 47 kcal/100g = 188 kcal.
        assert_eq!(scaled.ingredients[1].grams, Some(400.0));
        assert_eq!(scaled.ingredients[1].calories, Some(188.0));
        assert!((scaled.total_calories - 577.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scaled_recipe_unknown_ingredient() {
        let (_dir, _backend, tracker) = tracker();
        tracker.save_recipe(&sample_recipe(), 1.0).unwrap();
        let scaled = tracker.scaled_recipe("Porridge", 1.0).unwrap();
        assert!(scaled.ingredients[0].grams.is_none());
        assert!(scaled.ingredients[0].calories.is_none());
        assert!((scaled.total_calories - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_remove_recipe_purges_all_sheets() {
        let (_dir, _backend, tracker) = tracker();
        tracker.save_recipe(&sample_recipe(), 1.0).unwrap();
        tracker.remove_recipe("Porridge").unwrap();

        assert!(tracker.recipes(&[]).unwrap().is_empty());
        assert!(tracker.sheet(RECIPE_TAGS_SHEET).unwrap().is_empty());
        assert!(tracker.sheet(RECIPE_INGREDIENTS_SHEET).unwrap().is_empty());
        assert!(tracker.sheet(RECIPE_INSTRUCTIONS_SHEET).unwrap().is_empty());
        assert!(tracker.remove_recipe("Porridge").is_err());
    }

    #[test]
    fn test_tags_add_remove_unique() {
        let (_dir, _backend, tracker) = tracker();
        tracker.add_tag("vegan").unwrap();
        tracker.add_tag("quick").unwrap();
        assert!(tracker.add_tag("vegan").is_err());
        assert_eq!(tracker.tags().unwrap(), ["vegan", "quick"]);

        tracker.remove_tag("vegan").unwrap();
        assert_eq!(tracker.tags().unwrap(), ["quick"]);
        assert!(tracker.remove_tag("vegan").is_err());
    }

    #[test]
    fn test_drafts_stay_local() {
        let (_dir, backend, tracker) = tracker();
        tracker
            .add_draft_ingredient(&DraftIngredient {
                ingredient: "Oats".to_string(),
                quantity: 100.0,
                serving: "g".to_string(),
            })
            .unwrap();
        tracker
            .add_draft_instruction(&DraftInstruction {
                instruction: "Combine".to_string(),
            })
            .unwrap();
        tracker.add_draft_tag("breakfast").unwrap();

        assert_eq!(tracker.draft_ingredients().unwrap().len(), 1);
        assert_eq!(tracker.draft_instructions().unwrap().len(), 1);
        assert_eq!(tracker.draft_tags().unwrap(), ["breakfast"]);

        // No remote sheet was written.
        assert!(!backend.has_sheet(DRAFT_INGREDIENTS_SHEET));
        assert!(!backend.has_sheet(DRAFT_INSTRUCTIONS_SHEET));
        assert!(!backend.has_sheet(DRAFT_TAGS_SHEET));

        tracker.clear_drafts().unwrap();
        assert!(tracker.draft_ingredients().unwrap().is_empty());
        assert!(tracker.draft_instructions().unwrap().is_empty());
        assert!(tracker.draft_tags().unwrap().is_empty());
    }

    #[test]
    fn test_raw_sheet_round_trip() {
        let (_dir, _backend, tracker) = tracker();
        let mut table = empty_schema(AVAILABLE_TAGS_SHEET);
        table.push_row(vec!["vegan".to_string()]).unwrap();
        tracker.save_sheet(AVAILABLE_TAGS_SHEET, &table).unwrap();
        assert_eq!(tracker.sheet(AVAILABLE_TAGS_SHEET).unwrap(), table);
    }
}
