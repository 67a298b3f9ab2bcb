use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the `food_data` sheet. Column names follow the spreadsheet
/// headers, so serde renames do the mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Fat (g)")]
    pub fat_per_100g: f64,
    #[serde(rename = "Carbs (g)")]
    pub carbs_per_100g: f64,
    #[serde(rename = "Protein (g)")]
    pub protein_per_100g: f64,
    #[serde(rename = "Calories (kcal)")]
    pub calories_per_100g: f64,
    #[serde(rename = "Serving Name")]
    pub serving_name: String,
    #[serde(rename = "Single Serving (g)")]
    pub serving_size_g: f64,
    #[serde(rename = "Type")]
    pub food_type: String,
}

/// Raw grams rather than a food's named serving.
pub const GRAMS_SERVING: &str = "g";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Meal {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

pub const MEALS: [Meal; 4] = [Meal::Breakfast, Meal::Lunch, Meal::Dinner, Meal::Snack];

impl Meal {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "Breakfast",
            Self::Lunch => "Lunch",
            Self::Dinner => "Dinner",
            Self::Snack => "Snack",
        }
    }
}

impl std::fmt::Display for Meal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn parse_meal(s: &str) -> Result<Meal> {
    match s.to_lowercase().as_str() {
        "breakfast" => Ok(Meal::Breakfast),
        "lunch" => Ok(Meal::Lunch),
        "dinner" => Ok(Meal::Dinner),
        "snack" => Ok(Meal::Snack),
        _ => bail!("Invalid meal '{s}'. Must be one of: breakfast, lunch, dinner, snack"),
    }
}

/// One row of a person's `food_log_<person>` sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub date: NaiveDate,
    pub meal: Meal,
    pub name: String,
    pub quantity: f64,
    pub serving: String,
}

/// One row of a person's `weight_log_<person>` sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub date: NaiveDate,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

/// The single row of a person's `info_<person>` sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonInfo {
    pub height: f64,
    pub birthday: NaiveDate,
    pub sex: Sex,
}

/// The single row of a person's `target_<person>` sheet: the daily
/// calorie-deficit goal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub target: f64,
}

// --- Recipe sheet rows (all four sheets keyed by recipe name) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeInfoRow {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeTagRow {
    pub name: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredientRow {
    pub name: String,
    pub ingredient: String,
    pub quantity: f64,
    pub serving: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeInstructionRow {
    pub name: String,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRow {
    pub tag: String,
}

// --- Local draft rows (recipe builder, cache-only) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftIngredient {
    pub ingredient: String,
    pub quantity: f64,
    pub serving: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftInstruction {
    pub instruction: String,
}

/// An ingredient line of an assembled recipe. Quantities are per single
/// serving; scale by the serving count at render time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientLine {
    pub ingredient: String,
    pub quantity: f64,
    pub serving: String,
}

/// A recipe assembled from the four recipe sheets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub ingredients: Vec<IngredientLine>,
    pub instructions: Vec<String>,
}

// --- Validation ---

/// Reject an insertion when `name` already appears in `existing`.
/// Names are natural keys; the backend enforces nothing.
pub fn ensure_unique_name(kind: &str, name: &str, existing: &[String]) -> Result<()> {
    if name.trim().is_empty() {
        bail!("{kind} name must not be empty");
    }
    if existing.iter().any(|n| n == name) {
        bail!("A {kind} with the name '{name}' already exists");
    }
    Ok(())
}

pub fn validate_food_item(item: &FoodItem) -> Result<()> {
    if item.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    if item.calories_per_100g < 0.0 {
        bail!("Calories per 100g must not be negative");
    }
    if item.fat_per_100g < 0.0 || item.carbs_per_100g < 0.0 || item.protein_per_100g < 0.0 {
        bail!("Macro values per 100g must not be negative");
    }
    if item.serving_size_g <= 0.0 {
        bail!("Single serving size must be greater than 0 g");
    }
    Ok(())
}

pub fn validate_log_entry(entry: &LogEntry) -> Result<()> {
    if entry.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    if entry.quantity <= 0.0 {
        bail!("Quantity must be greater than 0");
    }
    Ok(())
}

pub fn validate_weight(weight: f64) -> Result<()> {
    if weight <= 0.0 {
        bail!("Weight must be greater than 0 kg");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_food() -> FoodItem {
        FoodItem {
            name: "Oats".to_string(),
            fat_per_100g: 7.0,
            carbs_per_100g: 58.7,
            protein_per_100g: 13.5,
            calories_per_100g: 389.0,
            serving_name: "portion(s)".to_string(),
            serving_size_g: 40.0,
            food_type: "Grains".to_string(),
        }
    }

    #[test]
    fn test_parse_meal_case_insensitive() {
        assert_eq!(parse_meal("breakfast").unwrap(), Meal::Breakfast);
        assert_eq!(parse_meal("Lunch").unwrap(), Meal::Lunch);
        assert_eq!(parse_meal("DINNER").unwrap(), Meal::Dinner);
        assert_eq!(parse_meal("snack").unwrap(), Meal::Snack);
    }

    #[test]
    fn test_parse_meal_invalid() {
        assert!(parse_meal("brunch").is_err());
        assert!(parse_meal("").is_err());
    }

    #[test]
    fn test_ensure_unique_name() {
        let existing = vec!["Oats".to_string(), "Milk".to_string()];
        assert!(ensure_unique_name("food item", "Eggs", &existing).is_ok());
        assert!(ensure_unique_name("food item", "Oats", &existing).is_err());
        assert!(ensure_unique_name("food item", "  ", &existing).is_err());
    }

    #[test]
    fn test_validate_food_item() {
        assert!(validate_food_item(&sample_food()).is_ok());

        let mut bad = sample_food();
        bad.calories_per_100g = -1.0;
        assert!(validate_food_item(&bad).is_err());

        let mut bad = sample_food();
        bad.serving_size_g = 0.0;
        assert!(validate_food_item(&bad).is_err());

        let mut bad = sample_food();
        bad.name = String::new();
        assert!(validate_food_item(&bad).is_err());
    }

    #[test]
    fn test_validate_log_entry() {
        let entry = LogEntry {
            date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            meal: Meal::Lunch,
            name: "Oats".to_string(),
            quantity: 2.0,
            serving: "portion(s)".to_string(),
        };
        assert!(validate_log_entry(&entry).is_ok());

        let mut bad = entry.clone();
        bad.quantity = 0.0;
        assert!(validate_log_entry(&bad).is_err());

        let mut bad = entry;
        bad.name = String::new();
        assert!(validate_log_entry(&bad).is_err());
    }

    #[test]
    fn test_food_item_sheet_round_trip() {
        let table = crate::table::Table::encode(&[sample_food()]).unwrap();
        assert_eq!(table.columns()[0], "Name");
        assert_eq!(table.columns()[4], "Calories (kcal)");
        let decoded: Vec<FoodItem> = table.decode().unwrap();
        assert_eq!(decoded, vec![sample_food()]);
    }

    #[test]
    fn test_log_entry_sheet_headers() {
        let entry = LogEntry {
            date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            meal: Meal::Breakfast,
            name: "Oats".to_string(),
            quantity: 50.0,
            serving: GRAMS_SERVING.to_string(),
        };
        let table = crate::table::Table::encode(&[entry]).unwrap();
        assert_eq!(
            table.columns(),
            ["date", "meal", "name", "quantity", "serving"]
        );
        assert_eq!(table.rows()[0][0], "2024-06-15");
        assert_eq!(table.rows()[0][1], "Breakfast");
    }
}
