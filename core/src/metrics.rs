use std::collections::HashMap;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{FoodItem, GRAMS_SERVING, LogEntry, Meal, PersonInfo, Sex};

/// kcal stored in roughly one kilogram of body fat.
pub const KCAL_PER_KG_FAT: f64 = 7700.0;

/// Fixed 6-level activity multiplier table (sedentary → extremely active).
pub const ACTIVITY_MULTIPLIERS: [f64; 6] = [1.2, 1.375, 1.4625, 1.55, 1.725, 1.9];

/// Resolve a log line to grams: `"g"` passes the quantity through, anything
/// else is a count of the food's named serving.
#[must_use]
pub fn resolve_grams(quantity: f64, serving: &str, food: &FoodItem) -> f64 {
    if serving == GRAMS_SERVING {
        quantity
    } else {
        quantity * food.serving_size_g
    }
}

#[must_use]
pub fn calories(grams: f64, calories_per_100g: f64) -> f64 {
    grams * calories_per_100g / 100.0
}

/// Calories rounded to the nearest whole kcal, as shown to the user.
#[must_use]
pub fn calories_rounded(grams: f64, calories_per_100g: f64) -> f64 {
    calories(grams, calories_per_100g).round()
}

/// Index foods by name. Duplicate names resolve last-write-wins.
#[must_use]
pub fn food_index(foods: &[FoodItem]) -> HashMap<String, FoodItem> {
    foods
        .iter()
        .map(|f| (f.name.clone(), f.clone()))
        .collect()
}

/// One resolved food-log line: the entry plus its computed grams and kcal.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEntry {
    pub meal: Meal,
    pub name: String,
    pub quantity: f64,
    pub serving: String,
    pub grams: f64,
    pub calories: f64,
}

/// Calories per meal for one day. Meals with no entries contribute zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MealTotals {
    pub breakfast: f64,
    pub lunch: f64,
    pub dinner: f64,
    pub snack: f64,
}

impl MealTotals {
    #[must_use]
    pub fn consumed(&self) -> f64 {
        self.breakfast + self.lunch + self.dinner + self.snack
    }

    #[must_use]
    pub fn for_meal(&self, meal: Meal) -> f64 {
        match meal {
            Meal::Breakfast => self.breakfast,
            Meal::Lunch => self.lunch,
            Meal::Dinner => self.dinner,
            Meal::Snack => self.snack,
        }
    }
}

/// Resolve one person's log entries for a date against the food index.
/// Entries whose food is unknown are skipped rather than failing the page.
#[must_use]
pub fn resolve_day(
    log: &[LogEntry],
    foods: &HashMap<String, FoodItem>,
    date: NaiveDate,
) -> Vec<ResolvedEntry> {
    log.iter()
        .filter(|e| e.date == date)
        .filter_map(|e| {
            let food = foods.get(&e.name)?;
            let grams = resolve_grams(e.quantity, &e.serving, food);
            Some(ResolvedEntry {
                meal: e.meal,
                name: e.name.clone(),
                quantity: e.quantity,
                serving: e.serving.clone(),
                grams,
                calories: calories_rounded(grams, food.calories_per_100g),
            })
        })
        .collect()
}

#[must_use]
pub fn daily_meal_totals(entries: &[ResolvedEntry]) -> MealTotals {
    let sum = |meal: Meal| -> f64 {
        entries
            .iter()
            .filter(|e| e.meal == meal)
            .map(|e| e.calories)
            .sum()
    };
    MealTotals {
        breakfast: sum(Meal::Breakfast),
        lunch: sum(Meal::Lunch),
        dinner: sum(Meal::Dinner),
        snack: sum(Meal::Snack),
    }
}

/// Age in years as days / 365; leap years are ignored.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn age_years(birthday: NaiveDate, today: NaiveDate) -> f64 {
    (today - birthday).num_days() as f64 / 365.0
}

/// Mifflin-St Jeor basal metabolic rate.
#[must_use]
pub fn basal_metabolic_rate(weight_kg: f64, height_cm: f64, age: f64, sex: Sex) -> f64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * age;
    match sex {
        Sex::Male => base + 5.0,
        Sex::Female => base - 161.0,
    }
}

/// BMR scaled by the activity multiplier for `level` (0-5).
pub fn energy_expenditure(
    weight_kg: f64,
    info: &PersonInfo,
    today: NaiveDate,
    level: usize,
) -> Result<f64> {
    let Some(multiplier) = ACTIVITY_MULTIPLIERS.get(level) else {
        bail!(
            "Invalid activity level {level}. Must be 0-{}",
            ACTIVITY_MULTIPLIERS.len() - 1
        );
    };
    let age = age_years(info.birthday, today);
    Ok(basal_metabolic_rate(weight_kg, info.height, age, info.sex) * multiplier)
}

/// What is left to eat today: expenditure minus the deficit goal minus what
/// was already consumed. Negative means the budget is blown.
#[must_use]
pub fn remaining_budget(expenditure: f64, target_deficit: f64, consumed: f64) -> f64 {
    expenditure - target_deficit - consumed
}

/// A weight-loss pacing plan: how fast to lose and the daily deficit needed.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PacePlan {
    pub kg_to_lose: f64,
    pub days: i64,
    pub weeks: i64,
    pub kg_per_week: f64,
    pub kg_per_day: f64,
    pub deficit_per_day: f64,
}

/// Compute the pacing plan for losing `current - desired` kg between
/// `start` and `target` date. The target date must be strictly after the
/// start date, and at least a week out so the weekly rate is defined.
#[allow(clippy::cast_precision_loss)]
pub fn weight_loss_plan(
    current: f64,
    desired: f64,
    start: NaiveDate,
    target: NaiveDate,
) -> Result<PacePlan> {
    let days = (target - start).num_days();
    if days <= 0 {
        bail!("Target date must be after the start date");
    }
    let weeks = days / 7;
    if weeks == 0 {
        bail!("Target date must be at least one week after the start date");
    }

    let kg_to_lose = current - desired;
    let kg_per_day = kg_to_lose / days as f64;
    Ok(PacePlan {
        kg_to_lose,
        days,
        weeks,
        kg_per_week: kg_to_lose / weeks as f64,
        kg_per_day,
        deficit_per_day: kg_per_day * KCAL_PER_KG_FAT,
    })
}
