use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use slank_core::models::FoodItem;
use slank_core::service::Tracker;

use super::helpers::truncate;

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_food_add(
    tracker: &Tracker,
    name: &str,
    calories: f64,
    fat: f64,
    carbs: f64,
    protein: f64,
    serving_name: &str,
    serving_size: f64,
    food_type: &str,
    json: bool,
) -> Result<()> {
    let item = FoodItem {
        name: name.to_string(),
        fat_per_100g: fat,
        carbs_per_100g: carbs,
        protein_per_100g: protein,
        calories_per_100g: calories,
        serving_name: serving_name.to_string(),
        serving_size_g: serving_size,
        food_type: food_type.to_string(),
    };
    tracker.add_food(&item)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }
    println!("Added food: {name} ({calories:.0} kcal/100g)");
    Ok(())
}

pub(crate) fn cmd_food_remove(tracker: &Tracker, name: &str, json: bool) -> Result<()> {
    tracker.remove_food(name)?;

    if json {
        println!("{}", serde_json::json!({ "removed": name }));
        return Ok(());
    }
    println!("Removed food: {name}");
    Ok(())
}

pub(crate) fn cmd_food_list(tracker: &Tracker, food_type: Option<&str>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "kcal/100g")]
        calories: String,
        #[tabled(rename = "F/100g")]
        fat: String,
        #[tabled(rename = "C/100g")]
        carbs: String,
        #[tabled(rename = "P/100g")]
        protein: String,
        #[tabled(rename = "Serving")]
        serving: String,
        #[tabled(rename = "Type")]
        food_type: String,
    }

    let mut foods = tracker.foods()?;
    if let Some(t) = food_type {
        foods.retain(|f| f.food_type.eq_ignore_ascii_case(t));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
        return Ok(());
    }

    if foods.is_empty() {
        eprintln!("No foods found");
        process::exit(2);
    }

    let rows: Vec<FoodRow> = foods
        .iter()
        .map(|f| FoodRow {
            name: truncate(&f.name, 35),
            calories: format!("{:.0}", f.calories_per_100g),
            fat: format!("{:.1}", f.fat_per_100g),
            carbs: format!("{:.1}", f.carbs_per_100g),
            protein: format!("{:.1}", f.protein_per_100g),
            serving: format!("{} ({:.0} g)", f.serving_name, f.serving_size_g),
            food_type: f.food_type.clone(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
